use std::borrow::Cow;
use std::collections::HashMap;

use parking_lot::RwLock;
use roaring::RoaringTreemap;

use crate::core::{IndexProjection, ProductId, ValueId};
use crate::error::{Error, Result};
use crate::index::SearchIndex;
use crate::query::Predicate;
use crate::stats::IndexStats;

/// 进程内倒排索引：option_value_id → product posting（RoaringTreemap）。
///
/// posting 以 product_id 为 key，迭代天然升序，分页顺序稳定。
#[derive(Default)]
pub struct MemoryIndex {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    docs: HashMap<u64, IndexProjection>,
    all: RoaringTreemap,
    postings: HashMap<ValueId, RoaringTreemap>,
}

fn doc_key(product_id: ProductId) -> Result<u64> {
    u64::try_from(product_id)
        .map_err(|_| Error::validation(format!("product id must be non-negative: {}", product_id)))
}

impl Inner {
    fn unlink(&mut self, key: u64, doc: &IndexProjection) {
        for v in &doc.option_value_ids {
            if let Some(bm) = self.postings.get_mut(v) {
                bm.remove(key);
                if bm.is_empty() {
                    self.postings.remove(v);
                }
            }
        }
    }

    /// 组内 posting 求并，组间求交（小集合优先，空即提前退出）
    fn matching(&self, predicate: &Predicate) -> Cow<'_, RoaringTreemap> {
        if predicate.is_match_all() {
            return Cow::Borrowed(&self.all);
        }

        let mut unions: Vec<RoaringTreemap> = predicate
            .groups()
            .iter()
            .map(|g| {
                let mut acc = RoaringTreemap::new();
                for v in &g.value_ids {
                    if let Some(bm) = self.postings.get(v) {
                        acc |= bm;
                    }
                }
                acc
            })
            .collect();
        unions.sort_by_key(|b| b.len());

        let mut iter = unions.into_iter();
        let mut acc = iter.next().unwrap_or_default();
        for b in iter {
            if acc.is_empty() {
                break;
            }
            acc &= b;
        }
        Cow::Owned(acc)
    }
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SearchIndex for MemoryIndex {
    fn upsert(&self, doc: IndexProjection) -> Result<()> {
        let key = doc_key(doc.product_id)?;
        let mut inner = self.inner.write();

        if let Some(old) = inner.docs.remove(&key) {
            inner.unlink(key, &old);
        }
        for v in &doc.option_value_ids {
            inner.postings.entry(*v).or_default().insert(key);
        }
        inner.all.insert(key);
        inner.docs.insert(key, doc);
        Ok(())
    }

    fn get(&self, product_id: ProductId) -> Result<Option<IndexProjection>> {
        let key = doc_key(product_id)?;
        Ok(self.inner.read().docs.get(&key).cloned())
    }

    fn count(&self, predicate: &Predicate) -> Result<u64> {
        let inner = self.inner.read();
        Ok(inner.matching(predicate).len())
    }

    fn page(
        &self,
        predicate: &Predicate,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<IndexProjection>> {
        let inner = self.inner.read();
        let matched = inner.matching(predicate);
        Ok(matched
            .iter()
            .skip(offset)
            .take(limit)
            .filter_map(|key| inner.docs.get(&key).cloned())
            .collect())
    }

    fn for_each_match(
        &self,
        predicate: &Predicate,
        visit: &mut dyn FnMut(&IndexProjection),
    ) -> Result<()> {
        let inner = self.inner.read();
        let matched = inner.matching(predicate);
        for key in matched.iter() {
            if let Some(doc) = inner.docs.get(&key) {
                visit(doc);
            }
        }
        Ok(())
    }

    fn stats(&self) -> IndexStats {
        let inner = self.inner.read();
        let postings_total: u64 = inner.postings.values().map(|b| b.len()).sum();
        let postings_bytes: u64 = inner
            .postings
            .values()
            .map(|b| b.serialized_size() as u64)
            .sum();
        IndexStats {
            documents: inner.docs.len(),
            distinct_values: inner.postings.len(),
            postings_total,
            postings_bytes,
        }
    }

    fn ping(&self) -> Result<()> {
        Ok(())
    }
}
