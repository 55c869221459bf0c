use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::core::{IndexProjection, ValueId};
use crate::error::{QueryPass, Result};
use crate::index::SearchIndex;
use crate::query::filter::AttributeFilter;
use crate::query::pagination::{PageMeta, PageRequest};
use crate::query::predicate::Predicate;

/// option_value_id → 命中商品数
pub type Facets = BTreeMap<ValueId, u64>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchResponse {
    pub products: Vec<IndexProjection>,
    pub meta: PageMeta,
    pub facets: Facets,
}

/// Facet Query Engine：同一谓词下的三次独立 pass。
///
/// 1. count：只取 total_count，不物化文档
/// 2. page：offset/limit 窗口
/// 3. facets：遍历 *全部* 命中文档统计每个 value（只看当前页会给出错误的“可继续筛选”计数）
///
/// 任一 pass 失败则整个请求失败，不返回部分结果。
#[derive(Clone)]
pub struct FacetQueryEngine {
    index: Arc<dyn SearchIndex>,
}

impl FacetQueryEngine {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index }
    }

    pub fn search(
        &self,
        filters: &[AttributeFilter],
        request: PageRequest,
    ) -> Result<SearchResponse> {
        let predicate = Predicate::compile(filters);
        let t0 = Instant::now();

        let total_count = self
            .index
            .count(&predicate)
            .map_err(|e| e.in_pass(QueryPass::Count))?;
        let t_count = t0.elapsed();

        let products = self
            .index
            .page(&predicate, request.offset(), request.limit())
            .map_err(|e| e.in_pass(QueryPass::Page))?;
        let t_page = t0.elapsed();

        let facets = self
            .facets(&predicate)
            .map_err(|e| e.in_pass(QueryPass::Facets))?;

        tracing::debug!(
            "search {} -> total={} page={} facets={} (count {:?}, page {:?}, total {:?})",
            predicate,
            total_count,
            products.len(),
            facets.len(),
            t_count,
            t_page - t_count,
            t0.elapsed()
        );

        let meta = PageMeta::compute(total_count, request, products.len());
        Ok(SearchResponse {
            products,
            meta,
            facets,
        })
    }

    /// 全量（不分页）facet 统计
    pub fn facets(&self, predicate: &Predicate) -> Result<Facets> {
        let mut facets = Facets::new();
        self.index.for_each_match(predicate, &mut |doc| {
            for v in &doc.option_value_ids {
                *facets.entry(*v).or_insert(0) += 1;
            }
        })?;
        Ok(facets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ProductId;
    use crate::error::Error;
    use crate::index::MemoryIndex;
    use crate::stats::IndexStats;
    use std::collections::BTreeSet;

    fn doc(product_id: ProductId, values: &[ValueId]) -> IndexProjection {
        IndexProjection {
            product_id,
            option_ids: BTreeSet::new(),
            option_value_ids: values.iter().copied().collect(),
        }
    }

    fn engine_with(docs: &[IndexProjection]) -> FacetQueryEngine {
        let index = Arc::new(MemoryIndex::new());
        for d in docs {
            index.upsert(d.clone()).unwrap();
        }
        FacetQueryEngine::new(index)
    }

    fn page(p: i64, size: i64) -> PageRequest {
        PageRequest::new(p, size).unwrap()
    }

    fn three_products() -> Vec<IndexProjection> {
        vec![doc(1, &[10, 20]), doc(2, &[20, 30]), doc(3, &[10, 30])]
    }

    #[test]
    fn and_across_groups_scenario() {
        let engine = engine_with(&three_products());
        let r = engine
            .search(
                &[
                    AttributeFilter::new(1, vec![10]),
                    AttributeFilter::new(2, vec![30]),
                ],
                page(0, 10),
            )
            .unwrap();

        assert_eq!(r.products.len(), 1);
        assert_eq!(r.products[0].product_id, 3);
        assert_eq!(r.meta.total_count, 1);
        assert_eq!(r.meta.total_pages, 1);
        assert_eq!(r.meta.next_page, None);
        assert_eq!(r.facets, Facets::from([(10, 1), (30, 1)]));
    }

    #[test]
    fn no_filters_gives_global_facets() {
        let engine = engine_with(&three_products());
        let r = engine.search(&[], page(0, 10)).unwrap();
        assert_eq!(r.meta.total_count, 3);
        assert_eq!(r.facets, Facets::from([(10, 2), (20, 2), (30, 2)]));
    }

    #[test]
    fn facets_cover_full_result_not_page() {
        let engine = engine_with(&three_products());
        let r = engine
            .search(&[AttributeFilter::new(1, vec![10, 20])], page(0, 1))
            .unwrap();
        // (10 OR 20) 命中 P1 P2 P3，页只有 1 条
        assert_eq!(r.products.len(), 1);
        assert_eq!(r.meta.total_count, 3);
        assert_eq!(r.meta.total_pages, 3);
        assert_eq!(r.meta.next_page, Some(1));
        assert_eq!(r.facets, Facets::from([(10, 2), (20, 2), (30, 2)]));
    }

    #[test]
    fn matches_brute_force_reference() {
        // 确定性的伪随机数据：每个商品 1-4 个 value，取自 4 个属性组
        let docs: Vec<IndexProjection> = (1..=200)
            .map(|id: i64| {
                let mut values = Vec::new();
                for group in 0..4i64 {
                    if (id * 7 + group * 13) % 5 != 0 {
                        values.push(group * 100 + (id * 31 + group) % 6);
                    }
                }
                doc(id, &values)
            })
            .collect();
        let engine = engine_with(&docs);

        let filter_sets = vec![
            vec![],
            vec![AttributeFilter::new(0, vec![0, 1])],
            vec![
                AttributeFilter::new(0, vec![2, 3, 4]),
                AttributeFilter::new(1, vec![101]),
            ],
            vec![
                AttributeFilter::new(1, vec![100, 105]),
                AttributeFilter::new(2, vec![200, 201, 202]),
                AttributeFilter::new(3, vec![303]),
            ],
            vec![AttributeFilter::new(2, vec![999])],
        ];

        for filters in filter_sets {
            let predicate = Predicate::compile(&filters);
            let expected: Vec<&IndexProjection> = docs
                .iter()
                .filter(|d| predicate.matches(&d.option_value_ids))
                .collect();
            let mut expected_facets = Facets::new();
            for d in &expected {
                for v in &d.option_value_ids {
                    *expected_facets.entry(*v).or_insert(0) += 1;
                }
            }

            let r = engine.search(&filters, page(1, 7)).unwrap();
            assert_eq!(r.meta.total_count, expected.len() as u64, "{predicate}");
            assert_eq!(r.facets, expected_facets, "{predicate}");
            let expected_page: Vec<ProductId> = expected
                .iter()
                .skip(7)
                .take(7)
                .map(|d| d.product_id)
                .collect();
            let got_page: Vec<ProductId> = r.products.iter().map(|d| d.product_id).collect();
            assert_eq!(got_page, expected_page, "{predicate}");
        }
    }

    /// 在指定 pass 失败的索引
    struct FailingIndex {
        inner: MemoryIndex,
        fail_on: QueryPass,
    }

    impl SearchIndex for FailingIndex {
        fn upsert(&self, doc: IndexProjection) -> Result<()> {
            self.inner.upsert(doc)
        }
        fn get(&self, product_id: ProductId) -> Result<Option<IndexProjection>> {
            self.inner.get(product_id)
        }
        fn count(&self, predicate: &Predicate) -> Result<u64> {
            if self.fail_on == QueryPass::Count {
                return Err(Error::index("count timed out"));
            }
            self.inner.count(predicate)
        }
        fn page(
            &self,
            predicate: &Predicate,
            offset: usize,
            limit: usize,
        ) -> Result<Vec<IndexProjection>> {
            if self.fail_on == QueryPass::Page {
                return Err(Error::index("page timed out"));
            }
            self.inner.page(predicate, offset, limit)
        }
        fn for_each_match(
            &self,
            predicate: &Predicate,
            visit: &mut dyn FnMut(&IndexProjection),
        ) -> Result<()> {
            if self.fail_on == QueryPass::Facets {
                return Err(Error::index("scan aborted"));
            }
            self.inner.for_each_match(predicate, visit)
        }
        fn stats(&self) -> IndexStats {
            self.inner.stats()
        }
        fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn any_failing_pass_fails_whole_request() {
        for pass in [QueryPass::Count, QueryPass::Page, QueryPass::Facets] {
            let index = FailingIndex {
                inner: MemoryIndex::new(),
                fail_on: pass,
            };
            index.upsert(doc(1, &[10])).unwrap();
            let engine = FacetQueryEngine::new(Arc::new(index));

            match engine.search(&[], page(0, 10)) {
                Err(Error::QueryExecution { pass: failed, .. }) => assert_eq!(failed, pass),
                other => panic!("expected query failure in {pass} pass, got {other:?}"),
            }
        }
    }
}
