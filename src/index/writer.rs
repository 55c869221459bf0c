use std::sync::Arc;

use crate::core::IndexProjection;
use crate::error::{Error, Result};
use crate::index::SearchIndex;

/// Index Writer：projection 的唯一写入方（查询路径只读）
#[derive(Clone)]
pub struct IndexWriter {
    index: Arc<dyn SearchIndex>,
}

impl IndexWriter {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index }
    }

    /// 以 product_id 为主键整体替换；失败包装为 `RecordSync`
    pub fn upsert(&self, projection: IndexProjection) -> Result<()> {
        let product_id = projection.product_id;
        tracing::trace!(
            "upsert product {} ({} options, {} values)",
            product_id,
            projection.option_ids.len(),
            projection.option_value_ids.len()
        );
        self.index
            .upsert(projection)
            .map_err(|e| Error::RecordSync {
                product_id,
                source: Box::new(e),
            })
    }
}
