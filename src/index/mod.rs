pub mod memory;
pub mod writer;

use crate::core::{IndexProjection, ProductId};
use crate::error::Result;
use crate::query::Predicate;
use crate::stats::IndexStats;

/// 搜索索引能力抽象：按主键 upsert + 数组字段上的布尔谓词查询。
///
/// ## 契约（重要）
/// - `upsert` 是按 `product_id` 的整体替换（幂等）。
/// - `count` / `page` / `for_each_match` 在同一谓词下求值语义一致；三者互相独立，
///   不共享任何游标状态。
/// - `page` 与 `for_each_match` 的结果按 `product_id` 升序，offset 基于该顺序。
/// - `count` 不得物化匹配文档。
pub trait SearchIndex: Send + Sync {
    fn upsert(&self, doc: IndexProjection) -> Result<()>;
    fn get(&self, product_id: ProductId) -> Result<Option<IndexProjection>>;
    fn count(&self, predicate: &Predicate) -> Result<u64>;
    fn page(&self, predicate: &Predicate, offset: usize, limit: usize)
        -> Result<Vec<IndexProjection>>;
    fn for_each_match(
        &self,
        predicate: &Predicate,
        visit: &mut dyn FnMut(&IndexProjection),
    ) -> Result<()>;
    fn stats(&self) -> IndexStats;
    fn ping(&self) -> Result<()>;
}

pub use memory::MemoryIndex;
pub use writer::IndexWriter;
