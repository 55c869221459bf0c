pub mod checkpoint;
pub mod reader;
pub mod sqlite;

use crate::core::{JoinedSkuRow, OptionRow, ProductId, ProductRow};
use crate::error::Result;

/// 关系型目录的读取能力（具体驱动可替换）。
///
/// ## 契约
/// - `fetch_products_page` 返回 `id >= min_id` 的至多 `limit` 行，按 id 升序（keyset，非 offset）。
/// - `next_product_id` 是轻量存在性探测：返回严格大于 `after` 的最小 id，不做全量 count。
/// - `fetch_joined_rows` 返回给定商品的全部 SKU join 行，按 (product_id, sku_id) 排序；
///   没有属性的 SKU 也要出现（LEFT JOIN）。
pub trait CatalogSource: Send + Sync {
    fn fetch_products_page(&self, min_id: ProductId, limit: usize) -> Result<Vec<ProductRow>>;
    fn next_product_id(&self, after: ProductId) -> Result<Option<ProductId>>;
    fn fetch_joined_rows(&self, product_ids: &[ProductId]) -> Result<Vec<JoinedSkuRow>>;
    fn fetch_option_rows(&self) -> Result<Vec<OptionRow>>;
    fn ping(&self) -> Result<()>;
}

pub use checkpoint::CheckpointStore;
pub use reader::{CatalogPage, CatalogReader};
pub use sqlite::SqliteCatalog;
