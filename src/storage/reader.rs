use std::sync::Arc;

use serde::Serialize;

use crate::core::{assemble_products, group_options, CatalogOption, Product, ProductId};
use crate::error::{Error, Result};
use crate::storage::CatalogSource;

pub const MAX_PAGE_SIZE: usize = 1000;

/// 一页目录数据 + keyset 游标
#[derive(Clone, Debug, Serialize)]
pub struct CatalogPage {
    pub products: Vec<Product>,
    pub next_product_id: Option<ProductId>,
    pub count: usize,
}

impl CatalogPage {
    fn empty() -> Self {
        Self {
            products: Vec::new(),
            next_product_id: None,
            count: 0,
        }
    }
}

/// Catalog Reader：按 keyset 分页流式读取目录。
///
/// 每页固定 3 次查询（商品页 / 下一 id 探测 / SKU join），与已扫描前缀大小无关。
#[derive(Clone)]
pub struct CatalogReader {
    source: Arc<dyn CatalogSource>,
}

impl CatalogReader {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Arc<dyn CatalogSource> {
        &self.source
    }

    /// 读取 `id >= cursor` 的至多 `count` 个商品（含 SKU 与属性）。
    pub fn read_page(&self, cursor: ProductId, count: usize) -> Result<CatalogPage> {
        if count == 0 {
            return Err(Error::validation("page size must be at least 1"));
        }

        let rows = self.source.fetch_products_page(cursor, count)?;
        let Some(last) = rows.last() else {
            return Ok(CatalogPage::empty());
        };
        let next_product_id = self.source.next_product_id(last.id)?;

        let ids: Vec<ProductId> = rows.iter().map(|r| r.id).collect();
        let joined = self.source.fetch_joined_rows(&ids)?;
        let products = assemble_products(rows, joined);

        Ok(CatalogPage {
            count: products.len(),
            products,
            next_product_id,
        })
    }

    pub fn options(&self) -> Result<Vec<CatalogOption>> {
        Ok(group_options(self.source.fetch_option_rows()?))
    }
}
