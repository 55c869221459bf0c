use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::core::catalog::{JoinedSkuRow, OptionId, Product, ProductId, ProductRow, Sku, ValueId};

/// 写入搜索索引的反范式文档（以 product_id 为主键）。
///
/// 两个集合各自独立去重，成员之间没有位置对应关系。
/// 使用 BTreeSet：序列化结果稳定，重复同步得到逐字节相同的文档。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexProjection {
    pub product_id: ProductId,
    pub option_ids: BTreeSet<OptionId>,
    pub option_value_ids: BTreeSet<ValueId>,
}

impl IndexProjection {
    pub fn empty(product_id: ProductId) -> Self {
        Self {
            product_id,
            ..Default::default()
        }
    }
}

/// 商品 → IndexProjection
pub struct Projector;

impl Projector {
    /// 没有 SKU 的商品也产出（空集合）projection，照常 upsert。
    pub fn project(product: &Product) -> IndexProjection {
        let mut projection = IndexProjection::empty(product.id);
        for sku in &product.skus {
            for attr in &sku.options {
                projection.option_ids.insert(attr.option_id);
                projection.option_value_ids.insert(attr.value_id);
            }
        }
        projection
    }

    pub fn project_all(products: &[Product]) -> Vec<IndexProjection> {
        products.iter().map(Self::project).collect()
    }
}

/// 显式行分组：把一页商品行与对应的 SKU join 行组装成商品。
///
/// - 商品顺序沿用 `products`（keyset 升序）
/// - 每个商品内 SKU 按首次出现顺序，属性按行顺序；同一 SKU 的重复属性元组折叠
/// - 不属于本页商品的 join 行被忽略
pub fn assemble_products(products: Vec<ProductRow>, rows: Vec<JoinedSkuRow>) -> Vec<Product> {
    let mut skus_by_product: HashMap<ProductId, Vec<Sku>> = HashMap::with_capacity(products.len());
    for row in rows {
        let skus = skus_by_product.entry(row.product_id).or_default();
        let same_sku = skus.last().map(|s| s.id == row.sku_id).unwrap_or(false);
        if !same_sku {
            skus.push(Sku {
                id: row.sku_id,
                product_id: row.product_id,
                count: row.count,
                barcode: row.barcode,
                created_at: row.created_at,
                updated_at: row.updated_at,
                options: Vec::new(),
            });
        }
        let (Some(attr), Some(sku)) = (row.attribute, skus.last_mut()) else {
            continue;
        };
        if !sku.options.contains(&attr) {
            sku.options.push(attr);
        }
    }

    products
        .into_iter()
        .map(|p| Product {
            skus: skus_by_product.remove(&p.id).unwrap_or_default(),
            id: p.id,
            name: p.name,
            article: p.article,
            created_at: p.created_at,
            updated_at: p.updated_at,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::SkuOption;

    fn product_row(id: ProductId) -> ProductRow {
        ProductRow {
            id,
            name: format!("Product {}", id),
            article: format!("{:07}", id),
            created_at: "2024-01-01 00:00:00".into(),
            updated_at: "2024-01-01 00:00:00".into(),
        }
    }

    fn attr(option_id: OptionId, value_id: ValueId) -> SkuOption {
        SkuOption {
            option_id,
            option_name: format!("opt{}", option_id),
            option_display_name: format!("Opt {}", option_id),
            value_id,
            value: value_id.to_string(),
            is_range: false,
            range_end_value: None,
        }
    }

    fn joined(product_id: ProductId, sku_id: i64, attribute: Option<SkuOption>) -> JoinedSkuRow {
        JoinedSkuRow {
            product_id,
            sku_id,
            count: 1,
            barcode: None,
            created_at: "2024-01-01 00:00:00".into(),
            updated_at: "2024-01-01 00:00:00".into(),
            attribute,
        }
    }

    #[test]
    fn assemble_groups_rows_per_sku() {
        let products = assemble_products(
            vec![product_row(1), product_row(2)],
            vec![
                joined(1, 100, Some(attr(1, 10))),
                joined(1, 100, Some(attr(2, 20))),
                joined(1, 101, Some(attr(1, 11))),
                joined(2, 200, None),
            ],
        );
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].skus.len(), 2);
        assert_eq!(products[0].skus[0].options.len(), 2);
        assert_eq!(products[0].skus[1].options[0].value_id, 11);
        assert_eq!(products[1].skus.len(), 1);
        assert!(products[1].skus[0].options.is_empty());
    }

    #[test]
    fn product_without_skus_keeps_empty_list() {
        let products = assemble_products(vec![product_row(7)], vec![]);
        assert_eq!(products.len(), 1);
        assert!(products[0].skus.is_empty());

        let projection = Projector::project(&products[0]);
        assert_eq!(projection, IndexProjection::empty(7));
    }

    #[test]
    fn projection_sets_are_deduplicated_independently() {
        let products = assemble_products(
            vec![product_row(1)],
            vec![
                joined(1, 100, Some(attr(1, 10))),
                joined(1, 100, Some(attr(1, 10))),
                joined(1, 101, Some(attr(1, 11))),
                joined(1, 102, Some(attr(2, 10))),
            ],
        );
        // 同一 SKU 的重复元组被折叠
        assert_eq!(products[0].skus[0].options.len(), 1);

        let projection = Projector::project(&products[0]);
        assert_eq!(projection.option_ids.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(
            projection.option_value_ids.iter().copied().collect::<Vec<_>>(),
            vec![10, 11]
        );
    }

    #[test]
    fn projection_is_insertion_order_independent() {
        let a = assemble_products(
            vec![product_row(1)],
            vec![joined(1, 1, Some(attr(1, 10))), joined(1, 2, Some(attr(2, 20)))],
        );
        let b = assemble_products(
            vec![product_row(1)],
            vec![joined(1, 2, Some(attr(2, 20))), joined(1, 1, Some(attr(1, 10)))],
        );
        let pa = serde_json::to_vec(&Projector::project(&a[0])).unwrap();
        let pb = serde_json::to_vec(&Projector::project(&b[0])).unwrap();
        assert_eq!(pa, pb);
    }
}
