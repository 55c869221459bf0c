use serde::{Deserialize, Serialize};

pub type ProductId = i64;
pub type SkuId = i64;
pub type OptionId = i64;
pub type ValueId = i64;

/// 目录中的商品（按 id 有序，keyset 游标即 id）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub article: String,
    pub created_at: String,
    pub updated_at: String,
    pub skus: Vec<Sku>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sku {
    pub id: SkuId,
    pub product_id: ProductId,
    pub count: i64,
    pub barcode: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub options: Vec<SkuOption>,
}

/// SKU 上的一个属性元组；区间型属性额外带结束值
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuOption {
    pub option_id: OptionId,
    pub option_name: String,
    pub option_display_name: String,
    pub value_id: ValueId,
    pub value: String,
    pub is_range: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range_end_value: Option<String>,
}

/// 静态词表：Option 及其有序的 Value 集合
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogOption {
    pub id: OptionId,
    pub name: String,
    pub display_name: String,
    pub values: Vec<OptionValue>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionValue {
    pub id: ValueId,
    pub value: String,
}

/// products 表的一行（不含 SKU）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductRow {
    pub id: ProductId,
    pub name: String,
    pub article: String,
    pub created_at: String,
    pub updated_at: String,
}

/// skus ⟕ sku_options ⟕ option_values ⟕ options 的一行。
///
/// LEFT JOIN 语义：没有属性（或属性引用悬空）的 SKU 仍产出一行，`attribute` 为 `None`。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinedSkuRow {
    pub product_id: ProductId,
    pub sku_id: SkuId,
    pub count: i64,
    pub barcode: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub attribute: Option<SkuOption>,
}

/// options ⟕ option_values 的一行
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionRow {
    pub option_id: OptionId,
    pub option_name: String,
    pub option_display_name: String,
    pub value: Option<OptionValue>,
}

/// 将 (option, value) 行按 option 聚合，保持首次出现顺序
pub fn group_options(rows: Vec<OptionRow>) -> Vec<CatalogOption> {
    let mut out: Vec<CatalogOption> = Vec::new();
    for row in rows {
        let same = out.last().map(|o| o.id == row.option_id).unwrap_or(false);
        if !same {
            out.push(CatalogOption {
                id: row.option_id,
                name: row.option_name,
                display_name: row.option_display_name,
                values: Vec::new(),
            });
        }
        if let (Some(value), Some(last)) = (row.value, out.last_mut()) {
            last.values.push(value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(option_id: OptionId, value: Option<(ValueId, &str)>) -> OptionRow {
        OptionRow {
            option_id,
            option_name: format!("opt{}", option_id),
            option_display_name: format!("Opt {}", option_id),
            value: value.map(|(id, v)| OptionValue {
                id,
                value: v.to_string(),
            }),
        }
    }

    #[test]
    fn group_options_keeps_order_and_empty_options() {
        let grouped = group_options(vec![
            row(1, Some((10, "S"))),
            row(1, Some((11, "M"))),
            row(2, None),
            row(3, Some((30, "Red"))),
        ]);
        assert_eq!(grouped.len(), 3);
        assert_eq!(grouped[0].values.len(), 2);
        assert_eq!(grouped[0].values[1].value, "M");
        assert!(grouped[1].values.is_empty());
        assert_eq!(grouped[2].values[0].id, 30);
    }

    #[test]
    fn range_end_value_omitted_for_discrete_options() {
        let opt = SkuOption {
            option_id: 1,
            option_name: "color".into(),
            option_display_name: "Color".into(),
            value_id: 10,
            value: "Red".into(),
            is_range: false,
            range_end_value: None,
        };
        let json = serde_json::to_value(&opt).unwrap();
        assert!(json.get("range_end_value").is_none());
        assert_eq!(json["value_id"], 10);
    }
}
