use crate::core::{OptionId, ValueId};
use crate::error::{Error, Result};

const FILTER_PREFIX: &str = "filters";

/// 单个属性组的多选过滤：组内 value 之间为 OR
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeFilter {
    pub attribute_id: OptionId,
    pub value_ids: Vec<ValueId>,
}

impl AttributeFilter {
    pub fn new(attribute_id: OptionId, value_ids: Vec<ValueId>) -> Self {
        Self {
            attribute_id,
            value_ids,
        }
    }
}

/// 解析 `filters[<attrGroupId>]=<v1>,<v2>` 形式的查询参数。
///
/// - 以 `filters` 开头但不是 `filters[<整数>]` 的 key 视为非法
/// - value 逗号分隔，去空白，空片段跳过；非整数视为非法
/// - 同一组出现多次时合并（保持首次出现顺序，组内去重）
/// - 没有任何 value 的组不产出过滤
pub fn parse_filters<'a, I>(pairs: I) -> Result<Vec<AttributeFilter>>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut filters: Vec<AttributeFilter> = Vec::new();

    for (key, raw) in pairs {
        if !key.starts_with(FILTER_PREFIX) {
            continue;
        }
        let attribute_id = parse_filter_key(key)?;

        let mut values = Vec::new();
        for part in raw.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let id: ValueId = part
                .parse()
                .map_err(|_| Error::validation(format!("invalid value ID: {}", part)))?;
            values.push(id);
        }
        if values.is_empty() {
            continue;
        }

        let group = match filters.iter_mut().position(|f| f.attribute_id == attribute_id) {
            Some(i) => &mut filters[i],
            None => {
                filters.push(AttributeFilter::new(attribute_id, Vec::new()));
                let last = filters.len() - 1;
                &mut filters[last]
            }
        };
        for v in values {
            if !group.value_ids.contains(&v) {
                group.value_ids.push(v);
            }
        }
    }

    Ok(filters)
}

fn parse_filter_key(key: &str) -> Result<OptionId> {
    let inner = key
        .strip_prefix(FILTER_PREFIX)
        .and_then(|rest| rest.strip_prefix('['))
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| Error::validation(format!("malformed filter key: {}", key)))?;
    inner
        .trim()
        .parse()
        .map_err(|_| Error::validation(format!("invalid option ID: {}", inner)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(pairs: &[(&str, &str)]) -> Result<Vec<AttributeFilter>> {
        parse_filters(pairs.iter().copied())
    }

    #[test]
    fn parses_groups_in_order() {
        let filters = parse(&[
            ("filters[3]", "10, 11"),
            ("page", "2"),
            ("filters[1]", "30"),
        ])
        .unwrap();
        assert_eq!(
            filters,
            vec![
                AttributeFilter::new(3, vec![10, 11]),
                AttributeFilter::new(1, vec![30]),
            ]
        );
    }

    #[test]
    fn repeated_group_is_merged() {
        let filters = parse(&[("filters[3]", "10,11"), ("filters[3]", "11,12")]).unwrap();
        assert_eq!(filters, vec![AttributeFilter::new(3, vec![10, 11, 12])]);
    }

    #[test]
    fn empty_values_are_skipped() {
        let filters = parse(&[("filters[3]", ""), ("filters[4]", " , ,")]).unwrap();
        assert!(filters.is_empty());
    }

    #[test]
    fn malformed_keys_are_rejected() {
        for key in ["filters[abc]", "filters[", "filters3", "filters[1"] {
            let err = parse(&[(key, "1")]).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "key {key}");
        }
    }

    #[test]
    fn non_integer_value_is_rejected() {
        let err = parse(&[("filters[1]", "10,red")]).unwrap_err();
        assert!(err.to_string().contains("red"));
    }
}
