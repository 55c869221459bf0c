use std::collections::BTreeSet;
use std::fmt;

use crate::core::{OptionId, ValueId};
use crate::query::filter::AttributeFilter;

/// 一个属性组的析取：文档的 value 集合与 `value_ids` 至少有一个交集
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueGroup {
    pub attribute_id: OptionId,
    pub value_ids: BTreeSet<ValueId>,
}

/// 编译后的布尔谓词：组内 OR，组间 AND。无组即匹配全部。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Predicate {
    groups: Vec<ValueGroup>,
}

impl Predicate {
    pub fn match_all() -> Self {
        Self::default()
    }

    /// 空 value 列表的组不产生谓词（no-op，而不是“匹配空集”）
    pub fn compile(filters: &[AttributeFilter]) -> Self {
        let groups = filters
            .iter()
            .filter(|f| !f.value_ids.is_empty())
            .map(|f| ValueGroup {
                attribute_id: f.attribute_id,
                value_ids: f.value_ids.iter().copied().collect(),
            })
            .collect();
        Self { groups }
    }

    pub fn groups(&self) -> &[ValueGroup] {
        &self.groups
    }

    pub fn is_match_all(&self) -> bool {
        self.groups.is_empty()
    }

    /// 参考求值（索引实现可用 posting 运算代替，但语义必须一致）
    pub fn matches(&self, value_ids: &BTreeSet<ValueId>) -> bool {
        self.groups
            .iter()
            .all(|g| g.value_ids.iter().any(|v| value_ids.contains(v)))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.groups.is_empty() {
            return f.write_str("TRUE");
        }
        for (i, g) in self.groups.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            let values: Vec<String> = g.value_ids.iter().map(|v| v.to_string()).collect();
            write!(f, "(option_value_ids ∩ {{{}}})", values.join(","))?;
        }
        Ok(())
    }
}
