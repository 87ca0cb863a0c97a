//! 成本模型
//!
//! 条件成本和规则优先级都是规则结构的纯函数，只用于排序，不代表实际耗时。
//! 所有常量来自配置，可以根据线上画像调整而无需重新构建。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::operators::{FieldType, Operator};
use crate::path::{FieldPath, PathSegment};

/// 成本模型配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    /// 每个对象键段的查找成本
    pub lookup_cost_per_segment: u64,
    /// 每层通配符的展开系数
    pub wildcard_fanout: u64,
    pub base_priority: u64,
    pub or_group_penalty: u64,
    /// 采样惩罚系数，乘以 (1 - sample_rate)
    pub sample_penalty: u64,
    pub operator_costs: BTreeMap<Operator, u64>,
    pub field_type_multipliers: BTreeMap<FieldType, u64>,
}

impl Default for CostConfig {
    fn default() -> Self {
        let operator_costs = Operator::ALL
            .into_iter()
            .map(|op| {
                let cost = match op {
                    Operator::Exists | Operator::IsNull => 1,
                    Operator::Eq | Operator::Neq => 5,
                    Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte => 7,
                    Operator::In => 8,
                    Operator::Prefix | Operator::Suffix => 10,
                };
                (op, cost)
            })
            .collect();

        let field_type_multipliers = FieldType::ALL
            .into_iter()
            .map(|ft| {
                let multiplier = match ft {
                    FieldType::Int | FieldType::Boolean => 1,
                    FieldType::Float => 4,
                    FieldType::String => 48,
                    FieldType::Any => 128,
                };
                (ft, multiplier)
            })
            .collect();

        Self {
            lookup_cost_per_segment: 128,
            wildcard_fanout: 8,
            base_priority: 1000,
            or_group_penalty: 10,
            sample_penalty: 50,
            operator_costs,
            field_type_multipliers,
        }
    }
}

/// 成本计算器
///
/// 构造时把配置表展开为按枚举下标访问的定长数组，计算时不做任何映射查找。
#[derive(Debug, Clone)]
pub struct CostModel {
    config: CostConfig,
    operator_costs: [Option<u64>; Operator::ALL.len()],
    type_multipliers: [Option<u64>; FieldType::ALL.len()],
}

impl CostModel {
    pub fn new(config: CostConfig) -> Self {
        let mut operator_costs = [None; Operator::ALL.len()];
        for (op, cost) in &config.operator_costs {
            operator_costs[*op as usize] = Some(*cost);
        }

        let mut type_multipliers = [None; FieldType::ALL.len()];
        for (ft, multiplier) in &config.field_type_multipliers {
            type_multipliers[*ft as usize] = Some(*multiplier);
        }

        Self {
            config,
            operator_costs,
            type_multipliers,
        }
    }

    pub fn config(&self) -> &CostConfig {
        &self.config
    }

    /// 操作符成本，不在成本表中时返回 None
    pub fn operator_cost(&self, operator: Operator) -> Option<u64> {
        self.operator_costs[operator as usize]
    }

    /// 字段类型系数，不在系数表中时返回 None
    pub fn type_multiplier(&self, field_type: FieldType) -> Option<u64> {
        self.type_multipliers[field_type as usize]
    }

    /// 查找成本：只有对象键段计费，通配符和下标不计费
    pub fn lookup_cost(&self, path: &FieldPath) -> u64 {
        let keys = path
            .segments()
            .iter()
            .filter(|s| matches!(s, PathSegment::Key(_)))
            .count() as u64;
        self.config.lookup_cost_per_segment.saturating_mul(keys)
    }

    /// 执行系数：fanout ^ 通配符数量
    pub fn execution_multiplier(&self, path: &FieldPath) -> u64 {
        let wildcards = u32::try_from(path.wildcard_count()).unwrap_or(u32::MAX);
        self.config.wildcard_fanout.saturating_pow(wildcards)
    }

    /// 单个条件的成本
    ///
    /// 操作符或字段类型不在配置表中时返回 None，由校验器转换为编译错误。
    pub fn condition_cost(
        &self,
        field: &FieldPath,
        field_ref: Option<&FieldPath>,
        operator: Operator,
        field_type: FieldType,
    ) -> Option<u64> {
        let op_cost = self.operator_cost(operator)?;
        let multiplier = self.type_multiplier(field_type)?;

        let lookup = self
            .lookup_cost(field)
            .saturating_add(field_ref.map_or(0, |r| self.lookup_cost(r)));
        let execution = op_cost
            .saturating_mul(multiplier)
            .saturating_mul(self.execution_multiplier(field));

        Some(lookup.saturating_add(execution))
    }

    /// 规则优先级，数值越小越先评估
    pub fn rule_priority<I>(&self, condition_costs: I, or_groups: usize, sample_rate: f64) -> u64
    where
        I: IntoIterator<Item = u64>,
    {
        let conditions = condition_costs
            .into_iter()
            .fold(0u64, |acc, c| acc.saturating_add(c));
        let groups = self
            .config
            .or_group_penalty
            .saturating_mul(or_groups as u64);
        let unsampled = (1.0 - sample_rate.clamp(0.0, 1.0)) * self.config.sample_penalty as f64;

        self.config
            .base_priority
            .saturating_add(conditions)
            .saturating_add(groups)
            .saturating_add(unsampled.floor() as u64)
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self::new(CostConfig::default())
    }
}
