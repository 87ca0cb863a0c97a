//! 评估诊断
//!
//! 每次记录级评估都会返回一份计数，同时通过 metrics 门面上报，不做同步 I/O。

use serde::Serialize;

use crate::evaluator::{ConditionOutcome, IndeterminateReason};
use crate::operators::Operator;
use crate::path::FieldPath;
use keeper_shared::observability::metrics;

/// 单次评估的计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub rules_total: u64,
    pub rules_evaluated: u64,
    pub rules_matched: u64,
    pub rules_skipped_unsampled: u64,
    pub rules_not_reached: u64,
    pub conditions_evaluated: u64,
    pub missing_fields: u64,
    pub null_values: u64,
    pub coercion_failures: u64,
}

impl Diagnostics {
    #[inline]
    pub(crate) fn record_condition(&mut self, outcome: ConditionOutcome) {
        self.conditions_evaluated += 1;
        match outcome.reason() {
            Some(IndeterminateReason::MissingField) => self.missing_fields += 1,
            Some(IndeterminateReason::NullValue) => self.null_values += 1,
            Some(IndeterminateReason::CoercionFailure) => self.coercion_failures += 1,
            None => {}
        }
    }

    /// 上报到 metrics
    pub fn emit(&self, tenant: &str, duration_secs: f64) {
        metrics::record_rule_evaluation(
            tenant,
            self.rules_evaluated,
            self.rules_matched,
            duration_secs,
        );
        metrics::record_skipped_unsampled(tenant, self.rules_skipped_unsampled);
        metrics::record_indeterminate_conditions(
            tenant,
            self.missing_fields,
            self.null_values,
            self.coercion_failures,
        );
    }
}

/// 单个条件的追踪记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionTrace {
    pub group: usize,
    pub field: FieldPath,
    pub operator: Operator,
    #[serde(flatten)]
    pub outcome: ConditionOutcome,
    /// 经缺失字段策略折叠后的布尔值
    pub holds: bool,
}

/// 单条规则的追踪记录，仅在开启追踪时生成
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationTrace {
    pub matched_group: Option<usize>,
    pub conditions: Vec<ConditionTrace>,
}
