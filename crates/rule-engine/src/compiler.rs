//! 规则编译器
//!
//! 将原始规则校验并编译为不可变的执行结构：条件已解析、字面量已转换、
//! 组内条件按成本升序排列、优先级已计算。编译要么完全成功，要么整条规则被拒绝。

use chrono::{DateTime, Utc};
use keeper_shared::observability::metrics::record_rule_compile;
use std::collections::BTreeSet;
use tracing::{debug, instrument, warn};

use crate::error::{CompileError, Result, ValidationWarning};
use crate::evaluator::Condition;
use crate::models::Rule;
use crate::operators::{Action, RuleState};
use crate::validator::{RuleValidator, ValidatedCondition};

/// 编译后的条件
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    condition: Condition,
    cost: u64,
}

impl CompiledCondition {
    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn cost(&self) -> u64 {
        self.cost
    }
}

impl From<ValidatedCondition> for CompiledCondition {
    fn from(validated: ValidatedCondition) -> Self {
        Self {
            condition: validated.condition,
            cost: validated.cost,
        }
    }
}

/// 编译后的 AND 组，条件按成本升序
#[derive(Debug, Clone)]
pub struct CompiledOrGroup {
    conditions: Box<[CompiledCondition]>,
}

impl CompiledOrGroup {
    pub fn conditions(&self) -> &[CompiledCondition] {
        &self.conditions
    }
}

/// 编译后的规则
#[derive(Debug, Clone)]
pub struct CompiledRule {
    id: String,
    name: String,
    state: RuleState,
    action: Action,
    sample_rate: f64,
    scope_tags: BTreeSet<String>,
    or_groups: Box<[CompiledOrGroup]>,
    priority: u64,
    created_at: DateTime<Utc>,
    warnings: Vec<ValidationWarning>,
}

impl CompiledRule {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> RuleState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == RuleState::Active
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn scope_tags(&self) -> &BTreeSet<String> {
        &self.scope_tags
    }

    /// 按文档顺序排列的 OR 组
    pub fn or_groups(&self) -> &[CompiledOrGroup] {
        &self.or_groups
    }

    pub fn priority(&self) -> u64 {
        self.priority
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }

    pub fn condition_count(&self) -> usize {
        self.or_groups.iter().map(|g| g.conditions.len()).sum()
    }
}

/// 规则编译器
#[derive(Debug, Clone, Default)]
pub struct RuleCompiler {
    validator: RuleValidator,
}

impl RuleCompiler {
    pub fn new(validator: RuleValidator) -> Self {
        Self { validator }
    }

    pub fn validator(&self) -> &RuleValidator {
        &self.validator
    }

    /// 从 JSON 字符串编译规则
    pub fn compile_from_json(&self, json: &str) -> Result<CompiledRule> {
        let rule: Rule = serde_json::from_str(json)?;
        Ok(self.compile(&rule)?)
    }

    /// 编译规则
    #[instrument(skip(self, rule), fields(rule_id = %rule.id, rule_name = %rule.name))]
    pub fn compile(&self, rule: &Rule) -> std::result::Result<CompiledRule, CompileError> {
        let validated = match self.validator.validate(rule) {
            Ok(validated) => validated,
            Err(errors) => {
                let err = CompileError::new(rule.id.clone(), errors);
                warn!(error_count = err.errors.len(), "规则编译失败: {}", err);
                record_rule_compile("rejected");
                return Err(err);
            }
        };

        for warning in &validated.warnings {
            warn!(%warning, "规则校验警告");
        }

        let sample_rate = rule.sample_rate.clamp(0.0, 1.0);
        let priority = self.validator.cost_model().rule_priority(
            validated.or_groups.iter().flatten().map(|c| c.cost),
            validated.or_groups.len(),
            sample_rate,
        );

        let or_groups = validated
            .or_groups
            .into_iter()
            .map(|mut conditions| {
                // 稳定排序：成本相同的条件保持原始顺序
                conditions.sort_by_key(|c| c.cost);
                CompiledOrGroup {
                    conditions: conditions.into_iter().map(CompiledCondition::from).collect(),
                }
            })
            .collect();

        record_rule_compile("ok");
        debug!(priority, "规则编译完成");

        Ok(CompiledRule {
            id: rule.id.clone(),
            name: rule.name.clone(),
            state: rule.state,
            action: rule.action,
            sample_rate,
            scope_tags: rule.scope_tags.clone(),
            or_groups,
            priority,
            created_at: rule.created_at,
            warnings: validated.warnings,
        })
    }

    /// 批量编译，每条规则独立成败
    #[instrument(skip(self, rules), fields(rule_count = rules.len()))]
    pub fn compile_batch(&self, rules: &[Rule]) -> (Vec<CompiledRule>, Vec<CompileError>) {
        let mut compiled = Vec::with_capacity(rules.len());
        let mut failed = Vec::new();

        for rule in rules {
            match self.compile(rule) {
                Ok(c) => compiled.push(c),
                Err(e) => failed.push(e),
            }
        }

        if !failed.is_empty() {
            warn!(
                compiled = compiled.len(),
                failed = failed.len(),
                "批量编译部分失败"
            );
        }

        (compiled, failed)
    }
}
