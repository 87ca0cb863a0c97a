//! 规则匹配器
//!
//! 按优先级顺序遍历规则集：先采样，再按文档顺序评估 OR 组，组内按成本顺序 AND 短路。
//! 匹配器本身无状态、不加锁，可以在任意多个线程上同时评估同一个快照。

use serde::Serialize;
use serde::ser::SerializeStruct;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

use crate::compiler::CompiledRule;
use crate::diagnostics::{ConditionTrace, Diagnostics, EvaluationTrace};
use crate::evaluator::{ConditionEvaluator, DeclaredPolicy, MissingFieldPolicy};
use crate::operators::Action;
use crate::ruleset::RuleSet;
use crate::sampler::{RandomSource, RngSource, Sampler};
use crate::store::RuleSetHandle;

/// 单条规则在一次评估中的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOutcome {
    /// 未被采样选中，没有评估任何条件
    Skipped,
    Matched,
    NotMatched,
    /// 截止时间已到，未评估
    NotReached,
}

/// 单条规则的评估结果
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub rule: Arc<CompiledRule>,
    pub outcome: RuleOutcome,
    pub trace: Option<EvaluationTrace>,
}

impl EvaluationResult {
    pub fn rule_id(&self) -> &str {
        self.rule.id()
    }

    pub fn matched(&self) -> bool {
        self.outcome == RuleOutcome::Matched
    }

    /// 规则声明的处置动作，由调用方执行
    pub fn action(&self) -> Action {
        self.rule.action()
    }
}

impl Serialize for EvaluationResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("EvaluationResult", 6)?;
        state.serialize_field("rule_id", self.rule.id())?;
        state.serialize_field("rule_name", self.rule.name())?;
        state.serialize_field("outcome", &self.outcome)?;
        state.serialize_field("matched", &self.matched())?;
        state.serialize_field("action", &self.action())?;
        state.serialize_field("trace", &self.trace)?;
        state.end()
    }
}

/// 一条记录针对一个规则集的评估
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub ruleset_version: u64,
    pub results: Vec<EvaluationResult>,
    pub diagnostics: Diagnostics,
    /// 是否因截止时间提前结束
    pub truncated: bool,
}

impl Evaluation {
    /// 命中的规则，按评估顺序
    pub fn matches(&self) -> impl Iterator<Item = &EvaluationResult> {
        self.results.iter().filter(|r| r.matched())
    }

    pub fn result(&self, rule_id: &str) -> Option<&EvaluationResult> {
        self.results.iter().find(|r| r.rule_id() == rule_id)
    }
}

/// 规则匹配器
#[derive(Clone)]
pub struct RuleMatcher {
    trace_enabled: bool,
    policy: Arc<dyn MissingFieldPolicy>,
}

impl RuleMatcher {
    pub fn new() -> Self {
        Self {
            trace_enabled: false,
            policy: Arc::new(DeclaredPolicy),
        }
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    pub fn with_trace_enabled(mut self, enabled: bool) -> Self {
        self.trace_enabled = enabled;
        self
    }

    /// 替换匹配器级别的缺失字段策略
    pub fn with_policy(mut self, policy: Arc<dyn MissingFieldPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// 使用线程本地随机源评估
    pub fn evaluate(&self, record: &Value, rules: &RuleSet) -> Evaluation {
        let mut sampler = Sampler::new(RngSource::new(rand::rng()));
        self.run(record, rules, &mut sampler, self.policy.as_ref(), None)
    }

    /// 读取句柄当前快照并评估，评估期间快照被替换不影响本次结果
    pub fn evaluate_handle(&self, record: &Value, handle: &RuleSetHandle) -> Evaluation {
        let snapshot = handle.load();
        self.evaluate(record, &snapshot)
    }

    /// 使用注入的采样器评估
    pub fn evaluate_with<S: RandomSource>(
        &self,
        record: &Value,
        rules: &RuleSet,
        sampler: &mut Sampler<S>,
    ) -> Evaluation {
        self.run(record, rules, sampler, self.policy.as_ref(), None)
    }

    /// 为单条记录指定缺失字段策略
    pub fn evaluate_with_policy<S: RandomSource>(
        &self,
        record: &Value,
        rules: &RuleSet,
        sampler: &mut Sampler<S>,
        policy: &dyn MissingFieldPolicy,
    ) -> Evaluation {
        self.run(record, rules, sampler, policy, None)
    }

    /// 带截止时间的评估，只在整条规则之间检查截止时间
    pub fn evaluate_within<S: RandomSource>(
        &self,
        record: &Value,
        rules: &RuleSet,
        sampler: &mut Sampler<S>,
        deadline: Instant,
    ) -> Evaluation {
        self.run(record, rules, sampler, self.policy.as_ref(), Some(deadline))
    }

    fn run<S: RandomSource>(
        &self,
        record: &Value,
        rules: &RuleSet,
        sampler: &mut Sampler<S>,
        policy: &dyn MissingFieldPolicy,
        deadline: Option<Instant>,
    ) -> Evaluation {
        let start = Instant::now();
        let mut diagnostics = Diagnostics {
            rules_total: rules.len() as u64,
            ..Default::default()
        };
        let mut results = Vec::with_capacity(rules.len());
        let mut truncated = false;

        for rule in rules.rules() {
            if truncated || deadline.is_some_and(|d| Instant::now() >= d) {
                truncated = true;
                diagnostics.rules_not_reached += 1;
                results.push(EvaluationResult {
                    rule: Arc::clone(rule),
                    outcome: RuleOutcome::NotReached,
                    trace: None,
                });
                continue;
            }

            if !sampler.should_evaluate(rule.sample_rate()) {
                diagnostics.rules_skipped_unsampled += 1;
                results.push(EvaluationResult {
                    rule: Arc::clone(rule),
                    outcome: RuleOutcome::Skipped,
                    trace: None,
                });
                continue;
            }

            diagnostics.rules_evaluated += 1;
            let (matched_group, trace) = self.match_rule(rule, record, policy, &mut diagnostics);

            let outcome = if let Some(group) = matched_group {
                diagnostics.rules_matched += 1;
                trace!(rule_id = %rule.id(), group, action = %rule.action(), "规则命中");
                RuleOutcome::Matched
            } else {
                RuleOutcome::NotMatched
            };

            results.push(EvaluationResult {
                rule: Arc::clone(rule),
                outcome,
                trace,
            });
        }

        diagnostics.emit(rules.tenant(), start.elapsed().as_secs_f64());

        Evaluation {
            ruleset_version: rules.version(),
            results,
            diagnostics,
            truncated,
        }
    }

    /// 返回命中的 OR 组下标
    fn match_rule(
        &self,
        rule: &CompiledRule,
        record: &Value,
        policy: &dyn MissingFieldPolicy,
        diagnostics: &mut Diagnostics,
    ) -> (Option<usize>, Option<EvaluationTrace>) {
        let mut trace = self.trace_enabled.then(EvaluationTrace::default);

        for (g, group) in rule.or_groups().iter().enumerate() {
            let mut group_holds = true;

            for compiled in group.conditions() {
                let condition = compiled.condition();
                let outcome = ConditionEvaluator::evaluate(condition, record);
                diagnostics.record_condition(outcome);
                let holds = ConditionEvaluator::holds(condition, outcome, policy);

                if let Some(trace) = trace.as_mut() {
                    trace.conditions.push(ConditionTrace {
                        group: g,
                        field: condition.field.clone(),
                        operator: condition.operator,
                        outcome,
                        holds,
                    });
                }

                if !holds {
                    group_holds = false;
                    break;
                }
            }

            if group_holds {
                if let Some(trace) = trace.as_mut() {
                    trace.matched_group = Some(g);
                }
                return (Some(g), trace);
            }
        }

        (None, trace)
    }
}

impl Default for RuleMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RuleMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleMatcher")
            .field("trace_enabled", &self.trace_enabled)
            .finish_non_exhaustive()
    }
}
