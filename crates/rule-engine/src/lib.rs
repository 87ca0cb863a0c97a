//! 统一规则引擎
//!
//! 按租户隔离的规则编译与评估能力，支持：
//! - 嵌套对象/数组上的字段路径解析（含存在量词语义的通配符）
//! - 可配置的成本模型，规则按优先级、条件按成本排序
//! - 编译期通配符与类型校验
//! - 带类型转换的条件评估，区分缺失、空值与转换失败
//! - AND/OR 短路匹配与可注入随机源的采样
//! - 不可变规则集快照与原子替换

pub mod coercion;
pub mod compiler;
pub mod config;
pub mod cost;
pub mod diagnostics;
pub mod error;
pub mod evaluator;
pub mod matcher;
pub mod models;
pub mod operators;
pub mod path;
pub mod ruleset;
pub mod sampler;
pub mod store;
pub mod validator;

pub use compiler::{CompiledCondition, CompiledOrGroup, CompiledRule, RuleCompiler};
pub use config::EngineConfig;
pub use cost::{CostConfig, CostModel};
pub use diagnostics::{ConditionTrace, Diagnostics, EvaluationTrace};
pub use error::{
    CompileError, ConditionLocation, Result, RuleError, ValidationError, ValidationWarning,
};
pub use evaluator::{
    Condition, ConditionEvaluator, ConditionOutcome, DeclaredPolicy, IndeterminateReason,
    MissingFieldPolicy, Operand, StrictPolicy,
};
pub use matcher::{Evaluation, EvaluationResult, RuleMatcher, RuleOutcome};
pub use models::{ConditionDef, Expression, OnMissing, OrGroupDef, Rule};
pub use operators::{Action, FieldType, Operator, RuleState};
pub use path::{FieldPath, PathSegment, RawFieldPath, Resolution};
pub use ruleset::RuleSet;
pub use sampler::{RandomSource, RngSource, Sampler};
pub use store::{RefreshReport, RuleSetHandle, StoreStats, TenantRuleStore, load_rule_set};
pub use validator::{LimitConfig, RuleValidator};
