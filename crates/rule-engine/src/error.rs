//! 规则引擎错误类型
//!
//! 编译期错误只拒绝出错的规则本身，不影响同批次其他规则；运行期的字段缺失和类型转换失败
//! 不是错误，由评估结果中的原因和诊断计数体现。

use keeper_shared::KeeperError;
use std::fmt;
use thiserror::Error;

use crate::operators::{FieldType, Operator};

/// 条件在规则表达式中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConditionLocation {
    pub group: usize,
    pub condition: usize,
}

impl ConditionLocation {
    pub fn new(group: usize, condition: usize) -> Self {
        Self { group, condition }
    }
}

impl fmt::Display for ConditionLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "or_groups[{}].conditions[{}]", self.group, self.condition)
    }
}

/// 规则校验错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{location}: 路径 {path} 包含 {count} 个通配符，上限为 {max}")]
    TooManyWildcards {
        location: ConditionLocation,
        path: String,
        count: usize,
        max: usize,
    },

    #[error("{location}: field_ref 路径 {path} 不允许包含通配符")]
    WildcardInFieldRef {
        location: ConditionLocation,
        path: String,
    },

    #[error("{location}: 未知的操作符 '{operator}'")]
    UnknownOperator {
        location: ConditionLocation,
        operator: String,
    },

    #[error("{location}: 未知的字段类型 '{field_type}'")]
    UnknownFieldType {
        location: ConditionLocation,
        field_type: String,
    },

    #[error("采样率 {0} 超出范围 [0.0, 1.0]")]
    InvalidSampleRate(f64),

    #[error("{location}: 路径 {path} 深度 {depth} 超过上限 {max}")]
    PathTooDeep {
        location: ConditionLocation,
        path: String,
        depth: usize,
        max: usize,
    },

    #[error("{location}: in 操作符包含 {count} 个值，上限为 {max}")]
    TooManyInValues {
        location: ConditionLocation,
        count: usize,
        max: usize,
    },

    #[error("规则表达式为空{}", .group.map(|g| format!(": or_groups[{}] 没有条件", g)).unwrap_or_default())]
    EmptyExpression { group: Option<usize> },

    #[error("{location}: 无效的字段路径 - {reason}")]
    InvalidFieldPath {
        location: ConditionLocation,
        reason: String,
    },

    #[error("{location}: 字面量 {literal} 无法转换为 {field_type}")]
    InvalidLiteral {
        location: ConditionLocation,
        field_type: FieldType,
        literal: String,
    },

    #[error("{location}: 操作符 {operator} 需要 value 或 field_ref")]
    MissingOperand {
        location: ConditionLocation,
        operator: Operator,
    },

    #[error("{location}: 操作符 {operator} 不支持 field_ref")]
    FieldRefNotSupported {
        location: ConditionLocation,
        operator: Operator,
    },

    #[error("{location}: value 与 field_ref 不能同时出现")]
    ConflictingOperands { location: ConditionLocation },

    #[error("{location}: 操作符 {operator} 不支持类型 {field_type}")]
    IncompatibleOperator {
        location: ConditionLocation,
        operator: Operator,
        field_type: FieldType,
    },
}

impl ValidationError {
    /// 稳定的机器可读错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::TooManyWildcards { .. } => "TOO_MANY_WILDCARDS",
            Self::WildcardInFieldRef { .. } => "WILDCARD_IN_FIELD_REF",
            Self::UnknownOperator { .. } => "UNKNOWN_OPERATOR",
            Self::UnknownFieldType { .. } => "UNKNOWN_FIELD_TYPE",
            Self::InvalidSampleRate(_) => "INVALID_SAMPLE_RATE",
            Self::PathTooDeep { .. } => "PATH_TOO_DEEP",
            Self::TooManyInValues { .. } => "TOO_MANY_IN_VALUES",
            Self::EmptyExpression { .. } => "EMPTY_EXPRESSION",
            Self::InvalidFieldPath { .. } => "INVALID_FIELD_PATH",
            Self::InvalidLiteral { .. } => "INVALID_LITERAL",
            Self::MissingOperand { .. } => "MISSING_OPERAND",
            Self::FieldRefNotSupported { .. } => "FIELD_REF_NOT_SUPPORTED",
            Self::ConflictingOperands { .. } => "CONFLICTING_OPERANDS",
            Self::IncompatibleOperator { .. } => "INCOMPATIBLE_OPERATOR",
        }
    }
}

/// 非致命的校验警告，规则仍会被接纳
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// 通配符路径未配置采样，每条记录都会展开
    WildcardWithoutSampling {
        location: ConditionLocation,
        path: String,
    },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WildcardWithoutSampling { location, path } => write!(
                f,
                "{}: 通配符路径 {} 未配置采样 (sample_rate = 1.0)",
                location, path
            ),
        }
    }
}

/// 单条规则的编译失败，包含该规则的全部校验错误
#[derive(Debug, Clone, PartialEq, Error)]
#[error("规则 {rule_id} 编译失败: {}", format_errors(.errors))]
pub struct CompileError {
    pub rule_id: String,
    pub errors: Vec<ValidationError>,
}

impl CompileError {
    pub fn new(rule_id: impl Into<String>, errors: Vec<ValidationError>) -> Self {
        Self {
            rule_id: rule_id.into(),
            errors,
        }
    }

    /// 是否包含指定错误码
    pub fn has_code(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.code() == code)
    }
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// 引擎级错误
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("规则解析失败: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("配置错误: {0}")]
    Config(#[from] KeeperError),

    #[error("无效的引擎配置: {0}")]
    InvalidConfig(String),

    #[error("租户不存在: {0}")]
    UnknownTenant(String),
}

impl RuleError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Json(_) => "PARSE_ERROR",
            Self::Compile(_) => "COMPILE_ERROR",
            Self::Config(e) => e.code(),
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::UnknownTenant(_) => "UNKNOWN_TENANT",
        }
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;
