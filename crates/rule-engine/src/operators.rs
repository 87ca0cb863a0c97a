//! 规则操作符与字段类型定义
//!
//! 操作符和字段类型在编译期从字符串解析为封闭枚举，评估热路径上不再做字符串查找。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 条件操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    // 存在性检查
    Exists,
    IsNull,

    // 相等比较
    Eq,
    Neq,

    // 有序比较
    Lt,
    Lte,
    Gt,
    Gte,

    // 集合成员
    In,

    // 字符串操作
    Prefix,
    Suffix,
}

impl Operator {
    pub const ALL: [Operator; 11] = [
        Self::Exists,
        Self::IsNull,
        Self::Eq,
        Self::Neq,
        Self::Lt,
        Self::Lte,
        Self::Gt,
        Self::Gte,
        Self::In,
        Self::Prefix,
        Self::Suffix,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exists => "exists",
            Self::IsNull => "is_null",
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::In => "in",
            Self::Prefix => "prefix",
            Self::Suffix => "suffix",
        }
    }

    /// 是否只检查字段存在性（不需要比较值，也不做类型转换）
    pub fn is_presence_check(&self) -> bool {
        matches!(self, Self::Exists | Self::IsNull)
    }

    pub fn is_ordering(&self) -> bool {
        matches!(self, Self::Lt | Self::Lte | Self::Gt | Self::Gte)
    }

    pub fn is_string_match(&self) -> bool {
        matches!(self, Self::Prefix | Self::Suffix)
    }

    /// 是否允许与 field_ref 搭配使用
    pub fn supports_field_ref(&self) -> bool {
        !self.is_presence_check() && *self != Self::In
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exists" => Ok(Self::Exists),
            "is_null" => Ok(Self::IsNull),
            "eq" => Ok(Self::Eq),
            "neq" => Ok(Self::Neq),
            "lt" => Ok(Self::Lt),
            "lte" => Ok(Self::Lte),
            "gt" => Ok(Self::Gt),
            "gte" => Ok(Self::Gte),
            "in" => Ok(Self::In),
            "prefix" => Ok(Self::Prefix),
            "suffix" => Ok(Self::Suffix),
            _ => Err(s.to_string()),
        }
    }
}

/// 字段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Int,
    Boolean,
    Float,
    String,
    Any,
}

impl FieldType {
    pub const ALL: [FieldType; 5] = [
        Self::Int,
        Self::Boolean,
        Self::Float,
        Self::String,
        Self::Any,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Boolean => "boolean",
            Self::Float => "float",
            Self::String => "string",
            Self::Any => "any",
        }
    }

    /// 该类型是否支持有序比较
    pub fn is_ordered(&self) -> bool {
        !matches!(self, Self::Boolean)
    }

    /// 该类型是否支持前缀/后缀匹配
    pub fn supports_string_match(&self) -> bool {
        matches!(self, Self::String | Self::Any)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    /// 兼容历史别名：numeric -> float, text -> string
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Ok(Self::Int),
            "boolean" | "bool" => Ok(Self::Boolean),
            "float" | "numeric" => Ok(Self::Float),
            "string" | "text" => Ok(Self::String),
            "any" => Ok(Self::Any),
            _ => Err(s.to_string()),
        }
    }
}

/// 规则命中后交给调用方的处置动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Observe,
    Drop,
    Fail,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Observe => write!(f, "observe"),
            Self::Drop => write!(f, "drop"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// 规则生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleState {
    #[default]
    Draft,
    Active,
    Disabled,
}

impl fmt::Display for RuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Active => write!(f, "active"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_round_trip_names() {
        for op in Operator::ALL {
            assert_eq!(op.as_str().parse::<Operator>().unwrap(), op);
        }
        assert_eq!(" GTE ".parse::<Operator>().unwrap(), Operator::Gte);
        assert!("between".parse::<Operator>().is_err());
    }

    #[test]
    fn test_field_type_aliases() {
        assert_eq!("numeric".parse::<FieldType>().unwrap(), FieldType::Float);
        assert_eq!("text".parse::<FieldType>().unwrap(), FieldType::String);
        assert_eq!("bool".parse::<FieldType>().unwrap(), FieldType::Boolean);
        assert_eq!("integer".parse::<FieldType>().unwrap(), FieldType::Int);
        assert!("datetime".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_field_ref_support() {
        assert!(Operator::Eq.supports_field_ref());
        assert!(Operator::Prefix.supports_field_ref());
        assert!(!Operator::In.supports_field_ref());
        assert!(!Operator::Exists.supports_field_ref());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Operator::IsNull).unwrap(), "\"is_null\"");
        assert_eq!(serde_json::to_string(&Action::Drop).unwrap(), "\"drop\"");
        let state: RuleState = serde_json::from_str("\"active\"").unwrap();
        assert_eq!(state, RuleState::Active);
    }
}
