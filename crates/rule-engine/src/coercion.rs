//! 类型转换与比较
//!
//! 记录中的值按条件声明的字段类型转换后再比较。转换失败与字段缺失是两种不同的结果，
//! 调用方必须分别统计。显式 null 不进入转换，由评估器单独处理。

use serde_json::Value;
use std::borrow::Cow;
use std::cmp::Ordering;

use crate::operators::{FieldType, Operator};

/// 转换后的值
///
/// 记录中的值借用原始数据，编译期字面量使用 `Typed<'static>` 持有所有权。
#[derive(Debug, Clone, PartialEq)]
pub enum Typed<'a> {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(Cow<'a, str>),
    /// any 类型保留原始 JSON 值
    Any(Cow<'a, Value>),
}

impl Typed<'_> {
    pub fn into_owned(self) -> Typed<'static> {
        match self {
            Typed::Int(i) => Typed::Int(i),
            Typed::Float(f) => Typed::Float(f),
            Typed::Bool(b) => Typed::Bool(b),
            Typed::Text(s) => Typed::Text(Cow::Owned(s.into_owned())),
            Typed::Any(v) => Typed::Any(Cow::Owned(v.into_owned())),
        }
    }
}

/// 将 JSON 值转换为声明的字段类型，失败返回 None
pub fn coerce(value: &Value, field_type: FieldType) -> Option<Typed<'_>> {
    if value.is_null() {
        return None;
    }

    match field_type {
        FieldType::Int => coerce_int(value).map(Typed::Int),
        FieldType::Float => coerce_float(value).map(Typed::Float),
        FieldType::Boolean => value.as_bool().map(Typed::Bool),
        FieldType::String => match value {
            Value::String(s) => Some(Typed::Text(Cow::Borrowed(s.as_str()))),
            Value::Number(n) => Some(Typed::Text(Cow::Owned(n.to_string()))),
            Value::Bool(b) => Some(Typed::Text(Cow::Owned(b.to_string()))),
            _ => None,
        },
        FieldType::Any => Some(Typed::Any(Cow::Borrowed(value))),
    }
}

fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            let f = n.as_f64()?;
            // 超出 i64 范围的整数（大 u64）也在这里被拒绝
            (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
        }
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn coerce_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite()),
        _ => None,
    }
}

/// 比较两个转换后的值
fn order(lhs: &Typed<'_>, rhs: &Typed<'_>) -> Option<Ordering> {
    match (lhs, rhs) {
        (Typed::Int(a), Typed::Int(b)) => Some(a.cmp(b)),
        (Typed::Float(a), Typed::Float(b)) => a.partial_cmp(b),
        (Typed::Bool(a), Typed::Bool(b)) => Some(a.cmp(b)),
        (Typed::Text(a), Typed::Text(b)) => Some(a.as_ref().cmp(b.as_ref())),
        (Typed::Any(a), Typed::Any(b)) => order_any(a, b),
        _ => None,
    }
}

/// any 类型：数字按数值比较，字符串按字典序比较，其余组合不可比较
fn order_any(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn as_text<'t>(value: &'t Typed<'_>) -> Option<&'t str> {
    match value {
        Typed::Text(s) => Some(s.as_ref()),
        Typed::Any(v) => v.as_str(),
        _ => None,
    }
}

/// 用操作符比较两个值，不可比较时返回 None（计为类型转换失败）
///
/// 存在性操作符和 in 不走这里。
pub fn compare(operator: Operator, lhs: &Typed<'_>, rhs: &Typed<'_>) -> Option<bool> {
    match operator {
        Operator::Prefix => Some(as_text(lhs)?.starts_with(as_text(rhs)?)),
        Operator::Suffix => Some(as_text(lhs)?.ends_with(as_text(rhs)?)),
        _ => {
            let ordering = order(lhs, rhs)?;
            match operator {
                Operator::Eq => Some(ordering == Ordering::Equal),
                Operator::Neq => Some(ordering != Ordering::Equal),
                Operator::Lt => Some(ordering == Ordering::Less),
                Operator::Lte => Some(ordering != Ordering::Greater),
                Operator::Gt => Some(ordering == Ordering::Greater),
                Operator::Gte => Some(ordering != Ordering::Less),
                _ => None,
            }
        }
    }
}

/// 集合成员判断；与所有成员都不可比较时返回 None
pub fn contains(set: &[Typed<'static>], value: &Typed<'_>) -> Option<bool> {
    if set.is_empty() {
        return Some(false);
    }
    let mut comparable = false;
    for member in set {
        match order(value, member) {
            Some(Ordering::Equal) => return Some(true),
            Some(_) => comparable = true,
            None => {}
        }
    }
    comparable.then_some(false)
}
