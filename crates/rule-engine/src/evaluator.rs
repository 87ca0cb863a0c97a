//! 条件评估器
//!
//! 单个条件的求值分两步：先得到三值结果（真 / 假 / 无法确定及原因），
//! 再由缺失字段策略把无法确定的结果折叠为布尔值。原因保留给诊断统计。

use serde::Serialize;
use serde_json::Value;

use crate::coercion::{self, Typed};
use crate::models::OnMissing;
use crate::operators::{FieldType, Operator};
use crate::path::FieldPath;

/// 编译后的比较对象
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// exists / is_null 不需要比较对象
    None,
    /// 已按字段类型转换的字面量
    Literal(Typed<'static>),
    /// in 操作符的成员集合
    Set(Vec<Typed<'static>>),
    /// 与记录中另一个字段比较（不含通配符）
    FieldRef(FieldPath),
}

/// 编译后的条件
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: FieldPath,
    pub operator: Operator,
    pub field_type: FieldType,
    pub operand: Operand,
    pub on_missing: OnMissing,
}

impl Condition {
    pub fn field_ref(&self) -> Option<&FieldPath> {
        match &self.operand {
            Operand::FieldRef(path) => Some(path),
            _ => None,
        }
    }
}

/// 无法确定结果的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndeterminateReason {
    /// 字段不存在
    MissingField,
    /// 字段存在但为显式 null
    NullValue,
    /// 字段存在但无法转换为声明类型
    CoercionFailure,
}

/// 条件的三值结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum ConditionOutcome {
    True,
    False,
    Indeterminate(IndeterminateReason),
}

impl ConditionOutcome {
    pub fn reason(&self) -> Option<IndeterminateReason> {
        match self {
            Self::Indeterminate(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// 缺失字段策略
///
/// 只对 MissingField 和 NullValue 生效；类型转换失败始终为 false，不经过策略。
pub trait MissingFieldPolicy: Send + Sync {
    fn resolve(&self, condition: &Condition, reason: IndeterminateReason) -> bool;
}

/// 默认策略：使用条件上声明的 on_missing_field
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredPolicy;

impl MissingFieldPolicy for DeclaredPolicy {
    fn resolve(&self, condition: &Condition, _reason: IndeterminateReason) -> bool {
        condition.on_missing == OnMissing::Match
    }
}

/// 严格策略：忽略条件声明，缺失一律为 false
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictPolicy;

impl MissingFieldPolicy for StrictPolicy {
    fn resolve(&self, _condition: &Condition, _reason: IndeterminateReason) -> bool {
        false
    }
}

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估条件
    ///
    /// 通配符路径采用存在语义：任一分支满足即为真。没有分支为真时，
    /// 任一分支明确为假则结果为假；否则按 null、类型转换失败的顺序给出原因。
    pub fn evaluate(condition: &Condition, record: &Value) -> ConditionOutcome {
        let mut branches = condition.field.resolve(record).peekable();

        match condition.operator {
            Operator::Exists => {
                return if branches.peek().is_some() {
                    ConditionOutcome::True
                } else {
                    ConditionOutcome::False
                };
            }
            Operator::IsNull => {
                return if branches.any(Value::is_null) {
                    ConditionOutcome::True
                } else {
                    ConditionOutcome::False
                };
            }
            _ => {}
        }

        if branches.peek().is_none() {
            return ConditionOutcome::Indeterminate(IndeterminateReason::MissingField);
        }

        let referenced: Typed<'_>;
        let rhs = match &condition.operand {
            Operand::None => return ConditionOutcome::False,
            Operand::Literal(literal) => Rhs::One(literal),
            Operand::Set(members) => Rhs::Set(members),
            Operand::FieldRef(path) => match path.resolve(record).next() {
                None => return ConditionOutcome::Indeterminate(IndeterminateReason::MissingField),
                Some(Value::Null) => {
                    return ConditionOutcome::Indeterminate(IndeterminateReason::NullValue);
                }
                Some(value) => match coercion::coerce(value, condition.field_type) {
                    Some(typed) => {
                        referenced = typed;
                        Rhs::One(&referenced)
                    }
                    None => {
                        return ConditionOutcome::Indeterminate(
                            IndeterminateReason::CoercionFailure,
                        );
                    }
                },
            },
        };

        let mut saw_false = false;
        let mut saw_null = false;
        let mut saw_coercion_failure = false;

        for value in branches {
            if value.is_null() {
                saw_null = true;
                continue;
            }
            let Some(lhs) = coercion::coerce(value, condition.field_type) else {
                saw_coercion_failure = true;
                continue;
            };
            let result = match rhs {
                Rhs::One(expected) => coercion::compare(condition.operator, &lhs, expected),
                Rhs::Set(members) => coercion::contains(members, &lhs),
            };
            match result {
                Some(true) => return ConditionOutcome::True,
                Some(false) => saw_false = true,
                None => saw_coercion_failure = true,
            }
        }

        if saw_false {
            ConditionOutcome::False
        } else if saw_null {
            ConditionOutcome::Indeterminate(IndeterminateReason::NullValue)
        } else if saw_coercion_failure {
            ConditionOutcome::Indeterminate(IndeterminateReason::CoercionFailure)
        } else {
            ConditionOutcome::False
        }
    }

    /// 把三值结果折叠为布尔值
    pub fn holds(
        condition: &Condition,
        outcome: ConditionOutcome,
        policy: &dyn MissingFieldPolicy,
    ) -> bool {
        match outcome {
            ConditionOutcome::True => true,
            ConditionOutcome::False => false,
            ConditionOutcome::Indeterminate(IndeterminateReason::CoercionFailure) => false,
            ConditionOutcome::Indeterminate(reason) => policy.resolve(condition, reason),
        }
    }
}

#[derive(Clone, Copy)]
enum Rhs<'r, 'v> {
    One(&'r Typed<'v>),
    Set(&'r [Typed<'static>]),
}
