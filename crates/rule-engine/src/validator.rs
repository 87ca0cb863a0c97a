//! 规则校验
//!
//! 编译期关口：路径深度、通配符数量、操作符与字段类型、比较对象和采样率都在这里检查。
//! 一条规则的所有错误会一次性收集返回，而不是遇到第一个就停止。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coercion::{self, Typed};
use crate::cost::CostModel;
use crate::error::{ConditionLocation, ValidationError, ValidationWarning};
use crate::evaluator::{Condition, Operand};
use crate::models::{ConditionDef, Rule};
use crate::operators::{FieldType, Operator};
use crate::path::{FieldPath, MAX_WILDCARD_DEPTH, RawFieldPath};

/// 资源限制配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    /// 单个路径通配符数量的硬限制
    pub max_wildcards: usize,
    /// 达到该数量且未采样时给出警告
    pub soft_wildcards: usize,
    pub max_path_depth: usize,
    pub max_in_values: usize,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_wildcards: 2,
            soft_wildcards: 1,
            max_path_depth: 16,
            max_in_values: 64,
        }
    }
}

impl LimitConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_wildcards > MAX_WILDCARD_DEPTH {
            return Err(format!(
                "max_wildcards = {} 超过解析器上限 {}",
                self.max_wildcards, MAX_WILDCARD_DEPTH
            ));
        }
        if self.soft_wildcards > self.max_wildcards {
            return Err(format!(
                "soft_wildcards = {} 大于 max_wildcards = {}",
                self.soft_wildcards, self.max_wildcards
            ));
        }
        if self.max_path_depth == 0 {
            return Err("max_path_depth 必须大于 0".to_string());
        }
        Ok(())
    }
}

/// 通过校验的条件及其成本
#[derive(Debug, Clone)]
pub struct ValidatedCondition {
    pub condition: Condition,
    pub cost: u64,
}

/// 通过校验的规则表达式，保持文档顺序
#[derive(Debug, Clone)]
pub struct ValidatedRule {
    pub or_groups: Vec<Vec<ValidatedCondition>>,
    pub warnings: Vec<ValidationWarning>,
}

/// 规则校验器
#[derive(Debug, Clone)]
pub struct RuleValidator {
    cost_model: CostModel,
    limits: LimitConfig,
}

impl RuleValidator {
    pub fn new(cost_model: CostModel, limits: LimitConfig) -> Self {
        Self { cost_model, limits }
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost_model
    }

    pub fn limits(&self) -> &LimitConfig {
        &self.limits
    }

    /// 校验规则并解析所有条件
    pub fn validate(&self, rule: &Rule) -> Result<ValidatedRule, Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if !(0.0..=1.0).contains(&rule.sample_rate) {
            errors.push(ValidationError::InvalidSampleRate(rule.sample_rate));
        }

        if rule.expression.or_groups.is_empty() {
            errors.push(ValidationError::EmptyExpression { group: None });
        }

        let mut or_groups = Vec::with_capacity(rule.expression.or_groups.len());
        for (g, group) in rule.expression.or_groups.iter().enumerate() {
            if group.conditions.is_empty() {
                errors.push(ValidationError::EmptyExpression { group: Some(g) });
                continue;
            }

            let mut conditions = Vec::with_capacity(group.conditions.len());
            for (c, def) in group.conditions.iter().enumerate() {
                let location = ConditionLocation::new(g, c);
                match self.validate_condition(def, location, rule.sample_rate, &mut warnings) {
                    Ok(validated) => conditions.push(validated),
                    Err(mut condition_errors) => errors.append(&mut condition_errors),
                }
            }
            or_groups.push(conditions);
        }

        if errors.is_empty() {
            Ok(ValidatedRule {
                or_groups,
                warnings,
            })
        } else {
            Err(errors)
        }
    }

    fn validate_condition(
        &self,
        def: &ConditionDef,
        location: ConditionLocation,
        sample_rate: f64,
        warnings: &mut Vec<ValidationWarning>,
    ) -> Result<ValidatedCondition, Vec<ValidationError>> {
        let mut errors = Vec::new();

        let field = self.check_path(&def.field, location, &mut errors);
        if let Some(field) = &field {
            let wildcards = field.wildcard_count();
            if wildcards > self.limits.max_wildcards {
                errors.push(ValidationError::TooManyWildcards {
                    location,
                    path: field.to_string(),
                    count: wildcards,
                    max: self.limits.max_wildcards,
                });
            } else if wildcards > 0 && wildcards == self.limits.soft_wildcards && sample_rate >= 1.0
            {
                warnings.push(ValidationWarning::WildcardWithoutSampling {
                    location,
                    path: field.to_string(),
                });
            }
        }

        let field_ref = def.field_ref.as_ref().and_then(|raw| {
            let path = self.check_path(raw, location, &mut errors)?;
            let wildcards = path.wildcard_count();
            if wildcards > self.limits.max_wildcards {
                errors.push(ValidationError::TooManyWildcards {
                    location,
                    path: path.to_string(),
                    count: wildcards,
                    max: self.limits.max_wildcards,
                });
            }
            if wildcards > 0 {
                errors.push(ValidationError::WildcardInFieldRef {
                    location,
                    path: path.to_string(),
                });
            }
            Some(path)
        });

        let operator = match def.operator.parse::<Operator>() {
            Ok(op) if self.cost_model.operator_cost(op).is_some() => Some(op),
            _ => {
                errors.push(ValidationError::UnknownOperator {
                    location,
                    operator: def.operator.clone(),
                });
                None
            }
        };

        let field_type = match def.field_type.parse::<FieldType>() {
            Ok(ft) if self.cost_model.type_multiplier(ft).is_some() => Some(ft),
            _ => {
                errors.push(ValidationError::UnknownFieldType {
                    location,
                    field_type: def.field_type.clone(),
                });
                None
            }
        };

        let (Some(field), Some(operator), Some(field_type)) = (field, operator, field_type) else {
            return Err(errors);
        };

        if (operator.is_ordering() && !field_type.is_ordered())
            || (operator.is_string_match() && !field_type.supports_string_match())
        {
            errors.push(ValidationError::IncompatibleOperator {
                location,
                operator,
                field_type,
            });
        }

        let operand = self.check_operand(def, operator, field_type, field_ref, location, &mut errors);

        if !errors.is_empty() {
            return Err(errors);
        }

        let condition = Condition {
            field,
            operator,
            field_type,
            operand: operand.unwrap_or(Operand::None),
            on_missing: def.on_missing_field,
        };
        let cost = self
            .cost_model
            .condition_cost(&condition.field, condition.field_ref(), operator, field_type)
            .unwrap_or(u64::MAX);

        Ok(ValidatedCondition { condition, cost })
    }

    /// 解析路径并检查深度
    fn check_path(
        &self,
        raw: &RawFieldPath,
        location: ConditionLocation,
        errors: &mut Vec<ValidationError>,
    ) -> Option<FieldPath> {
        match FieldPath::try_from(raw) {
            Ok(path) if path.len() > self.limits.max_path_depth => {
                errors.push(ValidationError::PathTooDeep {
                    location,
                    path: path.to_string(),
                    depth: path.len(),
                    max: self.limits.max_path_depth,
                });
                None
            }
            Ok(path) => Some(path),
            Err(e) => {
                errors.push(ValidationError::InvalidFieldPath {
                    location,
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    /// 检查比较对象并在编译期完成字面量类型转换
    fn check_operand(
        &self,
        def: &ConditionDef,
        operator: Operator,
        field_type: FieldType,
        field_ref: Option<FieldPath>,
        location: ConditionLocation,
        errors: &mut Vec<ValidationError>,
    ) -> Option<Operand> {
        if operator.is_presence_check() {
            if def.field_ref.is_some() {
                errors.push(ValidationError::FieldRefNotSupported { location, operator });
            }
            return Some(Operand::None);
        }

        match (&def.value, def.field_ref.is_some()) {
            (Some(_), true) => {
                errors.push(ValidationError::ConflictingOperands { location });
                None
            }
            (None, false) => {
                errors.push(ValidationError::MissingOperand { location, operator });
                None
            }
            (None, true) if !operator.supports_field_ref() => {
                errors.push(ValidationError::FieldRefNotSupported { location, operator });
                None
            }
            (None, true) => field_ref.map(Operand::FieldRef),
            (Some(value), false) if operator == Operator::In => {
                let Some(members) = value.as_array() else {
                    errors.push(invalid_literal(location, field_type, value));
                    return None;
                };
                if members.len() > self.limits.max_in_values {
                    errors.push(ValidationError::TooManyInValues {
                        location,
                        count: members.len(),
                        max: self.limits.max_in_values,
                    });
                    return None;
                }
                let mut set = Vec::with_capacity(members.len());
                for member in members {
                    match coerce_literal(member, field_type, operator) {
                        Some(typed) => set.push(typed),
                        None => errors.push(invalid_literal(location, field_type, member)),
                    }
                }
                Some(Operand::Set(set))
            }
            (Some(value), false) => match coerce_literal(value, field_type, operator) {
                Some(typed) => Some(Operand::Literal(typed)),
                None => {
                    errors.push(invalid_literal(location, field_type, value));
                    None
                }
            },
        }
    }
}

impl Default for RuleValidator {
    fn default() -> Self {
        Self::new(CostModel::default(), LimitConfig::default())
    }
}

fn coerce_literal(value: &Value, field_type: FieldType, operator: Operator) -> Option<Typed<'static>> {
    // any 类型的前缀/后缀匹配只接受字符串字面量
    if operator.is_string_match() && !value.is_string() {
        return None;
    }
    if field_type == FieldType::Any && (value.is_array() || value.is_object()) {
        return None;
    }
    coercion::coerce(value, field_type).map(Typed::into_owned)
}

fn invalid_literal(location: ConditionLocation, field_type: FieldType, value: &Value) -> ValidationError {
    ValidationError::InvalidLiteral {
        location,
        field_type,
        literal: value.to_string(),
    }
}
