//! 规则定义模型
//!
//! 持久化层交给编译器的原始规则。操作符和字段类型保留为字符串，
//! 由校验器统一解析并报告错误，解析失败不会导致整条规则反序列化失败。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::operators::{Action, RuleState};
use crate::path::RawFieldPath;

/// 规则定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    #[serde(alias = "rule_id", default = "new_rule_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub state: RuleState,
    #[serde(default = "default_action")]
    pub action: Action,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,
    #[serde(default)]
    pub scope_tags: BTreeSet<String>,
    pub expression: Expression,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn new_rule_id() -> String {
    Uuid::now_v7().to_string()
}

fn default_action() -> Action {
    Action::Observe
}

fn default_sample_rate() -> f64 {
    1.0
}

impl Rule {
    pub fn new(name: impl Into<String>, expression: Expression) -> Self {
        Self {
            id: new_rule_id(),
            name: name.into(),
            state: RuleState::Active,
            action: default_action(),
            sample_rate: default_sample_rate(),
            scope_tags: BTreeSet::new(),
            expression,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_state(mut self, state: RuleState) -> Self {
        self.state = state;
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_scope_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope_tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// 条件表达式：or_groups 之间为 OR，组内条件为 AND
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Expression {
    #[serde(default)]
    pub or_groups: Vec<OrGroupDef>,
}

impl Expression {
    pub fn any_of(or_groups: Vec<OrGroupDef>) -> Self {
        Self { or_groups }
    }

    /// 只有一个 AND 组的表达式
    pub fn all_of(conditions: Vec<ConditionDef>) -> Self {
        Self {
            or_groups: vec![OrGroupDef::all_of(conditions)],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrGroupDef {
    #[serde(default)]
    pub conditions: Vec<ConditionDef>,
}

impl OrGroupDef {
    pub fn all_of(conditions: Vec<ConditionDef>) -> Self {
        Self { conditions }
    }
}

/// 字段缺失（或为显式 null）时条件的取值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnMissing {
    #[default]
    Skip,
    Match,
    Fail,
}

/// 条件定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionDef {
    pub field: RawFieldPath,
    pub operator: String,
    #[serde(default = "default_field_type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_ref: Option<RawFieldPath>,
    #[serde(default)]
    pub on_missing_field: OnMissing,
}

fn default_field_type() -> String {
    "any".to_string()
}

impl ConditionDef {
    pub fn new(field: impl Into<RawFieldPath>, operator: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            field_type: default_field_type(),
            value: None,
            field_ref: None,
            on_missing_field: OnMissing::default(),
        }
    }

    pub fn with_type(mut self, field_type: impl Into<String>) -> Self {
        self.field_type = field_type.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_field_ref(mut self, field_ref: impl Into<RawFieldPath>) -> Self {
        self.field_ref = Some(field_ref.into());
        self
    }

    pub fn on_missing(mut self, policy: OnMissing) -> Self {
        self.on_missing_field = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_deserialization() {
        let json = r#"
        {
            "rule_id": "rule-001",
            "name": "hot_sensor",
            "state": "active",
            "action": "drop",
            "sample_rate": 0.25,
            "scope_tags": ["iot", "factory"],
            "expression": {
                "or_groups": [
                    {
                        "conditions": [
                            {
                                "field": ["facilities", "*", "sensors", "*", "status"],
                                "operator": "prefix",
                                "field_type": "string",
                                "value": "off"
                            },
                            {
                                "field": "temperature",
                                "operator": "gt",
                                "field_type": "numeric",
                                "value": 100,
                                "on_missing_field": "match"
                            }
                        ]
                    }
                ]
            }
        }
        "#;

        let rule: Rule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.id, "rule-001");
        assert_eq!(rule.state, RuleState::Active);
        assert_eq!(rule.action, Action::Drop);
        assert_eq!(rule.scope_tags.len(), 2);

        let conditions = &rule.expression.or_groups[0].conditions;
        assert!(matches!(conditions[0].field, RawFieldPath::Segments(ref s) if s.len() == 5));
        assert_eq!(conditions[1].field, RawFieldPath::Dotted("temperature".to_string()));
        assert_eq!(conditions[1].on_missing_field, OnMissing::Match);
        assert_eq!(conditions[1].value, Some(json!(100)));
    }

    #[test]
    fn test_defaults() {
        let rule: Rule = serde_json::from_value(json!({
            "name": "minimal",
            "expression": {"or_groups": [{"conditions": [{"field": "a", "operator": "exists"}]}]}
        }))
        .unwrap();

        assert!(!rule.id.is_empty());
        assert_eq!(rule.state, RuleState::Draft);
        assert_eq!(rule.action, Action::Observe);
        assert_eq!(rule.sample_rate, 1.0);
        let condition = &rule.expression.or_groups[0].conditions[0];
        assert_eq!(condition.field_type, "any");
        assert_eq!(condition.on_missing_field, OnMissing::Skip);
    }

    #[test]
    fn test_builder() {
        let rule = Rule::new(
            "builder",
            Expression::all_of(vec![
                ConditionDef::new("order.total", "gt")
                    .with_type("float")
                    .with_field_ref("order.limit"),
            ]),
        )
        .with_id("r-1")
        .with_sample_rate(0.5)
        .with_scope_tags(["payments"]);

        assert_eq!(rule.id, "r-1");
        assert_eq!(rule.state, RuleState::Active);
        assert!(rule.scope_tags.contains("payments"));
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(
            json["expression"]["or_groups"][0]["conditions"][0]["field_ref"],
            json!("order.limit")
        );
    }
}
