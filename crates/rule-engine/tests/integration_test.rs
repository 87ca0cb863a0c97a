//! 规则引擎集成测试
//!
//! 测试完整的规则加载、编译、发布、匹配工作流。

use rule_engine::{
    Action, ConditionDef, ConditionEvaluator, ConditionOutcome, EngineConfig, Expression,
    IndeterminateReason, OnMissing, OrGroupDef, RandomSource, Rule, RuleCompiler, RuleMatcher,
    RuleOutcome, RuleState, Sampler, StrictPolicy, TenantRuleStore, load_rule_set,
};
use serde_json::{Value, json};

/// 固定返回同一个值的随机源
struct FixedSource(f64);

impl RandomSource for FixedSource {
    fn next_unit(&mut self) -> f64 {
        self.0
    }
}

/// 创建测试记录：模拟一条工厂遥测事件
fn create_telemetry_record() -> Value {
    json!({
        "event": {
            "type": "telemetry",
            "source": "gateway-7"
        },
        "temperature": 104.5,
        "threshold": 100,
        "tags": ["dev", "production"],
        "facilities": [
            {
                "name": "north",
                "sensors": [
                    {"id": "n-1", "status": "OK"},
                    {"id": "n-2", "status": "OK"}
                ]
            },
            {
                "name": "south",
                "sensors": [
                    {"id": "s-1", "status": "OK"},
                    {"id": "s-2", "status": "ERR_OVERHEAT"}
                ]
            }
        ],
        "operator": null
    })
}

fn single_condition_rule(id: &str, condition: ConditionDef) -> Rule {
    Rule::new(id, Expression::all_of(vec![condition])).with_id(id)
}

fn temperature_rule(id: &str, field_type: &str) -> Rule {
    single_condition_rule(
        id,
        ConditionDef::new("temperature", "gt")
            .with_type(field_type)
            .with_value(100),
    )
}

// ==================== 编译与单条件语义 ====================

#[test]
fn test_nested_wildcard_prefix_cost() {
    let compiler = RuleCompiler::default();
    let rule = compiler
        .compile_from_json(
            r#"{
                "rule_id": "sensor-fault",
                "name": "传感器故障",
                "state": "active",
                "action": "fail",
                "expression": {
                    "or_groups": [{
                        "conditions": [{
                            "field": ["facilities", "*", "sensors", "*", "status"],
                            "operator": "prefix",
                            "field_type": "string",
                            "value": "ERR"
                        }]
                    }]
                }
            }"#,
        )
        .unwrap();

    let condition = &rule.or_groups()[0].conditions()[0];
    assert_eq!(condition.cost(), 31104);
    assert_eq!(rule.priority(), 1000 + 31104 + 10);
    // 软限制警告只针对恰好一个通配符的路径
    assert!(rule.warnings().is_empty());

    let handle = load_rule_set("tenant-a", vec![rule]);
    let evaluation = RuleMatcher::new().evaluate_handle(&create_telemetry_record(), &handle);
    let result = evaluation.result("sensor-fault").unwrap();
    assert!(result.matched());
    assert_eq!(result.action(), Action::Fail);
}

#[test]
fn test_existential_wildcard_match() {
    let compiler = RuleCompiler::default();
    let rule = compiler
        .compile(&single_condition_rule(
            "production-tag",
            ConditionDef::new(
                rule_engine::RawFieldPath::Segments(vec![json!("tags"), json!("*")]),
                "eq",
            )
            .with_type("string")
            .with_value("production"),
        ))
        .unwrap();

    let record = json!({"tags": ["dev", "production"]});
    let condition = rule.or_groups()[0].conditions()[0].condition();
    assert_eq!(
        ConditionEvaluator::evaluate(condition, &record),
        ConditionOutcome::True
    );

    let staging = json!({"tags": ["dev", "staging"]});
    assert_eq!(
        ConditionEvaluator::evaluate(condition, &staging),
        ConditionOutcome::False
    );

    let handle = load_rule_set("tenant-a", vec![rule]);
    let evaluation = RuleMatcher::new().evaluate_handle(&record, &handle);
    assert_eq!(evaluation.matches().count(), 1);
}

#[test]
fn test_missing_field_counted_as_missing() {
    let compiler = RuleCompiler::default();
    let handle = load_rule_set(
        "tenant-a",
        vec![compiler.compile(&temperature_rule("hot", "int")).unwrap()],
    );

    let record = json!({"humidity": 40});
    let evaluation = RuleMatcher::new().evaluate_handle(&record, &handle);

    assert_eq!(evaluation.results[0].outcome, RuleOutcome::NotMatched);
    assert_eq!(evaluation.diagnostics.missing_fields, 1);
    assert_eq!(evaluation.diagnostics.coercion_failures, 0);
}

#[test]
fn test_coercion_failure_counted_separately() {
    let compiler = RuleCompiler::default();
    let compiled = compiler.compile(&temperature_rule("hot", "numeric")).unwrap();

    let record = json!({"temperature": "abc"});
    assert_eq!(
        ConditionEvaluator::evaluate(compiled.or_groups()[0].conditions()[0].condition(), &record),
        ConditionOutcome::Indeterminate(IndeterminateReason::CoercionFailure)
    );

    let handle = load_rule_set("tenant-a", vec![compiled]);
    let evaluation = RuleMatcher::new().evaluate_handle(&record, &handle);
    assert_eq!(evaluation.results[0].outcome, RuleOutcome::NotMatched);
    assert_eq!(evaluation.diagnostics.coercion_failures, 1);
    assert_eq!(evaluation.diagnostics.missing_fields, 0);
}

#[test]
fn test_too_many_wildcards_rejected() {
    let store = TenantRuleStore::default();
    let rule = single_condition_rule(
        "deep",
        ConditionDef::new("regions[*].facilities[*].sensors[*].status", "exists"),
    );

    let err = store.compiler().compile(&rule).unwrap_err();
    assert!(err.has_code("TOO_MANY_WILDCARDS"));

    let report = store.refresh("tenant-a", &[rule, temperature_rule("hot", "float")]);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].rule_id, "deep");
    assert_eq!(report.admitted, 1);

    let snapshot = store.snapshot("tenant-a").unwrap();
    assert!(snapshot.get("deep").is_none());
    assert!(snapshot.get("hot").is_some());
}

// ==================== 完整工作流 ====================

#[test]
fn test_full_workflow_through_store() {
    let store = EngineConfig::default().store();
    let rules = vec![
        temperature_rule("overheat", "float").with_action(Action::Drop),
        single_condition_rule(
            "gateway-event",
            ConditionDef::new("event.source", "prefix")
                .with_type("string")
                .with_value("gateway"),
        ),
        single_condition_rule(
            "above-threshold",
            ConditionDef::new("temperature", "gt")
                .with_type("float")
                .with_field_ref("threshold"),
        ),
        single_condition_rule("has-operator", ConditionDef::new("operator", "is_null")),
        temperature_rule("draft", "float").with_state(RuleState::Draft),
    ];

    let report = store.refresh("factory", &rules);
    assert!(report.is_clean());
    assert_eq!(report.admitted, 4);
    assert_eq!(report.inactive, 1);

    let handle = store.handle("factory").unwrap();
    let evaluation = RuleMatcher::new().evaluate_handle(&create_telemetry_record(), &handle);

    assert_eq!(evaluation.ruleset_version, 1);
    assert_eq!(evaluation.diagnostics.rules_total, 4);
    assert_eq!(evaluation.matches().count(), 4);
    assert_eq!(
        evaluation.result("overheat").map(|r| r.action()),
        Some(Action::Drop)
    );
    assert!(evaluation.result("draft").is_none());

    // 结果按 (优先级, ID) 排列
    let priorities: Vec<u64> = evaluation
        .results
        .iter()
        .map(|r| r.rule.priority())
        .collect();
    let mut sorted = priorities.clone();
    sorted.sort_unstable();
    assert_eq!(priorities, sorted);
}

#[test]
fn test_or_groups_and_missing_policy() {
    let compiler = RuleCompiler::default();
    let rule = Rule::new(
        "either",
        Expression::any_of(vec![
            OrGroupDef::all_of(vec![
                ConditionDef::new("pressure", "gte")
                    .with_type("float")
                    .with_value(3.5)
                    .on_missing(OnMissing::Match),
            ]),
            OrGroupDef::all_of(vec![
                ConditionDef::new("event.type", "eq")
                    .with_type("string")
                    .with_value("alarm"),
            ]),
        ]),
    )
    .with_id("either");
    let handle = load_rule_set("tenant-a", vec![compiler.compile(&rule).unwrap()]);
    let record = create_telemetry_record();

    // 声明的 on_missing_field = match 使第一个组成立
    let matcher = RuleMatcher::new().with_trace();
    let evaluation = matcher.evaluate_handle(&record, &handle);
    let result = evaluation.result("either").unwrap();
    assert!(result.matched());
    assert_eq!(result.trace.as_ref().unwrap().matched_group, Some(0));

    // 严格策略忽略声明，两个组都不成立
    let snapshot = handle.load();
    let mut sampler = Sampler::seeded(7);
    let strict = matcher.evaluate_with_policy(&record, &snapshot, &mut sampler, &StrictPolicy);
    assert!(!strict.result("either").unwrap().matched());
    assert_eq!(strict.diagnostics.missing_fields, 1);
}

#[test]
fn test_sampling_is_reproducible() {
    let compiler = RuleCompiler::default();
    let rules: Vec<_> = ["s1", "s2", "s3", "s4"]
        .iter()
        .map(|id| {
            compiler
                .compile(&temperature_rule(id, "float").with_sample_rate(0.5))
                .unwrap()
        })
        .collect();
    let handle = load_rule_set("tenant-a", rules);
    let snapshot = handle.load();
    let record = create_telemetry_record();
    let matcher = RuleMatcher::new();

    let outcomes = |seed: u64| -> Vec<RuleOutcome> {
        let mut sampler = Sampler::seeded(seed);
        (0..8)
            .flat_map(|_| {
                matcher
                    .evaluate_with(&record, &snapshot, &mut sampler)
                    .results
                    .into_iter()
                    .map(|r| r.outcome)
            })
            .collect()
    };

    assert_eq!(outcomes(42), outcomes(42));

    // 随机值低于采样率时评估，否则跳过
    let mut low = Sampler::new(FixedSource(0.1));
    let evaluated = matcher.evaluate_with(&record, &snapshot, &mut low);
    assert_eq!(evaluated.diagnostics.rules_evaluated, 4);

    let mut high = Sampler::new(FixedSource(0.9));
    let skipped = matcher.evaluate_with(&record, &snapshot, &mut high);
    assert_eq!(skipped.diagnostics.rules_skipped_unsampled, 4);
    assert_eq!(skipped.diagnostics.conditions_evaluated, 0);
}

#[test]
fn test_scoped_snapshot() {
    let compiler = RuleCompiler::default();
    let handle = load_rule_set(
        "tenant-a",
        vec![
            compiler
                .compile(&temperature_rule("iot", "float").with_scope_tags(["iot"]))
                .unwrap(),
            compiler
                .compile(&temperature_rule("payments", "float").with_scope_tags(["payments"]))
                .unwrap(),
            compiler.compile(&temperature_rule("global", "float")).unwrap(),
        ],
    );

    let scoped = handle.load().scoped(&["iot"]);
    let evaluation = RuleMatcher::new().evaluate(&create_telemetry_record(), &scoped);
    let matched: Vec<&str> = evaluation.matches().map(|r| r.rule_id()).collect();
    assert_eq!(matched, vec!["global", "iot"]);
}

#[test]
fn test_evaluation_serialization() {
    let compiler = RuleCompiler::default();
    let handle = load_rule_set(
        "tenant-a",
        vec![compiler.compile(&temperature_rule("hot", "float")).unwrap()],
    );

    let evaluation = RuleMatcher::new().evaluate_handle(&json!({"temperature": 120}), &handle);
    let value = serde_json::to_value(&evaluation).unwrap();

    assert_eq!(value["ruleset_version"], 1);
    assert_eq!(value["truncated"], false);
    assert_eq!(value["results"][0]["rule_id"], "hot");
    assert_eq!(value["results"][0]["outcome"], "matched");
    assert_eq!(value["results"][0]["action"], "observe");
    assert_eq!(value["diagnostics"]["rules_matched"], 1);
}
