//! 规则引擎性能基准测试
//!
//! 覆盖路径解析、单条件评估、规则编译和整条记录的规则集匹配。

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rule_engine::{
    CompiledRule, ConditionDef, ConditionEvaluator, Expression, FieldPath, OrGroupDef, Rule,
    RuleCompiler, RuleMatcher, RuleSet, Sampler,
};
use serde_json::{Value, json};
use std::hint::black_box;

/// 创建测试记录：4 个设施，每个 8 个传感器
fn create_record() -> Value {
    let facilities: Vec<Value> = (0..4)
        .map(|f| {
            let sensors: Vec<Value> = (0..8)
                .map(|s| {
                    json!({
                        "id": format!("f{}-s{}", f, s),
                        "status": if f == 3 && s == 7 { "ERR_OVERHEAT" } else { "OK" },
                        "reading": 20.0 + s as f64
                    })
                })
                .collect();
            json!({"name": format!("facility-{}", f), "sensors": sensors})
        })
        .collect();

    json!({
        "event": {"type": "telemetry", "source": "gateway-7"},
        "temperature": 104.5,
        "tags": ["dev", "staging", "production"],
        "facilities": facilities
    })
}

fn compile_one(condition: ConditionDef) -> CompiledRule {
    RuleCompiler::default()
        .compile(&Rule::new("bench", Expression::all_of(vec![condition])))
        .unwrap()
}

/// 路径解析基准
fn bench_path_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("path_resolution");
    let record = create_record();

    let cases = [
        ("scalar", "temperature"),
        ("nested", "event.source"),
        ("indexed", "facilities[2].sensors[5].status"),
        ("one_wildcard", "tags[*]"),
        ("two_wildcards", "facilities[*].sensors[*].status"),
    ];

    for (name, path) in cases {
        let path = FieldPath::parse(path).unwrap();
        group.bench_function(name, |b| {
            b.iter(|| black_box(&path).resolve(black_box(&record)).count())
        });
    }

    group.finish();
}

/// 单条件评估基准
fn bench_condition_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("condition_evaluation");
    let record = create_record();

    let cases = [
        ("exists", ConditionDef::new("event.type", "exists")),
        (
            "gt_float",
            ConditionDef::new("temperature", "gt")
                .with_type("float")
                .with_value(100),
        ),
        (
            "eq_string",
            ConditionDef::new("event.type", "eq")
                .with_type("string")
                .with_value("telemetry"),
        ),
        (
            "in_string",
            ConditionDef::new("event.source", "in")
                .with_type("string")
                .with_value(json!(["gateway-1", "gateway-4", "gateway-7"])),
        ),
        (
            "wildcard_eq",
            ConditionDef::new("tags[*]", "eq")
                .with_type("string")
                .with_value("production"),
        ),
        (
            "nested_wildcard_prefix",
            ConditionDef::new("facilities[*].sensors[*].status", "prefix")
                .with_type("string")
                .with_value("ERR"),
        ),
        (
            "missing",
            ConditionDef::new("humidity", "gt")
                .with_type("float")
                .with_value(50),
        ),
    ];

    for (name, condition) in cases {
        let rule = compile_one(condition);
        let condition = rule.or_groups()[0].conditions()[0].condition().clone();
        group.bench_function(name, |b| {
            b.iter(|| ConditionEvaluator::evaluate(black_box(&condition), black_box(&record)))
        });
    }

    group.finish();
}

/// 规则编译基准
fn bench_compile(c: &mut Criterion) {
    let compiler = RuleCompiler::default();
    let rule = Rule::new(
        "compile",
        Expression::any_of(vec![
            OrGroupDef::all_of(vec![
                ConditionDef::new("facilities[*].sensors[*].status", "prefix")
                    .with_type("string")
                    .with_value("ERR"),
                ConditionDef::new("event.type", "eq")
                    .with_type("string")
                    .with_value("telemetry"),
                ConditionDef::new("temperature", "gt")
                    .with_type("float")
                    .with_value(100),
            ]),
            OrGroupDef::all_of(vec![
                ConditionDef::new("tags[*]", "in")
                    .with_type("string")
                    .with_value(json!(["production", "canary"])),
            ]),
        ]),
    )
    .with_sample_rate(0.5);

    c.bench_function("compile_rule", |b| {
        b.iter(|| compiler.compile(black_box(&rule)))
    });
}

/// 规则集规模扩展基准
fn bench_ruleset_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("ruleset_scaling");
    let record = create_record();
    let compiler = RuleCompiler::default();
    let matcher = RuleMatcher::new();

    for size in [10usize, 100, 1000].iter() {
        let rules = (0..*size).map(|i| {
            let condition = match i % 4 {
                0 => ConditionDef::new("temperature", "gt")
                    .with_type("float")
                    .with_value(i as f64),
                1 => ConditionDef::new("event.source", "suffix")
                    .with_type("string")
                    .with_value(format!("-{}", i % 10).as_str()),
                2 => ConditionDef::new("tags[*]", "eq")
                    .with_type("string")
                    .with_value("production"),
                _ => ConditionDef::new("facilities[*].sensors[*].reading", "gte")
                    .with_type("float")
                    .with_value(i as f64 / 10.0),
            };
            compiler
                .compile(
                    &Rule::new(format!("rule-{}", i), Expression::all_of(vec![condition]))
                        .with_id(format!("rule-{:04}", i)),
                )
                .unwrap()
        });
        let ruleset = RuleSet::new("bench", 1, rules);
        let mut sampler = Sampler::seeded(42);

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| matcher.evaluate_with(black_box(&record), &ruleset, &mut sampler))
        });
    }

    group.finish();
}

/// 采样对吞吐的影响
fn bench_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampling");
    let record = create_record();
    let compiler = RuleCompiler::default();
    let matcher = RuleMatcher::new();

    for rate in [0.0, 0.1, 0.5, 1.0] {
        let rules = (0..100).map(|i| {
            compiler
                .compile(
                    &Rule::new(
                        "sampled",
                        Expression::all_of(vec![
                            ConditionDef::new("facilities[*].sensors[*].status", "prefix")
                                .with_type("string")
                                .with_value("ERR"),
                        ]),
                    )
                    .with_id(format!("sampled-{}", i))
                    .with_sample_rate(rate),
                )
                .unwrap()
        });
        let ruleset = RuleSet::new("bench", 1, rules);
        let mut sampler = Sampler::seeded(7);

        group.bench_with_input(BenchmarkId::from_parameter(rate), &rate, |b, _| {
            b.iter(|| matcher.evaluate_with(black_box(&record), &ruleset, &mut sampler))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_path_resolution,
    bench_condition_evaluation,
    bench_compile,
    bench_ruleset_scaling,
    bench_sampling,
);
criterion_main!(benches);
