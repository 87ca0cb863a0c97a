//! 规则引擎指标模块
//!
//! 基于 metrics crate 的门面记录指标。记录操作不做任何同步 I/O，
//! 未安装 recorder 时为空操作，由宿主服务决定导出方式。

/// 注册规则引擎指标描述
///
/// 这些描述会出现在导出端点的 HELP 注释中
pub fn describe_engine_metrics() {
    metrics::describe_counter!("rule_evaluations_total", "Total number of rule evaluations");
    metrics::describe_counter!("rule_matches_total", "Total number of matched rules");
    metrics::describe_counter!(
        "rule_skipped_unsampled_total",
        "Rules skipped by the sampling gate"
    );
    metrics::describe_counter!(
        "condition_missing_total",
        "Conditions whose field was absent from the record"
    );
    metrics::describe_counter!(
        "condition_null_total",
        "Conditions whose field resolved to an explicit null"
    );
    metrics::describe_counter!(
        "condition_coercion_failures_total",
        "Conditions whose value could not be coerced to the declared type"
    );
    metrics::describe_histogram!(
        "rule_evaluation_duration_seconds",
        "Duration of one record evaluated against a rule set"
    );
    metrics::describe_counter!("rule_compile_total", "Total number of rule compilations");
    metrics::describe_gauge!("ruleset_version", "Currently published rule set version");
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录一次记录级评估
#[inline]
pub fn record_rule_evaluation(
    tenant: &str,
    rules_evaluated: u64,
    rules_matched: u64,
    duration_secs: f64,
) {
    metrics::counter!("rule_evaluations_total", "tenant" => tenant.to_string())
        .increment(rules_evaluated);
    metrics::counter!("rule_matches_total", "tenant" => tenant.to_string())
        .increment(rules_matched);
    metrics::histogram!("rule_evaluation_duration_seconds", "tenant" => tenant.to_string())
        .record(duration_secs);
}

/// 记录因采样被跳过的规则数量
#[inline]
pub fn record_skipped_unsampled(tenant: &str, count: u64) {
    if count > 0 {
        metrics::counter!("rule_skipped_unsampled_total", "tenant" => tenant.to_string())
            .increment(count);
    }
}

/// 记录无法确定结果的条件数量（字段缺失 / 显式 null / 类型转换失败）
#[inline]
pub fn record_indeterminate_conditions(tenant: &str, missing: u64, null: u64, coercion: u64) {
    if missing > 0 {
        metrics::counter!("condition_missing_total", "tenant" => tenant.to_string())
            .increment(missing);
    }
    if null > 0 {
        metrics::counter!("condition_null_total", "tenant" => tenant.to_string())
            .increment(null);
    }
    if coercion > 0 {
        metrics::counter!("condition_coercion_failures_total", "tenant" => tenant.to_string())
            .increment(coercion);
    }
}

/// 记录规则编译结果
#[inline]
pub fn record_rule_compile(status: &str) {
    metrics::counter!("rule_compile_total", "status" => status.to_string()).increment(1);
}

/// 更新租户当前发布的规则集版本
#[inline]
pub fn set_ruleset_version(tenant: &str, version: u64) {
    metrics::gauge!("ruleset_version", "tenant" => tenant.to_string()).set(version as f64);
}
