//! 规则集快照
//!
//! 某个租户在某个版本下所有生效规则的不可变集合，按 (优先级, 规则 ID) 升序排列。
//! 快照构建后不再修改，刷新规则意味着构建新快照。

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::compiler::CompiledRule;

/// 不可变的规则集
#[derive(Debug, Clone)]
pub struct RuleSet {
    tenant: String,
    version: u64,
    rules: Arc<[Arc<CompiledRule>]>,
}

impl RuleSet {
    /// 构建规则集，非 active 规则会被跳过
    pub fn new<I>(tenant: impl Into<String>, version: u64, rules: I) -> Self
    where
        I: IntoIterator<Item = CompiledRule>,
    {
        Self::from_shared(tenant, version, rules.into_iter().map(Arc::new))
    }

    pub fn from_shared<I>(tenant: impl Into<String>, version: u64, rules: I) -> Self
    where
        I: IntoIterator<Item = Arc<CompiledRule>>,
    {
        let tenant = tenant.into();
        let mut active: Vec<Arc<CompiledRule>> = rules
            .into_iter()
            .filter(|rule| {
                if !rule.is_active() {
                    debug!(
                        tenant_id = %tenant,
                        rule_id = %rule.id(),
                        state = %rule.state(),
                        "跳过非 active 规则"
                    );
                }
                rule.is_active()
            })
            .collect();

        active.sort_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then_with(|| a.id().cmp(b.id()))
        });

        Self {
            tenant,
            version,
            rules: active.into(),
        }
    }

    pub fn empty(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            version: 0,
            rules: Arc::from(Vec::new()),
        }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// 按评估顺序排列的规则
    pub fn rules(&self) -> &[Arc<CompiledRule>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, rule_id: &str) -> Option<&Arc<CompiledRule>> {
        self.rules.iter().find(|r| r.id() == rule_id)
    }

    /// 按作用域标签派生子集，没有标签的规则对所有作用域生效
    pub fn scoped<S: AsRef<str>>(&self, tags: &[S]) -> RuleSet {
        let tags: BTreeSet<&str> = tags.iter().map(AsRef::as_ref).collect();
        let rules: Vec<Arc<CompiledRule>> = self
            .rules
            .iter()
            .filter(|rule| {
                rule.scope_tags().is_empty()
                    || rule.scope_tags().iter().any(|t| tags.contains(t.as_str()))
            })
            .cloned()
            .collect();

        Self {
            tenant: self.tenant.clone(),
            version: self.version,
            rules: rules.into(),
        }
    }
}
