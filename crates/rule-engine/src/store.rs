//! 规则集存储
//!
//! `RuleSetHandle` 持有租户当前规则集快照的原子指针：发布者由互斥锁串行化，
//! 读取方通过 `ArcSwap` 无锁获取快照，进行中的评估继续使用它开始时的快照。
//! `TenantRuleStore` 使用 DashMap 维护租户到句柄的映射。

use arc_swap::ArcSwap;
use dashmap::DashMap;
use keeper_shared::observability::metrics::set_ruleset_version;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::compiler::{CompiledRule, RuleCompiler};
use crate::error::{CompileError, Result, RuleError, ValidationWarning};
use crate::models::Rule;
use crate::ruleset::RuleSet;

struct HandleInner {
    tenant: String,
    current: ArcSwap<RuleSet>,
    /// 发布锁，同时保存最近一次发布的版本号
    publish: Mutex<u64>,
}

/// 规则集句柄
#[derive(Clone)]
pub struct RuleSetHandle {
    inner: Arc<HandleInner>,
}

impl RuleSetHandle {
    /// 创建空规则集句柄（版本 0）
    pub fn new(tenant: impl Into<String>) -> Self {
        let tenant = tenant.into();
        Self {
            inner: Arc::new(HandleInner {
                current: ArcSwap::from_pointee(RuleSet::empty(tenant.clone())),
                tenant,
                publish: Mutex::new(0),
            }),
        }
    }

    pub fn tenant(&self) -> &str {
        &self.inner.tenant
    }

    /// 获取当前快照
    #[inline]
    pub fn load(&self) -> Arc<RuleSet> {
        self.inner.current.load_full()
    }

    pub fn version(&self) -> u64 {
        self.inner.current.load().version()
    }

    /// 用一组编译后的规则构建新快照并原子替换
    #[instrument(skip(self, rules), fields(tenant_id = %self.inner.tenant))]
    pub fn publish<I>(&self, rules: I) -> Arc<RuleSet>
    where
        I: IntoIterator<Item = CompiledRule>,
    {
        let mut version = self.inner.publish.lock();
        *version += 1;

        let snapshot = Arc::new(RuleSet::new(self.inner.tenant.clone(), *version, rules));
        self.inner.current.store(Arc::clone(&snapshot));

        set_ruleset_version(&self.inner.tenant, *version);
        info!(version = *version, rules = snapshot.len(), "规则集已发布");
        snapshot
    }
}

impl std::fmt::Debug for RuleSetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSetHandle")
            .field("tenant", &self.inner.tenant)
            .field("version", &self.version())
            .finish()
    }
}

/// 用编译后的规则创建句柄并发布第一个快照
pub fn load_rule_set<I>(tenant: impl Into<String>, rules: I) -> RuleSetHandle
where
    I: IntoIterator<Item = CompiledRule>,
{
    let handle = RuleSetHandle::new(tenant);
    handle.publish(rules);
    handle
}

/// 一次刷新的结果
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub tenant: String,
    pub version: u64,
    /// 进入新快照的规则数（只计 active）
    pub admitted: usize,
    /// 编译通过但不是 active 的规则数
    pub inactive: usize,
    pub rejected: Vec<CompileError>,
    pub warnings: Vec<(String, ValidationWarning)>,
}

impl RefreshReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// 存储统计
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub tenants: usize,
    pub rules: usize,
}

/// 租户规则集存储
#[derive(Clone)]
pub struct TenantRuleStore {
    handles: Arc<DashMap<String, RuleSetHandle>>,
    compiler: Arc<RuleCompiler>,
}

impl TenantRuleStore {
    pub fn new(compiler: RuleCompiler) -> Self {
        Self {
            handles: Arc::new(DashMap::new()),
            compiler: Arc::new(compiler),
        }
    }

    pub fn compiler(&self) -> &RuleCompiler {
        &self.compiler
    }

    /// 获取租户句柄，不存在时创建空句柄
    pub fn handle_or_create(&self, tenant: &str) -> RuleSetHandle {
        self.handles
            .entry(tenant.to_string())
            .or_insert_with(|| RuleSetHandle::new(tenant))
            .clone()
    }

    pub fn handle(&self, tenant: &str) -> Result<RuleSetHandle> {
        self.handles
            .get(tenant)
            .map(|h| h.clone())
            .ok_or_else(|| RuleError::UnknownTenant(tenant.to_string()))
    }

    /// 获取租户当前快照
    pub fn snapshot(&self, tenant: &str) -> Result<Arc<RuleSet>> {
        self.handle(tenant).map(|h| h.load())
    }

    /// 编译租户的完整规则列表并发布新快照
    ///
    /// 编译失败的规则单独拒绝，不影响其他规则进入快照。
    #[instrument(skip(self, tenant, rules), fields(tenant_id = %tenant, rule_count = rules.len()))]
    pub fn refresh(&self, tenant: &str, rules: &[Rule]) -> RefreshReport {
        let (compiled, rejected) = self.compiler.compile_batch(rules);

        let inactive = compiled.iter().filter(|r| !r.is_active()).count();
        let warnings: Vec<_> = compiled
            .iter()
            .flat_map(|r| {
                r.warnings()
                    .iter()
                    .map(move |w| (r.id().to_string(), w.clone()))
            })
            .collect();

        // 发布前释放 DashMap 分片锁
        let handle = self.handle_or_create(tenant);
        let snapshot = handle.publish(compiled);

        if !rejected.is_empty() {
            warn!(rejected = rejected.len(), "部分规则被拒绝");
        }

        RefreshReport {
            tenant: tenant.to_string(),
            version: snapshot.version(),
            admitted: snapshot.len(),
            inactive,
            rejected,
            warnings,
        }
    }

    /// 从 JSON 数组刷新
    pub fn refresh_from_json(&self, tenant: &str, json: &str) -> Result<RefreshReport> {
        let rules: Vec<Rule> = serde_json::from_str(json)?;
        Ok(self.refresh(tenant, &rules))
    }

    /// 移除租户
    #[instrument(skip(self))]
    pub fn remove(&self, tenant: &str) -> bool {
        let removed = self.handles.remove(tenant).is_some();
        if removed {
            info!("租户规则集已移除: {}", tenant);
        }
        removed
    }

    pub fn tenants(&self) -> Vec<String> {
        self.handles.iter().map(|h| h.key().clone()).collect()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            tenants: self.handles.len(),
            rules: self.handles.iter().map(|h| h.load().len()).sum(),
        }
    }
}

impl Default for TenantRuleStore {
    fn default() -> Self {
        Self::new(RuleCompiler::default())
    }
}
