//! 引擎配置
//!
//! 从分层配置的 `engine` 节加载成本表、资源限制和追踪开关，运维可以根据线上画像调整而无需重新构建。

use keeper_shared::config::ConfigLoader;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::compiler::RuleCompiler;
use crate::cost::{CostConfig, CostModel};
use crate::error::{Result, RuleError};
use crate::matcher::RuleMatcher;
use crate::store::TenantRuleStore;
use crate::validator::{LimitConfig, RuleValidator};

/// 规则引擎配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cost: CostConfig,
    pub limits: LimitConfig,
    /// 是否记录每条规则的评估追踪
    pub trace_enabled: bool,
}

impl EngineConfig {
    pub const SECTION: &'static str = "engine";

    /// 按服务名加载配置
    pub fn load(service_name: &str) -> Result<Self> {
        Self::load_with(&ConfigLoader::new(service_name))
    }

    pub fn load_with(loader: &ConfigLoader) -> Result<Self> {
        let config: Self = loader.load_section(Self::SECTION)?;
        config.validate()?;

        info!(
            service = loader.service_name(),
            environment = loader.environment(),
            max_wildcards = config.limits.max_wildcards,
            trace_enabled = config.trace_enabled,
            "引擎配置已加载"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.limits.validate().map_err(RuleError::InvalidConfig)?;
        if self.cost.wildcard_fanout == 0 {
            return Err(RuleError::InvalidConfig(
                "wildcard_fanout 必须大于 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cost_model(&self) -> CostModel {
        CostModel::new(self.cost.clone())
    }

    pub fn compiler(&self) -> RuleCompiler {
        RuleCompiler::new(RuleValidator::new(self.cost_model(), self.limits.clone()))
    }

    pub fn matcher(&self) -> RuleMatcher {
        RuleMatcher::new().with_trace_enabled(self.trace_enabled)
    }

    pub fn store(&self) -> TenantRuleStore {
        TenantRuleStore::new(self.compiler())
    }
}
