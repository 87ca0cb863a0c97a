//! 配置管理模块
//!
//! 支持多格式配置文件分层加载，环境变量覆盖，以及按配置节进行类型安全的访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::observability::ObservabilityConfig;

/// 环境变量前缀（KEEPER_ENGINE__LIMITS__MAX_WILDCARDS -> engine.limits.max_wildcards）
pub const ENV_PREFIX: &str = "KEEPER";

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub observability: ObservabilityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "keeper".to_string(),
            environment: "development".to_string(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    pub fn load(service_name: &str) -> Result<Self> {
        ConfigLoader::new(service_name).load_app()
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// 分层配置加载器
///
/// 加载顺序（后加载的会覆盖先加载的同名配置项）：
/// 1. {config_dir}/default.toml（默认配置）
/// 2. {config_dir}/{environment}.toml（环境特定配置）
/// 3. {config_dir}/{service_name}.toml（服务特定配置）
/// 4. 环境变量（KEEPER_ 前缀，层级分隔符为 `__`）
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    service_name: String,
    environment: String,
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// 创建加载器，环境取自 KEEPER_ENV，目录取自 CONFIG_DIR
    pub fn new(service_name: &str) -> Self {
        let environment =
            std::env::var("KEEPER_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self {
            service_name: service_name.to_string(),
            environment,
            config_dir: PathBuf::from(config_dir),
        }
    }

    /// 指定配置目录
    pub fn with_config_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config_dir = dir.as_ref().to_path_buf();
        self
    }

    /// 指定运行环境
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    fn build(&self) -> std::result::Result<Config, ConfigError> {
        let dir = &self.config_dir;

        Config::builder()
            .set_default("service_name", self.service_name.clone())?
            .set_default("environment", self.environment.clone())?
            .add_source(File::from(dir.join("default.toml")).required(false))
            .add_source(File::from(dir.join(format!("{}.toml", self.environment))).required(false))
            .add_source(
                File::from(dir.join(format!("{}.toml", self.service_name))).required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
    }

    /// 加载应用级配置
    pub fn load_app(&self) -> Result<AppConfig> {
        let config: AppConfig = self.build()?.try_deserialize()?;
        Ok(config)
    }

    /// 加载指定配置节，配置节不存在时返回默认值
    pub fn load_section<T>(&self, section: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        match self.build()?.get::<T>(section) {
            Ok(value) => Ok(value),
            Err(ConfigError::NotFound(_)) => Ok(T::default()),
            Err(e) => Err(e.into()),
        }
    }
}
