//! 共享库
//!
//! 包含规则引擎与周边服务共用的配置加载、错误处理和可观测性基础设施代码。

pub mod config;
pub mod error;
pub mod observability;

pub use error::{KeeperError, Result};
