//! 环境变量配置模块
//!
//! 此模块从环境变量读取连接串等配置，并覆盖到已有配置上。
//! 连接串里常带密码，放在环境变量里可以避免写进配置文件。

use std::env;

use crate::config::DatabaseHandlerConfig;
use crate::error::{QuantumDbLogError, Result};

/// 连接 URI
pub const ENV_URI: &str = "QUANTUM_DBLOG_URI";
/// 表名
pub const ENV_TABLE: &str = "QUANTUM_DBLOG_TABLE";
/// 最低日志级别
pub const ENV_LEVEL: &str = "QUANTUM_DBLOG_LEVEL";

/// 环境变量配置管理器
pub struct EnvConfig;

impl EnvConfig {
    /// 从环境变量读取连接 URI
    pub fn get_uri() -> Option<String> {
        non_empty(env::var(ENV_URI).ok())
    }

    /// 从环境变量读取表名
    pub fn get_table() -> Option<String> {
        non_empty(env::var(ENV_TABLE).ok())
    }

    /// 从环境变量读取最低日志级别
    pub fn get_level() -> Option<String> {
        non_empty(env::var(ENV_LEVEL).ok())
    }

    /// 完全由环境变量构建配置，URI 必须存在
    pub fn load() -> Result<DatabaseHandlerConfig> {
        let uri = Self::get_uri().ok_or_else(|| {
            QuantumDbLogError::ConfigError(format!("环境变量 {} 未设置", ENV_URI))
        })?;
        Ok(apply_env_overrides(DatabaseHandlerConfig::new(
            uri,
            DatabaseHandlerConfig::default().table_name,
        )))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// 用环境变量覆盖配置
pub fn apply_env_overrides(config: DatabaseHandlerConfig) -> DatabaseHandlerConfig {
    apply_overrides_from(config, |key| env::var(key).ok())
}

/// 用任意键值来源覆盖配置，空值忽略
pub fn apply_overrides_from<F>(mut config: DatabaseHandlerConfig, lookup: F) -> DatabaseHandlerConfig
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(uri) = non_empty(lookup(ENV_URI)) {
        config.connection_string = uri;
    }
    if let Some(table) = non_empty(lookup(ENV_TABLE)) {
        config.table_name = table;
    }
    if let Some(level) = non_empty(lookup(ENV_LEVEL)) {
        config.level = Some(level);
    }
    config
}
