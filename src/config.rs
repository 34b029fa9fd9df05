//! 定义 QuantumDbLog 数据库日志处理器的配置结构体。

use serde::Deserialize;
use tracing_subscriber::filter::LevelFilter;

use crate::error::{QuantumDbLogError, Result};

// --- 辅助函数，用于提供配置项的默认值 ---
fn default_db_table_name() -> String {
    "logs".to_string()
}
fn default_db_pool_size() -> u32 {
    4
}
fn default_db_connection_timeout_ms() -> u64 {
    5000
}
fn default_sqlite_busy_timeout_ms() -> u64 {
    5000
}

/// 日志级别枚举
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// 支持的数据库类型。
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    Sqlite,
    Mysql,
    Postgresql,
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DatabaseType::Sqlite => "SQLite",
            DatabaseType::Mysql => "MySQL",
            DatabaseType::Postgresql => "PostgreSQL",
        };
        f.write_str(name)
    }
}

/// `timestamp` 列的取值方式。
///
/// `DefinitionTime` 在处理器定义表结构时取一次本地时间，之后每一行都写入这个值；
/// `InsertTime` 在每次插入时取当前本地时间。
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimestampDefault {
    #[default]
    DefinitionTime,
    InsertTime,
}

/// 数据库日志处理器配置
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DatabaseHandlerConfig {
    /// 数据库连接 URI，例如 `sqlite:///logs.db` 或 `postgres://user@host/db`
    pub connection_string: String,
    #[serde(default = "default_db_table_name")]
    pub table_name: String,
    /// 交给日志框架的最低级别，缺省时不过滤
    pub level: Option<String>,
    #[serde(default = "default_db_pool_size")]
    pub connection_pool_size: u32,
    #[serde(default = "default_db_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    #[serde(default = "default_sqlite_busy_timeout_ms")]
    pub sqlite_busy_timeout_ms: u64,
    #[serde(default)]
    pub timestamp_default: TimestampDefault,
}

impl Default for DatabaseHandlerConfig {
    fn default() -> Self {
        Self {
            connection_string: "sqlite://".to_string(),
            table_name: default_db_table_name(),
            level: None,
            connection_pool_size: default_db_pool_size(),
            connection_timeout_ms: default_db_connection_timeout_ms(),
            sqlite_busy_timeout_ms: default_sqlite_busy_timeout_ms(),
            timestamp_default: TimestampDefault::default(),
        }
    }
}

impl DatabaseHandlerConfig {
    /// 用连接 URI 和表名创建配置，其余字段取默认值。
    pub fn new<U: Into<String>, T: Into<String>>(connection_string: U, table_name: T) -> Self {
        Self {
            connection_string: connection_string.into(),
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    /// 解析 `level` 字段；未设置时返回 `LevelFilter::TRACE`，即全部放行。
    pub fn level_filter(&self) -> Result<LevelFilter> {
        match self.level {
            Some(ref level) => parse_level(level),
            None => Ok(LevelFilter::TRACE),
        }
    }
}

/// 将字符串形式的日志级别转换为 `LevelFilter`。
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    level
        .parse::<LogLevel>()
        .map(LevelFilter::from)
        .map_err(|_| QuantumDbLogError::InvalidLogLevel(level.to_string()))
}

/// 用于从文件加载 `DatabaseHandlerConfig` 的辅助函数。
pub fn load_config_from_file(path: &std::path::Path) -> Result<DatabaseHandlerConfig> {
    use std::fs;

    if !path.exists() {
        return Err(QuantumDbLogError::ConfigFileMissing(
            path.to_string_lossy().into_owned(),
        ));
    }

    let config_str = fs::read_to_string(path)?;
    load_config_from_str(&config_str)
}

/// 用于从 TOML 字符串加载 `DatabaseHandlerConfig` 的辅助函数。
pub fn load_config_from_str(config_str: &str) -> Result<DatabaseHandlerConfig> {
    let config: DatabaseHandlerConfig = toml::from_str(config_str)?;

    Ok(config)
}

/// 验证配置的有效性。
pub fn validate_config(config: &DatabaseHandlerConfig) -> Result<()> {
    if config.connection_string.trim().is_empty() {
        return Err(QuantumDbLogError::config("connection_string 不能为空"));
    }

    crate::sinks::database::schema::validate_table_name(&config.table_name)?;

    if config.connection_pool_size == 0 {
        return Err(QuantumDbLogError::config(
            "connection_pool_size 必须大于 0",
        ));
    }

    if config.connection_timeout_ms == 0 {
        return Err(QuantumDbLogError::config(
            "connection_timeout_ms 必须大于 0",
        ));
    }

    config.level_filter()?;

    Ok(())
}
