//! QuantumDbLog - 关系数据库日志处理器
//!
//! 把 tracing 日志写进一张三列的数据库表（`id`、`timestamp`、`log_message`）。
//! 首次使用时自动建表；表已存在时校验它没有多余的列。
//! 每条日志同步写入一行，不做批量、重试或缓冲。
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use quantum_dblog::{init_with_config, DatabaseHandlerConfig};
//! use tracing::info;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseHandlerConfig::new("sqlite:///app.db", "app_logs");
//!     let handler = init_with_config(config)?;
//!
//!     info!("Application started");
//!
//!     println!("rows written: {}", handler.stats().rows_written);
//!     Ok(())
//! }
//! ```
//!
//! # 不经过 tracing 直接使用
//!
//! ```rust,no_run
//! use quantum_dblog::{DatabaseHandler, LogRecord};
//!
//! # fn main() -> quantum_dblog::Result<()> {
//! let handler = DatabaseHandler::connect("sqlite:///app.db", "app_logs")?;
//! handler.emit(&LogRecord::new("hello"))?;
//! # Ok(())
//! # }
//! ```

#[cfg(not(any(feature = "sqlite", feature = "postgres", feature = "mysql")))]
compile_error!("quantum_dblog needs at least one of the `sqlite`, `postgres` or `mysql` features");

pub mod config;
pub mod core;
pub mod diagnostics;
pub mod env_config;
pub mod error;
pub mod sinks;

use std::sync::Arc;

use tracing_subscriber::prelude::*;

// 重新导出主要类型
pub use config::{
    load_config_from_file, load_config_from_str, validate_config, DatabaseHandlerConfig,
    DatabaseType, LogLevel, TimestampDefault,
};
pub use crate::core::{DatabaseLayer, LogRecord};
pub use diagnostics::HandlerStatsSnapshot;
pub use error::{QuantumDbLogError, Result};
pub use sinks::database::{DatabaseHandler, SchemaState, TableSpec};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 使用指定配置创建处理器，并把它作为全局 tracing 订阅器安装
///
/// 返回的处理器可以用来查看写入计数。全局订阅器已存在时返回
/// `InitializationError`，此时处理器（以及它建的表）仍然保留在数据库中。
pub fn init_with_config(config: DatabaseHandlerConfig) -> Result<Arc<DatabaseHandler>> {
    let level = config.level_filter()?;
    let handler = Arc::new(DatabaseHandler::new(config)?);

    tracing_subscriber::registry()
        .with(DatabaseLayer::new(Arc::clone(&handler)).with_filter(level))
        .try_init()
        .map_err(|e| QuantumDbLogError::InitializationError(e.to_string()))?;

    Ok(handler)
}

/// 从 TOML 配置文件初始化，环境变量优先于文件中的值
pub fn init_from_file(path: &std::path::Path) -> Result<Arc<DatabaseHandler>> {
    let config = env_config::apply_env_overrides(load_config_from_file(path)?);
    init_with_config(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_invalid_level_fails_before_connecting() {
        let config = DatabaseHandlerConfig {
            level: Some("chatty".to_string()),
            ..DatabaseHandlerConfig::new("sqlite://", "app_logs")
        };
        assert!(matches!(
            init_with_config(config),
            Err(QuantumDbLogError::InvalidLogLevel(_))
        ));
    }
}
