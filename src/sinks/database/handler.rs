//!
//! 数据库日志处理器
//!
//! 构造时建立连接池并运行一次表结构检查（不存在则建表，存在则校验列），
//! 之后每次 `emit` 向表中插入一行。没有批量、重试或缓冲，
//! 错误原样返回给调用方。

use chrono::{Local, NaiveDateTime};
use tracing::{debug, info};

use crate::config::{validate_config, DatabaseHandlerConfig, DatabaseType, TimestampDefault};
use crate::core::record::LogRecord;
use crate::diagnostics::{HandlerStats, HandlerStatsSnapshot};
use crate::error::{QuantumDbLogError, Result};
use crate::sinks::database::connection::{DatabasePool, DatabaseUri};
use crate::sinks::database::schema::{
    ensure_table, validate_table_name_for, SchemaState, TableSpec,
};

/// 数据库日志处理器
///
/// `Send + Sync`，可以在多个线程间共享。处理器本身不加锁，
/// 每次写入从 r2d2 池中取一个连接，由连接池负责串行化。
pub struct DatabaseHandler {
    /// 数据库连接池
    pool: DatabasePool,
    /// 表定义
    spec: TableSpec,
    /// 预先生成的插入语句
    insert_sql: String,
    timestamp_default: TimestampDefault,
    schema_state: SchemaState,
    stats: HandlerStats,
}

impl std::fmt::Debug for DatabaseHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseHandler")
            .field("table", &self.spec.name())
            .field("pool", &self.pool)
            .field("timestamp_default", &self.timestamp_default)
            .field("schema_state", &self.schema_state)
            .finish()
    }
}

impl DatabaseHandler {
    /// 创建新的数据库日志处理器
    ///
    /// # 错误
    /// - 配置无效：`ConfigError` / `InvalidTableName` / `InvalidLogLevel`
    /// - 连不上数据库：`ConnectionError`
    /// - 已有表包含预期之外的列：`SchemaMismatch`
    pub fn new(config: DatabaseHandlerConfig) -> Result<Self> {
        validate_config(&config)?;

        let uri = DatabaseUri::parse(&config.connection_string)?;
        validate_table_name_for(uri.database_type(), &config.table_name)?;
        let spec = TableSpec::new(&config.table_name)?;
        let pool = DatabasePool::build(&uri, &config)?;

        let schema_state = {
            let mut conn = pool.get()?;
            ensure_table(&mut conn, &spec)?
        };

        info!(
            "数据库日志处理器已就绪，数据库类型: {}，表: {}，{:?}",
            uri.database_type(),
            spec.name(),
            schema_state
        );

        let insert_sql = spec.insert_sql(uri.database_type());

        Ok(Self {
            pool,
            spec,
            insert_sql,
            timestamp_default: config.timestamp_default,
            schema_state,
            stats: HandlerStats::new(),
        })
    }

    /// 用连接 URI 和表名创建处理器，其余配置取默认值
    pub fn connect(connection_string: &str, table_name: &str) -> Result<Self> {
        Self::new(DatabaseHandlerConfig::new(connection_string, table_name))
    }

    /// 写入一条记录。只取记录的消息，其它字段忽略。
    pub fn emit(&self, record: &LogRecord) -> Result<()> {
        self.emit_message(record.message())
    }

    /// 写入一条消息。长度不做截断，超过 500 字符时的行为取决于数据库。
    pub fn emit_message(&self, message: &str) -> Result<()> {
        let result = self.insert(message);
        match result {
            Ok(()) => self.stats.increment_rows_written(),
            Err(_) => self.stats.increment_insert_failures(),
        }
        result
    }

    fn insert(&self, message: &str) -> Result<()> {
        let mut conn = self.pool.get()?;
        conn.insert_row(&self.insert_sql, self.timestamp_for_insert(), message)
            .map_err(QuantumDbLogError::from_insert)?;
        Ok(())
    }

    fn timestamp_for_insert(&self) -> NaiveDateTime {
        match self.timestamp_default {
            TimestampDefault::DefinitionTime => self.spec.defined_at(),
            TimestampDefault::InsertTime => Local::now().naive_local(),
        }
    }

    /// 测试数据库连接
    pub fn test_connection(&self) -> Result<()> {
        let _conn = self.pool.get()?;
        debug!("数据库连接测试成功");
        Ok(())
    }

    pub fn table_name(&self) -> &str {
        self.spec.name()
    }

    pub fn table_spec(&self) -> &TableSpec {
        &self.spec
    }

    pub fn database_type(&self) -> DatabaseType {
        self.pool.database_type()
    }

    /// 表结构定义时刻，`DefinitionTime` 模式下每行的时间戳
    pub fn defined_at(&self) -> NaiveDateTime {
        self.spec.defined_at()
    }

    /// 构造时表是新建的还是校验通过的
    pub fn schema_state(&self) -> SchemaState {
        self.schema_state
    }

    pub fn stats(&self) -> HandlerStatsSnapshot {
        self.stats.snapshot()
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}
