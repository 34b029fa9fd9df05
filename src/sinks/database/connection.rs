//! 数据库连接管理
//!
//! 解析连接 URI，构建 r2d2 连接池，并把三种后端的连接包装成一个枚举，
//! 供表结构管理和插入逻辑使用。

use std::time::Duration;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sql_types::{Text, Timestamp};

use crate::config::{DatabaseHandlerConfig, DatabaseType};
use crate::error::{QuantumDbLogError, Result};

/// SQLite 内存数据库的文件名
pub const SQLITE_MEMORY: &str = ":memory:";

/// 解析后的连接 URI
///
/// 支持的写法：
/// - `sqlite:///relative.db`、`sqlite:////absolute/path.db`
/// - `sqlite://` 或 `sqlite:///:memory:`（内存数据库）
/// - 不带 scheme 的路径，视为 SQLite 文件
/// - `postgres://...`、`postgresql://...`、`mysql://...`
///
/// scheme 中 `+driver` 后缀会被忽略，例如 `postgresql+psycopg2://`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseUri {
    db_type: DatabaseType,
    url: String,
}

impl DatabaseUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(QuantumDbLogError::config("数据库连接 URI 不能为空"));
        }

        let Some((scheme, rest)) = uri.split_once("://") else {
            return Ok(Self::sqlite(uri.to_string()));
        };

        let dialect = scheme
            .split('+')
            .next()
            .unwrap_or(scheme)
            .to_ascii_lowercase();

        match dialect.as_str() {
            "sqlite" => Ok(Self::sqlite(sqlite_path(rest))),
            // SQLite 原生 URI 文件名，原样交给驱动
            "file" => Ok(Self::sqlite(uri.to_string())),
            "postgres" | "postgresql" => Ok(Self {
                db_type: DatabaseType::Postgresql,
                url: format!("{}://{}", dialect, rest),
            }),
            "mysql" | "mariadb" => Ok(Self {
                db_type: DatabaseType::Mysql,
                url: format!("mysql://{}", rest),
            }),
            _ => Err(QuantumDbLogError::UnsupportedDatabase(scheme.to_string())),
        }
    }

    fn sqlite(url: String) -> Self {
        Self {
            db_type: DatabaseType::Sqlite,
            url,
        }
    }

    pub fn database_type(&self) -> DatabaseType {
        self.db_type
    }

    /// 交给 diesel 的连接串
    pub fn url(&self) -> &str {
        &self.url
    }

    /// 是否为 SQLite 内存数据库
    pub fn is_in_memory(&self) -> bool {
        self.db_type == DatabaseType::Sqlite
            && (self.url == SQLITE_MEMORY || self.url.contains("mode=memory"))
    }
}

fn sqlite_path(rest: &str) -> String {
    let path = rest.strip_prefix('/').unwrap_or(rest);
    if path.is_empty() {
        SQLITE_MEMORY.to_string()
    } else {
        path.to_string()
    }
}

/// 数据库连接池类型别名
#[cfg(feature = "sqlite")]
type SqlitePool = Pool<ConnectionManager<diesel::sqlite::SqliteConnection>>;

#[cfg(feature = "mysql")]
type MysqlPool = Pool<ConnectionManager<diesel::mysql::MysqlConnection>>;

#[cfg(feature = "postgres")]
type PostgresPool = Pool<ConnectionManager<diesel::pg::PgConnection>>;

/// 每次从池中取出 SQLite 连接时设置 busy_timeout，
/// 让并发写入等待锁而不是立即失败。
#[cfg(feature = "sqlite")]
#[derive(Debug, Clone, Copy)]
struct SqlitePragmas {
    busy_timeout_ms: u64,
}

#[cfg(feature = "sqlite")]
impl diesel::r2d2::CustomizeConnection<diesel::sqlite::SqliteConnection, diesel::r2d2::Error>
    for SqlitePragmas
{
    fn on_acquire(
        &self,
        conn: &mut diesel::sqlite::SqliteConnection,
    ) -> std::result::Result<(), diesel::r2d2::Error> {
        use diesel::connection::SimpleConnection;

        conn.batch_execute(&format!("PRAGMA busy_timeout = {};", self.busy_timeout_ms))
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// 数据库连接池枚举
#[derive(Clone)]
pub enum DatabasePool {
    #[cfg(feature = "sqlite")]
    Sqlite(SqlitePool),
    #[cfg(feature = "mysql")]
    Mysql(MysqlPool),
    #[cfg(feature = "postgres")]
    Postgres(PostgresPool),
}

impl std::fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DatabasePool")
            .field(&self.database_type())
            .finish()
    }
}

impl DatabasePool {
    /// 创建数据库连接池。池在创建时就会建立连接，连不上直接报错。
    pub fn build(uri: &DatabaseUri, config: &DatabaseHandlerConfig) -> Result<Self> {
        let timeout_duration = Duration::from_millis(config.connection_timeout_ms);

        match uri.database_type() {
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => {
                let manager =
                    ConnectionManager::<diesel::sqlite::SqliteConnection>::new(uri.url());
                let mut builder = SqlitePool::builder()
                    .max_size(config.connection_pool_size)
                    .connection_timeout(timeout_duration)
                    .connection_customizer(Box::new(SqlitePragmas {
                        busy_timeout_ms: config.sqlite_busy_timeout_ms,
                    }));
                if uri.is_in_memory() {
                    // 每个内存连接都是一个独立的库，只能有一个且不能被回收
                    builder = builder.max_size(1).idle_timeout(None).max_lifetime(None);
                }
                let pool = builder.build(manager).map_err(|e| {
                    QuantumDbLogError::connection(format!("SQLite 连接池创建失败: {}", e))
                })?;
                Ok(DatabasePool::Sqlite(pool))
            }
            #[cfg(feature = "mysql")]
            DatabaseType::Mysql => {
                let manager = ConnectionManager::<diesel::mysql::MysqlConnection>::new(uri.url());
                let pool = MysqlPool::builder()
                    .max_size(config.connection_pool_size)
                    .connection_timeout(timeout_duration)
                    .build(manager)
                    .map_err(|e| {
                        QuantumDbLogError::connection(format!("MySQL 连接池创建失败: {}", e))
                    })?;
                Ok(DatabasePool::Mysql(pool))
            }
            #[cfg(feature = "postgres")]
            DatabaseType::Postgresql => {
                let manager = ConnectionManager::<diesel::pg::PgConnection>::new(uri.url());
                let pool = PostgresPool::builder()
                    .max_size(config.connection_pool_size)
                    .connection_timeout(timeout_duration)
                    .build(manager)
                    .map_err(|e| {
                        QuantumDbLogError::connection(format!("PostgreSQL 连接池创建失败: {}", e))
                    })?;
                Ok(DatabasePool::Postgres(pool))
            }
            #[cfg(not(feature = "sqlite"))]
            DatabaseType::Sqlite => Err(QuantumDbLogError::UnsupportedDatabase(
                "SQLite support not enabled".to_string(),
            )),
            #[cfg(not(feature = "mysql"))]
            DatabaseType::Mysql => Err(QuantumDbLogError::UnsupportedDatabase(
                "MySQL support not enabled".to_string(),
            )),
            #[cfg(not(feature = "postgres"))]
            DatabaseType::Postgresql => Err(QuantumDbLogError::UnsupportedDatabase(
                "PostgreSQL support not enabled".to_string(),
            )),
        }
    }

    pub fn database_type(&self) -> DatabaseType {
        match self {
            #[cfg(feature = "sqlite")]
            DatabasePool::Sqlite(_) => DatabaseType::Sqlite,
            #[cfg(feature = "mysql")]
            DatabasePool::Mysql(_) => DatabaseType::Mysql,
            #[cfg(feature = "postgres")]
            DatabasePool::Postgres(_) => DatabaseType::Postgresql,
        }
    }

    /// 从池中取出一个连接
    pub fn get(&self) -> Result<DatabaseConnection> {
        match self {
            #[cfg(feature = "sqlite")]
            DatabasePool::Sqlite(pool) => pool.get().map(DatabaseConnection::Sqlite).map_err(|e| {
                QuantumDbLogError::connection(format!("获取 SQLite 连接失败: {}", e))
            }),
            #[cfg(feature = "mysql")]
            DatabasePool::Mysql(pool) => pool.get().map(DatabaseConnection::Mysql).map_err(|e| {
                QuantumDbLogError::connection(format!("获取 MySQL 连接失败: {}", e))
            }),
            #[cfg(feature = "postgres")]
            DatabasePool::Postgres(pool) => {
                pool.get().map(DatabaseConnection::Postgres).map_err(|e| {
                    QuantumDbLogError::connection(format!("获取 PostgreSQL 连接失败: {}", e))
                })
            }
        }
    }
}

/// 从池中取出的单个连接
pub enum DatabaseConnection {
    #[cfg(feature = "sqlite")]
    Sqlite(PooledConnection<ConnectionManager<diesel::sqlite::SqliteConnection>>),
    #[cfg(feature = "mysql")]
    Mysql(PooledConnection<ConnectionManager<diesel::mysql::MysqlConnection>>),
    #[cfg(feature = "postgres")]
    Postgres(PooledConnection<ConnectionManager<diesel::pg::PgConnection>>),
}

/// 对每种后端展开同一段代码，`$conn` 绑定为 `&mut PooledConnection<_>`
macro_rules! on_connection {
    ($self:expr, $conn:ident => $body:expr) => {
        match $self {
            #[cfg(feature = "sqlite")]
            DatabaseConnection::Sqlite($conn) => $body,
            #[cfg(feature = "mysql")]
            DatabaseConnection::Mysql($conn) => $body,
            #[cfg(feature = "postgres")]
            DatabaseConnection::Postgres($conn) => $body,
        }
    };
}

/// 单列查询结果，所有探测语句都把结果列命名为 `name`
#[derive(QueryableByName)]
struct NameRow {
    #[diesel(sql_type = Text)]
    name: String,
}

impl DatabaseConnection {
    pub fn database_type(&self) -> DatabaseType {
        match self {
            #[cfg(feature = "sqlite")]
            DatabaseConnection::Sqlite(_) => DatabaseType::Sqlite,
            #[cfg(feature = "mysql")]
            DatabaseConnection::Mysql(_) => DatabaseType::Mysql,
            #[cfg(feature = "postgres")]
            DatabaseConnection::Postgres(_) => DatabaseType::Postgresql,
        }
    }

    /// 执行返回 `name` 列、带一个文本参数的查询
    pub fn load_names(&mut self, sql: &str, param: &str) -> QueryResult<Vec<String>> {
        let rows: Vec<NameRow> = on_connection!(self, conn => diesel::sql_query(sql)
            .bind::<Text, _>(param)
            .load::<NameRow>(&mut **conn))?;
        Ok(rows.into_iter().map(|row| row.name).collect())
    }

    /// 执行不返回结果的语句
    pub fn execute(&mut self, sql: &str) -> QueryResult<usize> {
        on_connection!(self, conn => diesel::sql_query(sql).execute(&mut **conn))
    }

    /// 执行插入语句，绑定顺序与 `TableSpec::insert_sql` 一致
    pub fn insert_row(
        &mut self,
        sql: &str,
        timestamp: NaiveDateTime,
        message: &str,
    ) -> QueryResult<usize> {
        on_connection!(self, conn => diesel::sql_query(sql)
            .bind::<Timestamp, _>(timestamp)
            .bind::<Text, _>(message)
            .execute(&mut **conn))
    }
}
