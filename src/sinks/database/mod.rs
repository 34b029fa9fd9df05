//! 数据库 Sink 模块
//!
//! 此模块提供了将日志写入关系数据库表的功能，支持 SQLite、MySQL 和 PostgreSQL。

pub mod connection;
pub mod handler;
pub mod schema;

pub use connection::{DatabaseConnection, DatabasePool, DatabaseUri};
pub use handler::DatabaseHandler;
pub use schema::{SchemaState, TableSpec};
