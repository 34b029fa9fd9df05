//! QuantumDbLog Sinks 模块
//!
//! 日志输出目标。目前只有关系数据库一种。

pub mod database;

pub use database::DatabaseHandler;
