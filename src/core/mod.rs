//! QuantumDbLog 核心模块
//!
//! 记录结构和 tracing 接入层。

pub mod layer;
pub mod record;

pub use layer::{DatabaseLayer, ErrorHandler};
pub use record::LogRecord;
