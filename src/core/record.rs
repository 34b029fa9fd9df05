//! 日志记录
//!
//! 处理器消费的记录结构。写库时只用到 `message`，
//! 级别、目标和时间戳保留下来供调用方使用，但不会落库。

use chrono::{DateTime, Utc};
use tracing::field::{Field, Visit};
use tracing::{Event, Level};

/// 一条日志记录
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// 创建时间
    pub timestamp: DateTime<Utc>,
    /// 日志级别
    pub level: Level,
    /// 目标模块
    pub target: String,
    /// 日志消息
    pub message: String,
}

impl LogRecord {
    /// 以 INFO 级别创建一条只有消息的记录
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            timestamp: Utc::now(),
            level: Level::INFO,
            target: String::new(),
            message: message.into(),
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_target<S: Into<String>>(mut self, target: S) -> Self {
        self.target = target.into();
        self
    }

    /// 从 tracing 事件构建记录，消息取自 `message` 字段，缺失时为空串。
    pub fn from_event(event: &Event<'_>) -> Self {
        let metadata = event.metadata();
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        Self {
            timestamp: Utc::now(),
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: visitor.message.unwrap_or_default(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        // format_args! 形式的消息走这里，Debug 输出即原文
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        }
    }
}
