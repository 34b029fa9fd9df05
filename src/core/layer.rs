//! tracing 接入层
//!
//! 把 `DatabaseHandler` 挂到 tracing 的分发链上。级别过滤由
//! tracing-subscriber 的 `LevelFilter` 负责，这一层收到的每个事件都写一行。

use std::cell::Cell;
use std::sync::Arc;

use tracing::{Event, Subscriber};
use tracing_subscriber::filter::{Filtered, LevelFilter};
use tracing_subscriber::layer::{Context, Layer};

use crate::core::record::LogRecord;
use crate::error::QuantumDbLogError;
use crate::sinks::database::DatabaseHandler;

/// 本 crate 自身事件的 target，这些事件及其子模块的事件不会写入数据库
const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

fn is_own_target(target: &str) -> bool {
    target
        .strip_prefix(OWN_TARGET)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

thread_local! {
    /// 当前线程是否正在写库。写库期间产生的事件（例如驱动自身的日志）直接丢弃。
    static EMITTING: Cell<bool> = const { Cell::new(false) };
}

/// 写入失败时的回调
pub type ErrorHandler = Arc<dyn Fn(&QuantumDbLogError) + Send + Sync>;

/// 数据库日志层
#[derive(Clone)]
pub struct DatabaseLayer {
    handler: Arc<DatabaseHandler>,
    on_error: ErrorHandler,
}

impl std::fmt::Debug for DatabaseLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseLayer")
            .field("handler", &self.handler)
            .finish()
    }
}

/// 默认的失败处理：写一行到 stderr，不经过 tracing
fn report_to_stderr(error: &QuantumDbLogError) {
    eprintln!("--- Logging error ({}) --- {}", error.category(), error);
}

impl DatabaseLayer {
    pub fn new(handler: Arc<DatabaseHandler>) -> Self {
        Self {
            handler,
            on_error: Arc::new(report_to_stderr),
        }
    }

    /// 创建带级别过滤的层
    pub fn filtered<S>(
        handler: Arc<DatabaseHandler>,
        level: LevelFilter,
    ) -> Filtered<Self, LevelFilter, S>
    where
        S: Subscriber,
    {
        <Self as Layer<S>>::with_filter(Self::new(handler), level)
    }

    /// 替换写入失败时的回调
    pub fn with_error_handler<F>(mut self, on_error: F) -> Self
    where
        F: Fn(&QuantumDbLogError) + Send + Sync + 'static,
    {
        self.on_error = Arc::new(on_error);
        self
    }

    pub fn handler(&self) -> &Arc<DatabaseHandler> {
        &self.handler
    }
}

impl<S> Layer<S> for DatabaseLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if is_own_target(event.metadata().target()) {
            return;
        }
        if EMITTING.with(|flag| flag.replace(true)) {
            return;
        }

        let record = LogRecord::from_event(event);
        let result = self.handler.emit(&record);
        EMITTING.with(|flag| flag.set(false));

        if let Err(e) = result {
            (self.on_error)(&e);
        }
    }
}
