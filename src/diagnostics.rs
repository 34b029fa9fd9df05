//! 数据库日志处理器的运行计数。
//!
//! 写入失败不会再通过 tracing 记录（避免日志写日志的循环），
//! 这里的计数是观察失败情况的途径。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 处理器计数器，使用原子操作保证线程安全。
#[derive(Debug)]
pub struct HandlerStats {
    start_time: Instant,
    /// 成功写入的行数
    rows_written: AtomicU64,
    /// 插入失败次数（含取连接失败）
    insert_failures: AtomicU64,
}

/// 计数快照，用于外部查询。
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerStatsSnapshot {
    /// 处理器存活时间
    pub uptime: Duration,
    pub rows_written: u64,
    pub insert_failures: u64,
    /// 写入成功率（百分比）；尚无写入时为 100
    pub success_rate_percent: f64,
}

impl Default for HandlerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            rows_written: AtomicU64::new(0),
            insert_failures: AtomicU64::new(0),
        }
    }

    pub fn increment_rows_written(&self) {
        self.rows_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_insert_failures(&self) {
        self.insert_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取当前计数的快照。
    pub fn snapshot(&self) -> HandlerStatsSnapshot {
        let rows_written = self.rows_written.load(Ordering::Relaxed);
        let insert_failures = self.insert_failures.load(Ordering::Relaxed);
        let attempts = rows_written + insert_failures;

        let success_rate_percent = if attempts > 0 {
            (rows_written as f64 / attempts as f64) * 100.0
        } else {
            100.0
        };

        HandlerStatsSnapshot {
            uptime: self.start_time.elapsed(),
            rows_written,
            insert_failures,
            success_rate_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fresh_stats() {
        let snapshot = HandlerStats::new().snapshot();
        assert_eq!(snapshot.rows_written, 0);
        assert_eq!(snapshot.insert_failures, 0);
        assert_eq!(snapshot.success_rate_percent, 100.0);
    }

    #[test]
    fn test_success_rate() {
        let stats = HandlerStats::new();
        for _ in 0..3 {
            stats.increment_rows_written();
        }
        stats.increment_insert_failures();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.rows_written, 3);
        assert_eq!(snapshot.insert_failures, 1);
        assert!((snapshot.success_rate_percent - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_concurrent_increments() {
        let stats = Arc::new(HandlerStats::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..250 {
                        stats.increment_rows_written();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.snapshot().rows_written, 1000);
    }
}
