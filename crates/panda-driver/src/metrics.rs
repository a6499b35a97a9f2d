//! 会话性能指标
//!
//! 原子计数器（Relaxed），热路径上只做 `fetch_add`，不加锁。

use std::sync::atomic::{AtomicU64, Ordering};

/// 控制会话计数器
#[derive(Debug, Default)]
pub struct SessionMetrics {
    /// 控制线程处理的 tick 总数（两种模式）
    pub ticks_total: AtomicU64,
    /// `write()` 调用次数
    pub commands_written: AtomicU64,
    /// 写入覆盖了尚未被任何 tick 消费的指令
    pub command_overwrites: AtomicU64,
    /// 成功下发的负载设置
    pub loads_applied: AtomicU64,
    /// 被设备拒绝的负载设置
    pub loads_rejected: AtomicU64,
    /// 以错误结束的设备循环
    pub loop_errors: AtomicU64,
    /// 启动的会话数
    pub sessions_started: AtomicU64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取当前所有计数器的快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks_total: self.ticks_total.load(Ordering::Relaxed),
            commands_written: self.commands_written.load(Ordering::Relaxed),
            command_overwrites: self.command_overwrites.load(Ordering::Relaxed),
            loads_applied: self.loads_applied.load(Ordering::Relaxed),
            loads_rejected: self.loads_rejected.load(Ordering::Relaxed),
            loop_errors: self.loop_errors.load(Ordering::Relaxed),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub ticks_total: u64,
    pub commands_written: u64,
    pub command_overwrites: u64,
    pub loads_applied: u64,
    pub loads_rejected: u64,
    pub loop_errors: u64,
    pub sessions_started: u64,
}

impl MetricsSnapshot {
    /// 覆盖率（%）：写入中有多少在被消费前就被新写入替换
    ///
    /// 主机写入频率高于 tick 频率时该值会偏高，这是正常的。
    pub fn overwrite_rate(&self) -> f64 {
        if self.commands_written == 0 {
            return 0.0;
        }
        self.command_overwrites as f64 / self.commands_written as f64 * 100.0
    }
}
