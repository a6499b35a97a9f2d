//! 驱动层模块
//!
//! 本模块管理与机械臂之间的实时控制会话，包括：
//! - 后台控制线程的生命周期（力矩控制 / 被动读取 / 停止）
//! - 状态同步（ArcSwap 无锁读取）
//! - 指令交接（邮箱模式，Last Write Wins）
//! - 负载设置（与指令写入互斥）
//!
//! # 线程模型
//!
//! 只有一个后台控制线程，按设备节拍（约 1kHz）运行 tick 回调；
//! 任意数量的主机线程调用 `write()` / `read()` / `start_*()` / `stop()` / `set_load()`。
//! 状态缓存和指令缓冲区各自有独立的同步原语，读写互不阻塞。

pub mod command;
pub mod config;
mod error;
pub mod metrics;
pub mod mode;
pub mod pipeline;
mod session;
pub mod state;

pub use command::{CommandBuffer, ConsumedCommand};
pub use config::{RealtimePolicy, SessionConfig};
pub use error::DriverError;
pub use metrics::{MetricsSnapshot, SessionMetrics};
pub use mode::{AtomicLoopMode, LoopMode};
pub use pipeline::{
    SessionContext, passive_read_tick, run_passive_read, run_torque_control, torque_control_tick,
};
pub use session::ControlSession;
pub use state::StateCache;
