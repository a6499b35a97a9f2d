//! Panda SDK - 力矩控制机械臂 Rust SDK
//!
//! 管理与机械臂之间持久、低延迟的控制会话：后台实时线程以设备节拍（约 1kHz）
//! 交换状态和指令，其他任意线程随时读取最新状态、写入新指令，互不阻塞。
//!
//! # 架构设计
//!
//! - **设备层** (`device`): 设备会话抽象，仿真机械臂（`mock` feature）
//! - **驱动层** (`driver`): 控制线程生命周期、状态缓存、指令缓冲区
//!
//! # 快速开始
//!
//! ```rust,ignore
//! use panda_sdk::prelude::*;
//!
//! let session = ControlSession::new(device)?;
//! session.start_torque_control()?;
//! loop {
//!     let state = session.read();
//!     session.write(compute_torques(&state));
//! }
//! ```

pub mod prelude;

pub use panda_device as device;
pub use panda_driver as driver;

// 常用类型
pub use panda_device::{
    ArmState, DeviceError, DeviceSession, JOINT_COUNT, JointEfforts, LoadParameters,
};
pub use panda_driver::{ControlSession, DriverError, LoopMode, SessionConfig};

use tracing_subscriber::EnvFilter;

/// 默认日志过滤规则（`RUST_LOG` 未设置时使用）
pub const DEFAULT_LOG_DIRECTIVES: &str = "panda_sdk=info,panda_driver=info,panda_device=info";

/// 日志初始化错误
pub type LoggingError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 初始化日志
///
/// 安装 `tracing_subscriber::fmt` 订阅者，过滤规则来自 `RUST_LOG`
/// （未设置时使用 [`DEFAULT_LOG_DIRECTIVES`]），并把 `log` crate 的记录桥接到 tracing。
/// 重复调用时静默忽略。
pub fn init_logging() {
    let _ = try_init_logging(DEFAULT_LOG_DIRECTIVES);
}

/// 初始化日志（可指定默认过滤规则）
pub fn try_init_logging(default_directives: &str) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives))?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    tracing_log::LogTracer::init_with_filter(log::LevelFilter::Trace)?;
    Ok(())
}
