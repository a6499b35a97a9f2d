//! # Panda Device Layer
//!
//! 机械臂设备会话抽象层：驱动层只通过 [`DeviceSession`] 与物理机械臂交互。
//!
//! 设备实现负责实时通信本身（tick 节拍、网络传输、超时检测），
//! 驱动层只在每个 tick 的回调中交换状态和指令。

use std::time::Duration;
use thiserror::Error;

pub mod types;

#[cfg(feature = "mock")]
pub mod mock;

pub use types::*;

#[cfg(feature = "mock")]
pub use mock::SimulatedArm;

/// 设备层统一错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// 控制/读取循环运行中连接断开
    #[error("Communication lost: {0}")]
    CommunicationLost(String),
    /// 设备拒绝请求（如无效负载参数，或运动中不允许修改）
    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// 力矩控制 tick 回调：输入当前状态和距上个 tick 的时间，输出本 tick 的力矩
pub type ControlCallback<'a> = dyn FnMut(&ArmState, Duration) -> Torques + 'a;

/// 只读 tick 回调：返回 `false` 时结束读取循环
pub type ReadCallback<'a> = dyn FnMut(&ArmState) -> bool + 'a;

/// 机械臂设备会话
///
/// # 约定
///
/// - `run_control_loop` / `run_read_loop` 阻塞调用线程，按设备节拍每 tick 调用一次回调，
///   直到回调发出结束信号（`motion_finished == true` 或返回 `false`）或通信失败。
/// - 回调必须在设备的 tick 期限内返回，超期由设备层检测和上报。
/// - `set_load` 可以在任意线程调用，包括循环运行期间。
pub trait DeviceSession: Send + Sync + 'static {
    /// 当前系统是否具备实时调度能力（如 PREEMPT_RT 内核）
    fn has_realtime_capability(&self) -> bool;

    /// 运行力矩控制循环
    fn run_control_loop(
        &self,
        callback: &mut ControlCallback<'_>,
        options: ControlLoopOptions,
    ) -> Result<(), DeviceError>;

    /// 运行只读循环（不下发指令）
    fn run_read_loop(&self, callback: &mut ReadCallback<'_>) -> Result<(), DeviceError>;

    /// 设置末端负载
    fn set_load(&self, load: &LoadParameters) -> Result<(), DeviceError>;
}
