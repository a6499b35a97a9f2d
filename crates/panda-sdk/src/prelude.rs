//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use panda_sdk::prelude::*;
//! ```

// 驱动层
pub use panda_driver::{ControlSession, LoopMode, MetricsSnapshot, RealtimePolicy, SessionConfig};

// 设备层
pub use panda_device::{ArmState, DeviceSession, JOINT_COUNT, JointEfforts, LoadParameters};

#[cfg(feature = "mock")]
pub use panda_device::SimulatedArm;

// 错误类型
pub use panda_device::DeviceError;
pub use panda_driver::DriverError;
