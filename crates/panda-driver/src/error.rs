//! 驱动层错误类型定义

use crate::mode::LoopMode;
use panda_device::DeviceError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 非法状态转换（编程错误）
    ///
    /// 不会作为 `Err` 返回：`start_*` 在控制线程仍存活时以此消息 panic。
    #[error("Invalid state transition: {from} -> {requested} (stop the session first)")]
    InvalidStateTransition { from: LoopMode, requested: LoopMode },

    /// 设备循环运行中通信中断
    #[error("Device communication lost: {0}")]
    DeviceCommunicationLost(String),

    /// 设备拒绝请求（如负载参数无效）
    #[error("Device rejected request: {0}")]
    DeviceRejected(String),

    /// 配置要求实时内核，但设备报告不具备实时能力
    #[error("Real-time kernel required but not available")]
    RealtimeUnavailable,

    /// 配置无效
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// 配置文件读取失败
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 控制线程创建失败
    #[error("Failed to spawn control thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// 控制线程 panic
    #[error("Control thread panicked")]
    ControlThreadPanicked,
}

impl From<DeviceError> for DriverError {
    fn from(error: DeviceError) -> Self {
        match error {
            DeviceError::CommunicationLost(reason) => DriverError::DeviceCommunicationLost(reason),
            DeviceError::Rejected(reason) => DriverError::DeviceRejected(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::InvalidStateTransition {
            from: LoopMode::TorqueControl,
            requested: LoopMode::PassiveRead,
        };
        let msg = err.to_string();
        assert!(msg.contains("Running(TorqueControl)"), "{}", msg);
        assert!(msg.contains("Running(PassiveRead)"), "{}", msg);

        let err = DriverError::DeviceRejected("bad mass".to_string());
        assert_eq!(err.to_string(), "Device rejected request: bad mass");

        assert_eq!(
            DriverError::RealtimeUnavailable.to_string(),
            "Real-time kernel required but not available"
        );
    }

    #[test]
    fn test_from_device_error() {
        let err: DriverError = DeviceError::CommunicationLost("link down".to_string()).into();
        assert!(matches!(err, DriverError::DeviceCommunicationLost(ref r) if r == "link down"));

        let err: DriverError = DeviceError::Rejected("moving".to_string()).into();
        assert!(matches!(err, DriverError::DeviceRejected(ref r) if r == "moving"));
    }
}
