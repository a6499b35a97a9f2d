//! 循环模式定义
//!
//! 决定后台控制线程安装哪一种 tick 回调。

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// 控制线程的循环模式
///
/// # 模式说明
///
/// - **Stopped**: 没有后台线程
/// - **TorqueControl**: 每个 tick 发布状态并下发力矩指令
/// - **PassiveRead**: 每个 tick 只发布状态，不下发指令
///
/// 只有两种回调形态，启动时用 `match` 分派，不使用动态分派。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LoopMode {
    /// 已停止（默认）
    #[default]
    Stopped = 0,

    /// 力矩控制
    TorqueControl = 1,

    /// 被动读取
    PassiveRead = 2,
}

impl LoopMode {
    /// 从 u8 转换
    ///
    /// 如果值无效，返回 Stopped。
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::TorqueControl,
            2 => Self::PassiveRead,
            _ => Self::Stopped,
        }
    }

    /// 转换为 u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_stopped(self) -> bool {
        self == Self::Stopped
    }
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopMode::Stopped => write!(f, "Stopped"),
            LoopMode::TorqueControl => write!(f, "Running(TorqueControl)"),
            LoopMode::PassiveRead => write!(f, "Running(PassiveRead)"),
        }
    }
}

/// 循环模式（原子版本，用于线程间共享）
///
/// 状态查询（`is_stopped()`、`mode()`）不需要获取生命周期锁，
/// 因此不会被正在 join 控制线程的 `stop()` 阻塞。
#[derive(Debug)]
pub struct AtomicLoopMode {
    inner: AtomicU8,
}

impl AtomicLoopMode {
    pub fn new(mode: LoopMode) -> Self {
        Self {
            inner: AtomicU8::new(mode.as_u8()),
        }
    }

    pub fn get(&self, ordering: Ordering) -> LoopMode {
        LoopMode::from_u8(self.inner.load(ordering))
    }

    pub fn set(&self, mode: LoopMode, ordering: Ordering) {
        self.inner.store(mode.as_u8(), ordering);
    }
}

impl Default for AtomicLoopMode {
    fn default() -> Self {
        Self::new(LoopMode::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_mode_conversions() {
        assert_eq!(LoopMode::Stopped.as_u8(), 0);
        assert_eq!(LoopMode::TorqueControl.as_u8(), 1);
        assert_eq!(LoopMode::PassiveRead.as_u8(), 2);

        assert_eq!(LoopMode::from_u8(1), LoopMode::TorqueControl);
        assert_eq!(LoopMode::from_u8(2), LoopMode::PassiveRead);
        assert_eq!(LoopMode::from_u8(255), LoopMode::Stopped); // 无效值
    }

    #[test]
    fn test_loop_mode_predicates() {
        assert!(LoopMode::Stopped.is_stopped());
        assert!(!LoopMode::TorqueControl.is_stopped());
        assert!(!LoopMode::PassiveRead.is_stopped());
        assert_eq!(LoopMode::default(), LoopMode::Stopped);
    }

    #[test]
    fn test_loop_mode_display() {
        assert_eq!(LoopMode::PassiveRead.to_string(), "Running(PassiveRead)");
        assert_eq!(LoopMode::Stopped.to_string(), "Stopped");
    }

    #[test]
    fn test_atomic_loop_mode() {
        let mode = AtomicLoopMode::default();
        assert_eq!(mode.get(Ordering::Acquire), LoopMode::Stopped);

        mode.set(LoopMode::TorqueControl, Ordering::Release);
        assert_eq!(mode.get(Ordering::Acquire), LoopMode::TorqueControl);
    }
}
