//! 指令缓冲区（邮箱模式）
//!
//! 保存最近一次请求的关节力矩指令和终止标志：
//! - 主机线程 `set()` 直接覆盖（Last Write Wins）
//! - 控制线程每个 tick `consume()` 一次，拿到整条指令和终止标志
//!
//! 指令以整体为单位替换，tick 不会看到来自两次写入的混合字段。
//! 没有按 tick 的版本号：同一 tick 周期内的多次写入只有最后一次生效。

use panda_device::JointEfforts;
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};

/// 邮箱中的指令
#[derive(Debug)]
pub struct CommandSlot {
    efforts: JointEfforts,
    /// 当前指令是否已经被某个 tick 消费过
    consumed: bool,
}

/// 单个 tick 消费到的指令
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsumedCommand {
    pub efforts: JointEfforts,
    /// 终止标志（作为 "motion finished" 随本 tick 的指令一起下发）
    pub stop_requested: bool,
}

/// 指令缓冲区
///
/// 锁只保护一次指令拷贝，持有时间极短。
/// 终止标志在锁内读取：在 `request_stop()` 之前完成的 `set()`，
/// 一定会被看到终止标志的那个 tick 观察到。
#[derive(Debug)]
pub struct CommandBuffer {
    slot: Mutex<CommandSlot>,
    stop_requested: AtomicBool,
}

impl CommandBuffer {
    /// 创建指令缓冲区（初始为全零"保持不动"指令）
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(CommandSlot {
                efforts: JointEfforts::zero(),
                consumed: true,
            }),
            stop_requested: AtomicBool::new(false),
        }
    }

    /// 替换待下发的指令
    ///
    /// 返回 `true` 表示覆盖了一条尚未被任何 tick 消费的指令。
    #[inline]
    pub fn set(&self, efforts: JointEfforts) -> bool {
        let mut slot = self.slot.lock();
        let overwrite = !slot.consumed;
        slot.efforts = efforts;
        slot.consumed = false;
        overwrite
    }

    /// 取出最新指令和终止标志（仅由控制线程调用，每 tick 一次）
    #[inline]
    pub fn consume(&self) -> ConsumedCommand {
        let mut slot = self.slot.lock();
        slot.consumed = true;
        ConsumedCommand {
            efforts: slot.efforts,
            stop_requested: self.stop_requested.load(Ordering::Acquire),
        }
    }

    /// 查看待下发指令（不标记为已消费）
    #[cfg(test)]
    fn peek(&self) -> JointEfforts {
        self.slot.lock().efforts
    }

    /// 设置终止标志，下一次 `consume()` 即可观察到
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    /// 清除终止标志（启动新会话前、停止完成后）
    pub fn clear_stop(&self) {
        self.stop_requested.store(false, Ordering::Release);
    }

    /// 终止标志（只读循环使用，不需要指令锁）
    #[inline]
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// 获取与 `set()` 相同的互斥锁
    ///
    /// 持有期间任何指令写入和消费都会等待。`set_load` 用它避免负载修改
    /// 与写到一半的指令交错。
    pub(crate) fn exclusive(&self) -> MutexGuard<'_, CommandSlot> {
        self.slot.lock()
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}
