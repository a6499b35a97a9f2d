//! 控制线程循环模块
//!
//! 负责后台控制线程的 tick 回调：发布状态、消费指令、观察终止标志。

use crate::command::CommandBuffer;
use crate::error::DriverError;
use crate::metrics::SessionMetrics;
use crate::mode::LoopMode;
use crate::state::StateCache;
use panda_device::{ArmState, ControlLoopOptions, DeviceError, DeviceSession, Torques};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, trace};

/// 共享会话上下文
///
/// 控制线程和主机线程共享的全部数据。状态缓存和指令缓冲区各自有独立的同步原语，
/// `read()` 永远不会阻塞 `write()`，反之亦然。
#[derive(Debug, Default)]
pub struct SessionContext {
    /// 最新机械臂状态（ArcSwap，无锁读取）
    pub state: StateCache,
    /// 待下发指令 + 终止标志（短临界区 Mutex）
    pub commands: CommandBuffer,
    /// 性能指标
    pub metrics: SessionMetrics,
    /// 控制线程是否仍在设备循环中
    loop_active: AtomicBool,
    /// 最近一次设备循环错误（由主机取走）
    loop_error: Mutex<Option<DriverError>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 控制线程是否仍在设备循环中
    pub fn is_loop_active(&self) -> bool {
        self.loop_active.load(Ordering::Acquire)
    }

    pub(crate) fn set_loop_active(&self, active: bool) {
        self.loop_active.store(active, Ordering::Release);
    }

    pub(crate) fn record_loop_error(&self, error: DriverError) {
        *self.loop_error.lock() = Some(error);
    }

    pub(crate) fn take_loop_error(&self) -> Option<DriverError> {
        self.loop_error.lock().take()
    }
}

/// 控制线程退出（包括 panic 展开）时清除 `loop_active`
struct LoopActiveGuard<'a>(&'a SessionContext);

impl Drop for LoopActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.set_loop_active(false);
    }
}

/// 力矩控制 tick：发布状态，取出指令，终止标志作为 "motion finished" 一起下发
#[inline]
pub fn torque_control_tick(ctx: &SessionContext, state: &ArmState) -> Torques {
    ctx.state.update(*state);
    let command = ctx.commands.consume();
    ctx.metrics.ticks_total.fetch_add(1, Ordering::Relaxed);

    if command.stop_requested {
        trace!("Stop requested, finishing motion at tick {}", state.tick);
    }
    Torques::new(command.efforts).finished(command.stop_requested)
}

/// 被动读取 tick：发布状态，终止标志清除时继续
#[inline]
pub fn passive_read_tick(ctx: &SessionContext, state: &ArmState) -> bool {
    ctx.state.update(*state);
    ctx.metrics.ticks_total.fetch_add(1, Ordering::Relaxed);
    !ctx.commands.stop_requested()
}

/// 运行力矩控制循环（阻塞直到设备循环结束）
pub fn run_torque_control<D: DeviceSession + ?Sized>(
    device: &D,
    ctx: &SessionContext,
    options: ControlLoopOptions,
) -> Result<(), DeviceError> {
    device.run_control_loop(
        &mut |state: &ArmState, _period| torque_control_tick(ctx, state),
        options,
    )
}

/// 运行被动读取循环（阻塞直到设备循环结束）
pub fn run_passive_read<D: DeviceSession + ?Sized>(
    device: &D,
    ctx: &SessionContext,
) -> Result<(), DeviceError> {
    device.run_read_loop(&mut |state: &ArmState| passive_read_tick(ctx, state))
}

/// 控制线程入口
///
/// 按启动时选定的模式运行一次设备循环。循环错误在此记录，不会跨线程传播为 panic。
pub(crate) fn control_thread_main<D: DeviceSession + ?Sized>(
    device: &D,
    ctx: &SessionContext,
    mode: LoopMode,
    options: ControlLoopOptions,
    elevate_priority: bool,
) {
    let _active = LoopActiveGuard(ctx);

    // 设置线程优先级（可选 feature）
    #[cfg(feature = "realtime")]
    if elevate_priority {
        use thread_priority::*;
        use tracing::warn;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => {
                info!("Control thread priority set to MAX (realtime)");
            },
            Err(e) => {
                warn!(
                    "Failed to set control thread priority: {:?}. \
                    On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                    e
                );
            },
        }
    }
    #[cfg(not(feature = "realtime"))]
    let _ = elevate_priority;

    let result = match mode {
        LoopMode::TorqueControl => run_torque_control(device, ctx, options),
        LoopMode::PassiveRead => run_passive_read(device, ctx),
        LoopMode::Stopped => return,
    };

    match result {
        Ok(()) => info!("Control thread: {} loop finished", mode),
        Err(e) => {
            error!("Control thread: {} loop terminated: {}", mode, e);
            ctx.metrics.loop_errors.fetch_add(1, Ordering::Relaxed);
            ctx.record_loop_error(e.into());
        },
    }
}
