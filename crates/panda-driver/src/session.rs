//! 控制会话 API 模块
//!
//! 提供对外的 `ControlSession`，封装后台控制线程的生命周期和状态/指令交接。
//!
//! # 状态机
//!
//! ```text
//!            start_torque_control()            stop()
//!  Stopped ─────────────────────────► Running(TorqueControl) ───► Stopped
//!     │      start_passive_read()                stop()
//!     └─────────────────────────────► Running(PassiveRead) ─────► Stopped
//! ```
//!
//! - 在控制线程存活时再次 `start_*` 是编程错误，会 panic
//! - `stop()` 可重入：已停止时直接返回
//! - 设备循环出错退出后，会话等价于 Stopped，`stop()` 只回收线程

use crate::config::{RealtimePolicy, SessionConfig};
use crate::error::DriverError;
use crate::metrics::MetricsSnapshot;
use crate::mode::{AtomicLoopMode, LoopMode};
use crate::pipeline::{SessionContext, control_thread_main};
use panda_device::{ArmState, DeviceSession, JointEfforts, LoadParameters};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// 机械臂控制会话（对外 API）
///
/// 独占设备句柄：设备只被本会话和它创建的控制线程访问。
/// 所有方法都接受 `&self`，可以通过 `Arc<ControlSession<_>>` 在多个线程之间共享。
pub struct ControlSession<D: DeviceSession> {
    /// 设备句柄（唯一的克隆在控制线程中）
    device: Arc<D>,
    /// 共享状态上下文
    ctx: Arc<SessionContext>,
    /// 当前循环模式
    mode: AtomicLoopMode,
    /// 控制线程句柄（生命周期锁，只有 start/stop 获取）
    control_thread: Mutex<Option<JoinHandle<()>>>,
    config: SessionConfig,
}

impl<D: DeviceSession> ControlSession<D> {
    /// 使用默认配置创建会话
    pub fn new(device: D) -> Result<Self, DriverError> {
        Self::with_config(device, SessionConfig::default())
    }

    /// 创建会话
    ///
    /// # 错误
    /// - `DriverError::InvalidConfig`: 配置校验失败
    /// - `DriverError::RealtimeUnavailable`: 策略为 `Enforce` 但设备不具备实时能力
    pub fn with_config(device: D, config: SessionConfig) -> Result<Self, DriverError> {
        config.validate()?;

        match config.realtime {
            RealtimePolicy::Enforce if !device.has_realtime_capability() => {
                error!("Real-time kernel required by config but not available");
                return Err(DriverError::RealtimeUnavailable);
            },
            RealtimePolicy::Auto if !device.has_realtime_capability() => {
                warn!(
                    "You are not using a real-time kernel. \
                     Using a real-time kernel is strongly recommended!"
                );
            },
            _ => {},
        }

        Ok(Self {
            device: Arc::new(device),
            ctx: Arc::new(SessionContext::new()),
            mode: AtomicLoopMode::new(LoopMode::Stopped),
            control_thread: Mutex::new(None),
            config,
        })
    }

    /// 写入新的力矩指令（不阻塞控制线程）
    ///
    /// 同一 tick 周期内的多次写入只有最后一次生效。
    pub fn write(&self, efforts: JointEfforts) {
        let overwrite = self.ctx.commands.set(efforts);

        let metrics = &self.ctx.metrics;
        metrics.commands_written.fetch_add(1, Ordering::Relaxed);
        if overwrite {
            metrics.command_overwrites.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// 读取最新机械臂状态（无锁）
    ///
    /// 从未运行过的会话返回全零状态。
    pub fn read(&self) -> ArmState {
        self.ctx.state.snapshot()
    }

    /// 启动力矩控制
    ///
    /// # Panics
    /// 控制线程仍在运行时调用（必须先 `stop()`）。
    pub fn start_torque_control(&self) -> Result<(), DriverError> {
        self.start(LoopMode::TorqueControl)
    }

    /// 启动被动读取
    ///
    /// # Panics
    /// 控制线程仍在运行时调用（必须先 `stop()`）。
    pub fn start_passive_read(&self) -> Result<(), DriverError> {
        self.start(LoopMode::PassiveRead)
    }

    fn start(&self, mode: LoopMode) -> Result<(), DriverError> {
        let mut control_thread = self.control_thread.lock();

        if self.ctx.is_loop_active() {
            let err = DriverError::InvalidStateTransition {
                from: self.mode.get(Ordering::Acquire),
                requested: mode,
            };
            error!("{}", err);
            panic!("{}", err);
        }

        // 上一个循环已经因错误退出，先回收线程
        if let Some(handle) = control_thread.take() {
            self.join_control_thread(handle);
        }

        self.ctx.commands.clear_stop();
        self.mode.set(mode, Ordering::Release);
        self.ctx.set_loop_active(true);

        let device = Arc::clone(&self.device);
        let ctx = Arc::clone(&self.ctx);
        let options = self.config.loop_options();
        let elevate_priority = self.config.elevate_thread_priority;

        let spawned = thread::Builder::new().name(self.config.thread_name.clone()).spawn(
            move || {
                control_thread_main(&*device, &ctx, mode, options, elevate_priority);
            },
        );

        match spawned {
            Ok(handle) => {
                *control_thread = Some(handle);
                self.ctx.metrics.sessions_started.fetch_add(1, Ordering::Relaxed);
                info!("Control session started: {}", mode);
                Ok(())
            },
            Err(e) => {
                self.ctx.set_loop_active(false);
                self.mode.set(LoopMode::Stopped, Ordering::Release);
                error!("Failed to spawn control thread: {}", e);
                Err(DriverError::ThreadSpawn(e))
            },
        }
    }

    /// 停止控制线程
    ///
    /// 设置终止标志并等待控制线程退出设备循环（最多一个 tick 周期）。
    /// 已停止时直接返回。
    pub fn stop(&self) {
        let mut control_thread = self.control_thread.lock();
        let Some(handle) = control_thread.take() else {
            return;
        };

        let mode = self.mode.get(Ordering::Acquire);
        self.ctx.commands.request_stop();
        self.join_control_thread(handle);
        self.ctx.commands.clear_stop();
        self.mode.set(LoopMode::Stopped, Ordering::Release);

        info!("Control session stopped (was {})", mode);
    }

    fn join_control_thread(&self, handle: JoinHandle<()>) {
        if handle.join().is_err() {
            error!("Control thread panicked");
            self.ctx.record_loop_error(DriverError::ControlThreadPanicked);
        }
    }

    /// 是否已停止
    ///
    /// 设备循环因错误退出后也返回 `true`。
    pub fn is_stopped(&self) -> bool {
        self.mode().is_stopped()
    }

    /// 当前生效的循环模式
    pub fn mode(&self) -> LoopMode {
        if self.ctx.is_loop_active() {
            self.mode.get(Ordering::Acquire)
        } else {
            LoopMode::Stopped
        }
    }

    /// 设置末端负载
    ///
    /// 持有指令锁期间转发给设备，负载修改不会与写到一半的指令交错。
    /// 可以在运行期间调用。
    ///
    /// # 错误
    /// - `DriverError::DeviceRejected`: 设备拒绝（参数无效，或设备不允许运动中修改）
    pub fn set_load(&self, load: &LoadParameters) -> Result<(), DriverError> {
        let _guard = self.ctx.commands.exclusive();

        match self.device.set_load(load) {
            Ok(()) => {
                self.ctx.metrics.loads_applied.fetch_add(1, Ordering::Relaxed);
                debug!("Load applied: mass={} kg", load.mass);
                Ok(())
            },
            Err(e) => {
                self.ctx.metrics.loads_rejected.fetch_add(1, Ordering::Relaxed);
                warn!("Load update failed: {}", e);
                Err(e.into())
            },
        }
    }

    /// 取走最近一次设备循环错误（每个错误只返回一次）
    pub fn take_loop_error(&self) -> Option<DriverError> {
        self.ctx.take_loop_error()
    }

    /// 获取性能指标快照
    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl<D: DeviceSession> Drop for ControlSession<D> {
    fn drop(&mut self) {
        // 控制线程不能比会话活得更久
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panda_device::SimulatedArm;
    use std::time::{Duration, Instant};

    fn fast_arm() -> SimulatedArm {
        SimulatedArm::builder().tick_period(Duration::from_micros(200)).build()
    }

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        condition()
    }

    #[test]
    fn test_fresh_session_is_stopped() {
        let session = ControlSession::new(fast_arm()).unwrap();
        assert!(session.is_stopped());
        assert_eq!(session.mode(), LoopMode::Stopped);
        assert_eq!(session.read(), ArmState::default());
        assert!(session.take_loop_error().is_none());
    }

    #[test]
    fn test_enforce_realtime_without_capability() {
        let arm = SimulatedArm::builder().realtime_capability(false).build();
        let config = SessionConfig {
            realtime: RealtimePolicy::Enforce,
            ..SessionConfig::default()
        };
        let result = ControlSession::with_config(arm, config);
        assert!(matches!(result, Err(DriverError::RealtimeUnavailable)));
    }

    #[test]
    fn test_auto_realtime_without_capability_continues() {
        let arm = SimulatedArm::builder().realtime_capability(false).build();
        assert!(ControlSession::new(arm).is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SessionConfig {
            cutoff_frequency_hz: -1.0,
            ..SessionConfig::default()
        };
        let result = ControlSession::with_config(fast_arm(), config);
        assert!(matches!(result, Err(DriverError::InvalidConfig(_))));
    }

    #[test]
    fn test_torque_control_lifecycle() {
        let arm = fast_arm();
        let probe = arm.clone();
        let session = ControlSession::new(arm).unwrap();

        session.start_torque_control().unwrap();
        assert!(!session.is_stopped());
        assert_eq!(session.mode(), LoopMode::TorqueControl);

        session.write(JointEfforts::splat(1.0));
        assert!(wait_until(Duration::from_secs(2), || {
            probe.last_emitted().map(|t| t.efforts) == Some(JointEfforts::splat(1.0))
        }));
        assert!(session.read().tick > 0);

        session.stop();
        assert!(session.is_stopped());
        assert_eq!(probe.active_loops(), 0);
        assert!(probe.last_emitted().unwrap().motion_finished);
    }

    #[test]
    fn test_passive_read_emits_no_commands() {
        let arm = fast_arm();
        let probe = arm.clone();
        let session = ControlSession::new(arm).unwrap();

        session.start_passive_read().unwrap();
        assert_eq!(session.mode(), LoopMode::PassiveRead);
        assert!(wait_until(Duration::from_secs(2), || session.read().tick >= 5));

        session.stop();
        assert!(session.is_stopped());
        assert_eq!(probe.commands_emitted(), 0);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let session = ControlSession::new(fast_arm()).unwrap();
        session.stop();

        session.start_passive_read().unwrap();
        session.stop();
        let started = Instant::now();
        session.stop();
        assert!(started.elapsed() < Duration::from_millis(50));
        assert!(session.is_stopped());
    }

    #[test]
    #[should_panic(expected = "Invalid state transition")]
    fn test_double_start_panics() {
        let session = ControlSession::new(fast_arm()).unwrap();
        session.start_torque_control().unwrap();
        let _ = session.start_passive_read();
    }

    #[test]
    fn test_restart_after_stop() {
        let arm = fast_arm();
        let probe = arm.clone();
        let session = ControlSession::new(arm).unwrap();

        session.start_passive_read().unwrap();
        session.stop();
        session.start_torque_control().unwrap();
        assert_eq!(session.mode(), LoopMode::TorqueControl);
        session.stop();

        assert_eq!(probe.max_active_loops(), 1);
        assert_eq!(session.metrics().sessions_started, 2);
    }

    #[test]
    fn test_loop_error_leaves_session_stopped() {
        let arm = fast_arm();
        arm.lose_connection_after(10);
        let session = ControlSession::new(arm).unwrap();

        session.start_torque_control().unwrap();
        assert!(wait_until(Duration::from_secs(2), || session.is_stopped()));

        let started = Instant::now();
        session.stop();
        assert!(started.elapsed() < Duration::from_millis(100));

        assert!(matches!(
            session.take_loop_error(),
            Some(DriverError::DeviceCommunicationLost(_))
        ));
        assert_eq!(session.metrics().loop_errors, 1);

        // 可以重新启动
        session.start_passive_read().unwrap();
        assert!(!session.is_stopped());
    }

    #[test]
    fn test_start_after_loop_error_without_stop() {
        let arm = fast_arm();
        arm.lose_connection_after(3);
        let session = ControlSession::new(arm).unwrap();

        session.start_passive_read().unwrap();
        assert!(wait_until(Duration::from_secs(2), || session.is_stopped()));

        // 死掉的线程在 start 中回收，不算非法转换
        session.start_torque_control().unwrap();
        assert_eq!(session.mode(), LoopMode::TorqueControl);
    }

    #[test]
    fn test_set_load_forwarded_and_rejected() {
        let arm = fast_arm();
        let probe = arm.clone();
        let session = ControlSession::new(arm).unwrap();

        let load = LoadParameters::with_diagonal_inertia(2.0, [0.0, 0.0, 0.1], 0.01);
        session.set_load(&load).unwrap();
        assert_eq!(probe.applied_loads(), vec![load]);

        let bad = LoadParameters::new(f64::NAN, [0.0; 3], [0.0; 9]);
        assert!(matches!(session.set_load(&bad), Err(DriverError::DeviceRejected(_))));

        let metrics = session.metrics();
        assert_eq!(metrics.loads_applied, 1);
        assert_eq!(metrics.loads_rejected, 1);
    }

    #[test]
    fn test_write_metrics() {
        let session = ControlSession::new(fast_arm()).unwrap();
        session.write(JointEfforts::splat(1.0));
        session.write(JointEfforts::splat(2.0));

        let metrics = session.metrics();
        assert_eq!(metrics.commands_written, 2);
        assert_eq!(metrics.command_overwrites, 1);
    }

    #[test]
    fn test_drop_joins_control_thread() {
        let arm = fast_arm();
        let probe = arm.clone();
        {
            let session = ControlSession::new(arm).unwrap();
            session.start_torque_control().unwrap();
            assert!(wait_until(Duration::from_secs(2), || probe.ticks_served() > 0));
        }
        assert_eq!(probe.active_loops(), 0);
    }

    #[test]
    fn test_control_thread_name() {
        let config = SessionConfig {
            thread_name: "arm-rt-test".to_string(),
            ..SessionConfig::default()
        };
        let session = ControlSession::with_config(fast_arm(), config).unwrap();
        assert_eq!(session.config().thread_name, "arm-rt-test");
        session.start_passive_read().unwrap();
        let name = session
            .control_thread
            .lock()
            .as_ref()
            .and_then(|h| h.thread().name().map(str::to_string));
        assert_eq!(name.as_deref(), Some("arm-rt-test"));
    }
}
