//! 仿真机械臂（`mock` feature）
//!
//! 无硬件依赖的 [`DeviceSession`] 实现，用于测试和演示：
//! - 按固定周期产生 tick（`spin_sleep` 提供亚毫秒级精度）
//! - 简单的双积分模型：`vel += effort * dt`，`pos += vel * dt`
//! - 记录下发的指令、并发循环数、负载设置和总通信量
//! - 故障注入：通信中断、运动中拒绝负载
//!
//! `SimulatedArm` 的克隆共享同一台仿真机械臂，测试中可以保留一个克隆作为探针。

use crate::{
    ArmState, ControlCallback, ControlLoopOptions, DeviceError, DeviceSession, JOINT_COUNT,
    LoadParameters, ReadCallback, Torques,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

/// 默认 tick 周期（1kHz）
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(1);

const NEVER: u64 = u64::MAX;

/// 仿真机械臂
#[derive(Clone)]
pub struct SimulatedArm {
    inner: Arc<SimInner>,
}

struct SimInner {
    tick_period: Duration,
    realtime: bool,
    set_load_delay: Duration,
    model: Mutex<ArmModel>,
    /// 已服务的 tick 总数（设备通信量）
    ticks_served: AtomicU64,
    commands_emitted: AtomicU64,
    last_emitted: Mutex<Option<Torques>>,
    active_loops: AtomicUsize,
    max_active_loops: AtomicUsize,
    /// 到达此 tick 数时模拟通信中断（`NEVER` 表示不中断）
    loss_at_tick: AtomicU64,
    reject_loads_during_motion: AtomicBool,
    loads: Mutex<Vec<LoadParameters>>,
}

#[derive(Default)]
struct ArmModel {
    joint_pos: [f64; JOINT_COUNT],
    joint_vel: [f64; JOINT_COUNT],
    joint_torque: [f64; JOINT_COUNT],
    joint_torque_desired: [f64; JOINT_COUNT],
}

/// 记录当前正在运行的循环数，Drop 时自动减一
struct ActiveLoop<'a>(&'a SimInner);

impl Drop for ActiveLoop<'_> {
    fn drop(&mut self) {
        self.0.active_loops.fetch_sub(1, Ordering::AcqRel);
    }
}

impl SimulatedArm {
    pub fn new() -> Self {
        SimulatedArmBuilder::default().build()
    }

    pub fn builder() -> SimulatedArmBuilder {
        SimulatedArmBuilder::default()
    }

    /// 再服务 `ticks` 个 tick 之后，正在运行的循环以 `CommunicationLost` 退出
    pub fn lose_connection_after(&self, ticks: u64) {
        let now = self.inner.ticks_served.load(Ordering::Acquire);
        self.inner.loss_at_tick.store(now.saturating_add(ticks), Ordering::Release);
    }

    /// 循环运行期间是否拒绝 `set_load`
    pub fn reject_loads_during_motion(&self, reject: bool) {
        self.inner.reject_loads_during_motion.store(reject, Ordering::Release);
    }

    /// 已服务的 tick 总数
    pub fn ticks_served(&self) -> u64 {
        self.inner.ticks_served.load(Ordering::Acquire)
    }

    /// 力矩循环中下发的指令总数
    pub fn commands_emitted(&self) -> u64 {
        self.inner.commands_emitted.load(Ordering::Acquire)
    }

    /// 最近一次下发的指令
    pub fn last_emitted(&self) -> Option<Torques> {
        *self.inner.last_emitted.lock()
    }

    /// 当前正在运行的循环数
    pub fn active_loops(&self) -> usize {
        self.inner.active_loops.load(Ordering::Acquire)
    }

    /// 曾经同时运行的最大循环数
    pub fn max_active_loops(&self) -> usize {
        self.inner.max_active_loops.load(Ordering::Acquire)
    }

    /// 已成功应用的负载
    pub fn applied_loads(&self) -> Vec<LoadParameters> {
        self.inner.loads.lock().clone()
    }

    pub fn tick_period(&self) -> Duration {
        self.inner.tick_period
    }
}

impl Default for SimulatedArm {
    fn default() -> Self {
        Self::new()
    }
}

/// `SimulatedArm` 构造器
#[derive(Debug, Clone)]
pub struct SimulatedArmBuilder {
    tick_period: Duration,
    realtime: bool,
    set_load_delay: Duration,
}

impl Default for SimulatedArmBuilder {
    fn default() -> Self {
        Self {
            tick_period: DEFAULT_TICK_PERIOD,
            realtime: true,
            set_load_delay: Duration::ZERO,
        }
    }
}

impl SimulatedArmBuilder {
    pub fn tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    pub fn realtime_capability(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// 每次 `set_load` 在设备内部耗时（用于放大并发窗口）
    pub fn set_load_delay(mut self, delay: Duration) -> Self {
        self.set_load_delay = delay;
        self
    }

    pub fn build(self) -> SimulatedArm {
        SimulatedArm {
            inner: Arc::new(SimInner {
                tick_period: self.tick_period,
                realtime: self.realtime,
                set_load_delay: self.set_load_delay,
                model: Mutex::new(ArmModel::default()),
                ticks_served: AtomicU64::new(0),
                commands_emitted: AtomicU64::new(0),
                last_emitted: Mutex::new(None),
                active_loops: AtomicUsize::new(0),
                max_active_loops: AtomicUsize::new(0),
                loss_at_tick: AtomicU64::new(NEVER),
                reject_loads_during_motion: AtomicBool::new(false),
                loads: Mutex::new(Vec::new()),
            }),
        }
    }
}

impl SimInner {
    fn enter_loop(&self) -> ActiveLoop<'_> {
        let active = self.active_loops.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_active_loops.fetch_max(active, Ordering::AcqRel);
        ActiveLoop(self)
    }

    /// 产生本 tick 的状态；到达中断点时返回错误
    fn observe(&self) -> Result<ArmState, DeviceError> {
        let served = self.ticks_served.load(Ordering::Acquire);
        if served >= self.loss_at_tick.load(Ordering::Acquire) {
            self.loss_at_tick.store(NEVER, Ordering::Release);
            return Err(DeviceError::CommunicationLost(format!(
                "no response from arm after tick {served}"
            )));
        }

        let tick = self.ticks_served.fetch_add(1, Ordering::AcqRel) + 1;
        let model = self.model.lock();
        Ok(ArmState {
            tick,
            timestamp_us: tick * self.tick_period.as_micros() as u64,
            joint_pos: model.joint_pos,
            joint_vel: model.joint_vel,
            joint_torque: model.joint_torque,
            joint_torque_desired: model.joint_torque_desired,
            external_torque: [0.0; JOINT_COUNT],
            external_wrench: [0.0; 6],
            command_success_rate: 1.0,
        })
    }

    fn apply(&self, torques: &Torques, options: ControlLoopOptions) {
        let dt = self.tick_period.as_secs_f64();
        let alpha = if options.filter_enabled {
            let wc = dt * 2.0 * std::f64::consts::PI * options.cutoff_frequency_hz;
            wc / (wc + 1.0)
        } else {
            1.0
        };

        let mut model = self.model.lock();
        let efforts = torques.efforts.as_array();
        for joint in 0..JOINT_COUNT {
            let filtered = alpha * efforts[joint] + (1.0 - alpha) * model.joint_torque[joint];
            model.joint_torque_desired[joint] = efforts[joint];
            model.joint_torque[joint] = filtered;
            model.joint_vel[joint] += filtered * dt;
            model.joint_pos[joint] += model.joint_vel[joint] * dt;
        }
        drop(model);

        *self.last_emitted.lock() = Some(*torques);
        self.commands_emitted.fetch_add(1, Ordering::AcqRel);
    }
}

impl DeviceSession for SimulatedArm {
    fn has_realtime_capability(&self) -> bool {
        self.inner.realtime
    }

    fn run_control_loop(
        &self,
        callback: &mut ControlCallback<'_>,
        options: ControlLoopOptions,
    ) -> Result<(), DeviceError> {
        let inner = &*self.inner;
        let _active = inner.enter_loop();
        debug!("Simulated arm: control loop started ({:?})", options);

        let mut period = Duration::ZERO;
        loop {
            let state = inner.observe()?;
            let torques = callback(&state, period);
            inner.apply(&torques, options);
            if torques.motion_finished {
                debug!("Simulated arm: motion finished at tick {}", state.tick);
                return Ok(());
            }
            spin_sleep::sleep(inner.tick_period);
            period = inner.tick_period;
        }
    }

    fn run_read_loop(&self, callback: &mut ReadCallback<'_>) -> Result<(), DeviceError> {
        let inner = &*self.inner;
        let _active = inner.enter_loop();
        debug!("Simulated arm: read loop started");

        loop {
            let state = inner.observe()?;
            if !callback(&state) {
                debug!("Simulated arm: read loop finished at tick {}", state.tick);
                return Ok(());
            }
            spin_sleep::sleep(inner.tick_period);
        }
    }

    fn set_load(&self, load: &LoadParameters) -> Result<(), DeviceError> {
        let inner = &*self.inner;
        if !inner.set_load_delay.is_zero() {
            spin_sleep::sleep(inner.set_load_delay);
        }

        load.check().map_err(|issue| DeviceError::Rejected(issue.to_string()))?;

        if inner.reject_loads_during_motion.load(Ordering::Acquire)
            && inner.active_loops.load(Ordering::Acquire) > 0
        {
            return Err(DeviceError::Rejected(
                "load cannot be changed while motion is running".to_string(),
            ));
        }

        trace!("Simulated arm: load set to {:?}", load);
        inner.loads.lock().push(*load);
        Ok(())
    }
}
