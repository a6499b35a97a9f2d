//! 设备层数据类型
//!
//! 每个 tick 在设备与控制线程之间交换的值类型。全部为 `Copy`，
//! 便于在短临界区内整体拷贝，避免读到撕裂（torn）的状态。

use std::fmt;

/// 关节（执行器）数量
pub const JOINT_COUNT: usize = 7;

/// 截止频率上限（Hz），同时也是默认值
pub const MAX_CUTOFF_FREQUENCY_HZ: f64 = 1000.0;

/// 关节力矩指令（每个执行器一个 effort，单位 N·m）
///
/// 长度由类型固定为 [`JOINT_COUNT`]，不存在元素数量不一致的指令。
/// 默认值为全零（"保持不动"），新启动的会话不会发送未初始化的数据。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JointEfforts([f64; JOINT_COUNT]);

impl JointEfforts {
    /// 全零指令
    pub const fn zero() -> Self {
        Self([0.0; JOINT_COUNT])
    }

    /// 所有关节使用相同的 effort
    pub const fn splat(value: f64) -> Self {
        Self([value; JOINT_COUNT])
    }

    pub const fn new(efforts: [f64; JOINT_COUNT]) -> Self {
        Self(efforts)
    }

    pub fn as_array(&self) -> &[f64; JOINT_COUNT] {
        &self.0
    }

    pub fn into_array(self) -> [f64; JOINT_COUNT] {
        self.0
    }

    /// 是否所有分量都是有限值
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

impl From<[f64; JOINT_COUNT]> for JointEfforts {
    fn from(efforts: [f64; JOINT_COUNT]) -> Self {
        Self(efforts)
    }
}

impl std::ops::Index<usize> for JointEfforts {
    type Output = f64;

    fn index(&self, joint: usize) -> &f64 {
        &self.0[joint]
    }
}

/// 机械臂状态快照（单个 tick）
///
/// 由设备每个 tick 产生一次。除了 `tick` 之外没有身份信息。
///
/// **注意**：`timestamp_us` 是设备时钟（相对时间），不能与系统时间直接比较。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArmState {
    /// 设备分配的 tick 序号（单调递增）
    pub tick: u64,
    /// 设备时间戳（微秒）
    pub timestamp_us: u64,
    /// 关节位置（rad）
    pub joint_pos: [f64; JOINT_COUNT],
    /// 关节速度（rad/s）
    pub joint_vel: [f64; JOINT_COUNT],
    /// 关节实测力矩（N·m）
    pub joint_torque: [f64; JOINT_COUNT],
    /// 上一个 tick 下发的期望力矩（N·m）
    pub joint_torque_desired: [f64; JOINT_COUNT],
    /// 外部力矩估计（N·m，已滤波）
    pub external_torque: [f64; JOINT_COUNT],
    /// 末端外力/力矩估计 [Fx, Fy, Fz, Tx, Ty, Tz]
    pub external_wrench: [f64; 6],
    /// 最近一段时间内指令成功送达的比例（0.0 - 1.0）
    pub command_success_rate: f64,
}

/// 力矩回调的单 tick 输出
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Torques {
    pub efforts: JointEfforts,
    /// 为 `true` 时设备在本 tick 之后结束控制循环
    pub motion_finished: bool,
}

impl Torques {
    pub fn new(efforts: JointEfforts) -> Self {
        Self {
            efforts,
            motion_finished: false,
        }
    }

    pub fn finished(mut self, motion_finished: bool) -> Self {
        self.motion_finished = motion_finished;
        self
    }
}

/// 力矩控制循环参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlLoopOptions {
    /// 是否启用设备侧的指令低通滤波
    pub filter_enabled: bool,
    /// 低通滤波截止频率（Hz）
    pub cutoff_frequency_hz: f64,
}

impl Default for ControlLoopOptions {
    fn default() -> Self {
        Self {
            filter_enabled: true,
            cutoff_frequency_hz: MAX_CUTOFF_FREQUENCY_HZ,
        }
    }
}

/// 末端负载参数
///
/// 只在一次 `set_load` 调用中使用，驱动层不保存。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoadParameters {
    /// 质量（kg）
    pub mass: f64,
    /// 质心（m，法兰坐标系）
    pub center_of_mass: [f64; 3],
    /// 惯量张量（kg·m²，3×3 行主序）
    pub inertia: [f64; 9],
}

/// 负载参数无效的原因
#[derive(Debug, Clone, PartialEq)]
pub enum LoadIssue {
    NegativeMass(f64),
    NonFinite(&'static str),
}

impl fmt::Display for LoadIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadIssue::NegativeMass(mass) => write!(f, "mass must be non-negative, got {mass}"),
            LoadIssue::NonFinite(field) => write!(f, "{field} contains non-finite values"),
        }
    }
}

impl LoadParameters {
    pub fn new(mass: f64, center_of_mass: [f64; 3], inertia: [f64; 9]) -> Self {
        Self {
            mass,
            center_of_mass,
            inertia,
        }
    }

    /// 无负载
    pub fn none() -> Self {
        Self::new(0.0, [0.0; 3], [0.0; 9])
    }

    /// 对角惯量（`diag * I`）
    pub fn with_diagonal_inertia(mass: f64, center_of_mass: [f64; 3], diag: f64) -> Self {
        let mut inertia = [0.0; 9];
        inertia[0] = diag;
        inertia[4] = diag;
        inertia[8] = diag;
        Self::new(mass, center_of_mass, inertia)
    }

    /// 检查参数是否可以交给设备
    pub fn check(&self) -> Result<(), LoadIssue> {
        if !self.mass.is_finite() {
            return Err(LoadIssue::NonFinite("mass"));
        }
        if self.mass < 0.0 {
            return Err(LoadIssue::NegativeMass(self.mass));
        }
        if !self.center_of_mass.iter().all(|v| v.is_finite()) {
            return Err(LoadIssue::NonFinite("center_of_mass"));
        }
        if !self.inertia.iter().all(|v| v.is_finite()) {
            return Err(LoadIssue::NonFinite("inertia"));
        }
        Ok(())
    }
}
