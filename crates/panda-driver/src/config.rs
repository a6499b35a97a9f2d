//! 会话配置
//!
//! 可以直接构造，也可以从 TOML 加载：
//!
//! ```toml
//! realtime = "auto"          # enforce / auto / ignore
//! filter_enabled = true
//! cutoff_frequency_hz = 1000.0
//! thread_name = "panda-control"
//! elevate_thread_priority = true
//! ```

use crate::error::DriverError;
use panda_device::{ControlLoopOptions, MAX_CUTOFF_FREQUENCY_HZ};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 设备不具备实时能力时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RealtimePolicy {
    /// 必须具备实时能力，否则创建会话失败
    Enforce,
    /// 不具备时记录警告并继续（默认）
    #[default]
    Auto,
    /// 不检查
    Ignore,
}

/// 控制会话配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub realtime: RealtimePolicy,
    /// 设备侧指令低通滤波
    pub filter_enabled: bool,
    /// 低通滤波截止频率（Hz），范围 (0, 1000]
    pub cutoff_frequency_hz: f64,
    /// 控制线程名称
    pub thread_name: String,
    /// 提升控制线程优先级（需要 `realtime` feature）
    pub elevate_thread_priority: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            realtime: RealtimePolicy::Auto,
            filter_enabled: true,
            cutoff_frequency_hz: MAX_CUTOFF_FREQUENCY_HZ,
            thread_name: "panda-control".to_string(),
            elevate_thread_priority: true,
        }
    }
}

impl SessionConfig {
    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, DriverError> {
        let config: SessionConfig =
            toml::from_str(content).map_err(|e| DriverError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件加载
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DriverError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), DriverError> {
        let cutoff = self.cutoff_frequency_hz;
        if !(cutoff.is_finite() && cutoff > 0.0 && cutoff <= MAX_CUTOFF_FREQUENCY_HZ) {
            return Err(DriverError::InvalidConfig(format!(
                "cutoff_frequency_hz must be in (0, {MAX_CUTOFF_FREQUENCY_HZ}], got {cutoff}"
            )));
        }
        if self.thread_name.is_empty() {
            return Err(DriverError::InvalidConfig(
                "thread_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// 力矩控制循环参数
    pub fn loop_options(&self) -> ControlLoopOptions {
        ControlLoopOptions {
            filter_enabled: self.filter_enabled,
            cutoff_frequency_hz: self.cutoff_frequency_hz,
        }
    }
}
