//! 状态缓存
//!
//! 控制线程每个 tick 发布一次最新的 [`ArmState`]，任意线程读取快照。

use arc_swap::ArcSwap;
use panda_device::ArmState;
use std::sync::Arc;

/// 最近一次观测到的机械臂状态
///
/// 同步机制：ArcSwap（整帧替换，读者永远拿到完整的一帧）
///
/// # 性能
/// - `snapshot()` 无锁（Wait-Free），只拷贝一帧状态
/// - `update()` 不会被任何读者阻塞
#[derive(Debug)]
pub struct StateCache {
    current: ArcSwap<ArmState>,
}

impl StateCache {
    /// 创建状态缓存（初始为全零状态）
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(ArmState::default()),
        }
    }

    /// 发布新状态（仅由控制线程调用）
    #[inline]
    pub fn update(&self, state: ArmState) {
        self.current.store(Arc::new(state));
    }

    /// 获取最新状态的副本
    #[inline]
    pub fn snapshot(&self) -> ArmState {
        **self.current.load()
    }
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn state_at(tick: u64) -> ArmState {
        let value = tick as f64;
        ArmState {
            tick,
            timestamp_us: tick * 1000,
            joint_pos: [value; 7],
            joint_vel: [value; 7],
            joint_torque: [value; 7],
            joint_torque_desired: [value; 7],
            external_torque: [value; 7],
            external_wrench: [value; 6],
            command_success_rate: value,
        }
    }

    #[test]
    fn test_snapshot_before_update_is_default() {
        let cache = StateCache::new();
        assert_eq!(cache.snapshot(), ArmState::default());
    }

    #[test]
    fn test_update_replaces_state() {
        let cache = StateCache::new();
        cache.update(state_at(3));
        cache.update(state_at(4));
        assert_eq!(cache.snapshot(), state_at(4));
    }

    /// 并发读取时不会看到来自两个 tick 的混合字段
    #[test]
    fn test_snapshot_never_torn() {
        let cache = Arc::new(StateCache::new());
        let writer_cache = cache.clone();
        let writer = thread::spawn(move || {
            for tick in 1..=5_000 {
                writer_cache.update(state_at(tick));
            }
        });

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || {
                    let mut last_tick = 0;
                    for _ in 0..5_000 {
                        let state = cache.snapshot();
                        assert_eq!(state, state_at(state.tick), "torn state at tick {}", state.tick);
                        assert!(state.tick >= last_tick);
                        last_tick = state.tick;
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(cache.snapshot().tick, 5_000);
    }
}
