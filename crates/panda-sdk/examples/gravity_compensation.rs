//! 重力补偿示例
//!
//! 启动力矩控制，主机线程每个周期写入零力矩（设备侧已补偿重力），
//! 机械臂保持"悬浮"状态，可以被手动推动。
//!
//! # 使用说明
//!
//! ```bash
//! cargo run -p panda-sdk --example gravity_compensation --features mock
//! cargo run -p panda-sdk --example gravity_compensation --features mock -- session.toml
//! ```

use panda_sdk::device::SimulatedArm;
use panda_sdk::prelude::*;
use std::thread;
use std::time::{Duration, Instant};

const RUN_DURATION: Duration = Duration::from_secs(3);
const HOST_PERIOD: Duration = Duration::from_millis(1);
const PRINT_INTERVAL: Duration = Duration::from_millis(500);

fn main() -> anyhow::Result<()> {
    panda_sdk::init_logging();

    let config = match std::env::args().nth(1) {
        Some(path) => SessionConfig::from_file(&path)?,
        None => SessionConfig::default(),
    };

    println!("════════════════════════════════════════");
    println!("       重力补偿示例");
    println!("════════════════════════════════════════");
    println!();

    let session = ControlSession::with_config(SimulatedArm::new(), config)?;
    session.set_load(&LoadParameters::none())?;

    println!("⏳ 启动力矩控制...");
    session.start_torque_control()?;
    println!("✅ 已启动 ({})", session.mode());
    println!();

    let started = Instant::now();
    let mut last_print = Instant::now();
    while started.elapsed() < RUN_DURATION {
        let state = session.read();
        session.write(JointEfforts::zero());

        if last_print.elapsed() >= PRINT_INTERVAL {
            last_print = Instant::now();
            println!(
                "tick {:>6} | q = {:?} | tau_ext = {:?}",
                state.tick,
                round3(&state.joint_pos),
                round3(&state.external_torque),
            );
        }

        if session.is_stopped() {
            break;
        }
        thread::sleep(HOST_PERIOD);
    }

    session.stop();

    if let Some(err) = session.take_loop_error() {
        println!("❌ 控制循环异常退出: {}", err);
        return Err(err.into());
    }

    let metrics = session.metrics();
    println!();
    println!("✅ 已停止");
    println!("   ticks:           {}", metrics.ticks_total);
    println!("   commands:        {}", metrics.commands_written);
    println!("   overwrite rate:  {:.1}%", metrics.overwrite_rate());
    Ok(())
}

fn round3(values: &[f64; JOINT_COUNT]) -> [f64; JOINT_COUNT] {
    values.map(|v| (v * 1000.0).round() / 1000.0)
}
