//! 被动监控示例
//!
//! 以被动读取模式运行控制线程：只接收状态，不下发任何指令。
//! 适合在其他控制器接管机械臂时旁路监控。
//!
//! # 使用说明
//!
//! ```bash
//! RUST_LOG=panda_driver=debug cargo run -p panda-sdk --example passive_monitor --features mock
//! ```

use panda_sdk::device::SimulatedArm;
use panda_sdk::prelude::*;
use std::thread;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    panda_sdk::init_logging();

    let session = ControlSession::new(SimulatedArm::new())?;
    session.start_passive_read()?;
    println!("✅ 被动读取已启动 ({})", session.mode());

    for _ in 0..10 {
        thread::sleep(Duration::from_millis(200));
        let state = session.read();
        println!(
            "tick {:>5} | t = {:>8} us | success rate = {:.2}",
            state.tick, state.timestamp_us, state.command_success_rate,
        );
    }

    session.stop();
    if let Some(err) = session.take_loop_error() {
        return Err(err.into());
    }

    println!("✅ 已停止，共 {} ticks", session.metrics().ticks_total);
    Ok(())
}
