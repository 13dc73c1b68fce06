//! 局域网转发仿真
//!
//! 读取实验拓扑 JSON，按顺序注入流量，打印交换机 CAM 表与转发统计。

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use lansim_rs::lab::Lab;
use lansim_rs::sim::EventLog;
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(name = "lan_sim", about = "局域网转发仿真：交换机 MAC 学习 + 路由器静态路由")]
struct Args {
    /// 实验拓扑描述（JSON）
    #[arg(long)]
    lab: PathBuf,
    /// 输出拓扑快照（设备 + 连接）JSON
    #[arg(long)]
    export_json: Option<PathBuf>,
    /// 输出引擎事件 JSON
    #[arg(long)]
    events_json: Option<PathBuf>,
    /// 覆盖单次运行最多处理的事件数
    #[arg(long)]
    max_steps: Option<u64>,
    /// 流量处理完后逻辑时间再前进多少步并执行 CAM 老化
    #[arg(long)]
    age_ticks: Option<u64>,
}

fn main() -> ExitCode {
    // 初始化 tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut lab = match Lab::load(&args.lab) {
        Ok(lab) => lab,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };
    if let Some(max_steps) = args.max_steps {
        lab.engine.set_max_steps_per_run(max_steps);
    }

    let log = EventLog::new();
    lab.engine.subscribe(log.clone());

    let steps = match lab.run_traffic() {
        Ok(steps) => steps,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(1);
        }
    };

    if let Some(ticks) = args.age_ticks {
        let aged = lab.engine.advance(ticks);
        println!("aged {} cam entries", aged.len());
    }

    let net = lab.engine.network();
    for sw in net.registry.switches() {
        let Some(state) = sw.as_switch() else {
            continue;
        };
        for (mac, entry) in state.cam().entries() {
            println!("cam {} {} port={}", sw.name(), mac, entry.port.0);
        }
    }

    let stats = lab.engine.stats;
    println!(
        "done @ tick {}, steps={}, sent={}, delivered={}, dropped={}, flooded={}",
        lab.engine.now().0,
        steps,
        stats.sent_frames,
        stats.delivered_frames,
        stats.dropped_frames,
        stats.flooded_frames
    );

    if let Some(path) = &args.export_json {
        if let Err(e) = write_json(path, &lab.engine.network().snapshot()) {
            eprintln!("error: write {}: {e}", path.display());
            return ExitCode::from(1);
        }
        eprintln!("wrote topology snapshot to {}", path.display());
    }

    if let Some(path) = &args.events_json {
        if let Err(e) = write_json(path, &log.events()) {
            eprintln!("error: write {}: {e}", path.display());
            return ExitCode::from(1);
        }
        eprintln!("wrote engine events to {}", path.display());
    }

    ExitCode::SUCCESS
}

fn write_json(path: &Path, value: &impl Serialize) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)
}
