//! mrpd - MRP registration daemon entry point.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use mrpd::config::DaemonConfig;
use mrpd::build_engine;

#[derive(Parser, Debug)]
#[command(name = "mrpd", about = "MVRP/GVRP registration daemon", version)]
struct Args {
    /// Configuration file (JSON). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log verbosity (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: Level,
}

fn init_logging(level: Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_level);

    info!("--- Starting mrpd ---");

    let config = match &args.config {
        Some(path) => DaemonConfig::load(path)?,
        None => DaemonConfig::default(),
    };
    let (engine, _vlan_table) = build_engine(&config)?;

    // One timer task drives the engine, sleeping exactly as long as the
    // engine asks for; receive-path and management integration hook in via
    // the engine handle.
    let idle = Duration::from_millis(config.tick_interval_ms);
    let mut last_tick = Instant::now();
    let mut sleep_for = idle;

    info!("mrpd initialization complete");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {
                let elapsed = last_tick.elapsed().as_millis() as u32;
                last_tick = Instant::now();
                let next = engine.tick(elapsed);
                sleep_for = if next == 0 {
                    idle
                } else {
                    Duration::from_millis(u64::from(next)).min(idle)
                };
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }

    for protocol in [mrp_core::Protocol::Mvrp, mrp_core::Protocol::Gvrp] {
        if engine.global_status(protocol) {
            engine.global_enable(protocol, false)?;
        }
    }
    info!("mrpd stopped");
    Ok(())
}
