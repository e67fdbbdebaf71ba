//! relay-failover daemon.
//!
//! ```text
//!   health_checks.conf          config.toml / state.backup.json
//!          │                               ▲
//!          ▼                               │
//!   ┌────────────┐   ┌────────────┐   ┌────────────┐   ┌────────────┐
//!   │   probe    │──▶│  failover  │──▶│  mutation  │──▶│ validate + │──▶ relay
//!   │  executor  │   │  counters  │   │   engine   │   │   reload   │
//!   └────────────┘   └────────────┘   └────────────┘   └────────────┘
//!          ▲
//!          └──── cycle controller (one iteration per scheduled tick)
//! ```

use std::path::PathBuf;

use clap::Parser;

use relay_failover::config::load_config;
use relay_failover::lifecycle::{build_controller, preflight, signals, Shutdown};
use relay_failover::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "relay-failover")]
#[command(about = "Self-healing failover daemon for relay routing rules", long_about = None)]
struct Cli {
    /// Optional TOML settings file; environment variables override it.
    #[arg(short, long)]
    settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(logging::DEFAULT_FILTER);

    tracing::info!("relay-failover v{} starting", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.settings.as_deref())?;
    tracing::info!(
        routing_config = %config.paths.routing_config.display(),
        health_checks = %config.paths.health_checks.display(),
        state_file = %config.paths.state_file.display(),
        schedule = %config.schedule.expression,
        "Configuration loaded"
    );

    if let Some(addr) = config.observability.metrics_address {
        metrics::init_metrics(addr);
    }

    preflight(&config)?;
    let controller = build_controller(&config)?;

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    signals::spawn_listener(shutdown.clone());

    controller.run(stop).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
