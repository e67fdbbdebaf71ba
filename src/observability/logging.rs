//! Structured logging.
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the built-in default filter
//! - The daemon logs to stdout for the journal; the CLI logs to stderr so
//!   its stdout stays machine-readable

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "relay_failover=info";

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into())
}

/// Install the global subscriber writing to stdout.
pub fn init(default: &str) {
    tracing_subscriber::registry()
        .with(filter(default))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Install the global subscriber writing to stderr.
pub fn init_stderr(default: &str) {
    tracing_subscriber::registry()
        .with(filter(default))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
