//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events, one `cycle` span per cycle)
//!     → metrics.rs (probe/cycle/mutation counters, disabled gauge)
//!
//! Consumers:
//!     → journald via stdout (daemon) or stderr (CLI)
//!     → optional Prometheus scrape endpoint
//! ```

pub mod logging;
pub mod metrics;
