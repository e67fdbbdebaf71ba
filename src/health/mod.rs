//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! health_checks.conf
//!     → tasks.rs (address=command lines)
//!     → probe.rs (bounded fan-out, per-check timeout)
//!     → Vec<ProbeResult>
//!     → failover.rs (consecutive-failure counters)
//!     → Decisions { enable, disable }
//! ```
//!
//! # Design Decisions
//! - A check that cannot run or times out counts as unhealthy
//! - All results of a cycle are collected before any decision is made
//! - Counters live in memory only and restart from zero with the process

pub mod failover;
pub mod probe;
pub mod tasks;

pub use failover::{Decisions, FailureCounters};
pub use probe::{HealthCheck, ProbeExecutor, ProbeOutcome, ProbeResult, ScriptCheck};
pub use tasks::ProbeTask;
