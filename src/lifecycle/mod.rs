//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load settings → preflight (config parses, state parses) → build controller
//!
//! Cycle (controller.rs, once per tick from schedule.rs):
//!     tasks → probe → decide → mutate → validate → reload (collaborators.rs)
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger (shutdown.rs) → loop stops between cycles
//! ```
//!
//! # Design Decisions
//! - Only startup checks are fatal; cycle errors are logged and retried
//! - Validation and reload sit behind traits for testing
//! - Period and check timeout are derived once from the schedule

pub mod collaborators;
pub mod controller;
pub mod schedule;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use collaborators::{
    CommandReloader, CommandValidator, ConfigValidator, LintValidator, ReloadError, ServiceReloader,
    ValidationFailure,
};
pub use controller::{CycleController, CycleError, CycleId, CycleReport, SkipReason};
pub use schedule::{CycleTiming, ScheduleError, TickSchedule};
pub use shutdown::Shutdown;
pub use startup::{build_controller, preflight, StartupError};
