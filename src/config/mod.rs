//! Daemon settings subsystem.
//!
//! # Data Flow
//! ```text
//! built-in defaults
//!     → optional settings file (TOML, --settings)
//!     → environment overrides (REALM_CONFIG_FILE, HEALTH_CHECK_CRON, ...)
//!     → validation.rs (semantic checks, all errors at once)
//!     → DaemonConfig (immutable for the life of the process)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow no settings file at all
//! - Environment variable names match the relay's existing deployment
//! - Invalid settings are fatal at startup

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::DaemonConfig;
pub use validation::ValidationError;
