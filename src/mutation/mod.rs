//! Routing table mutation subsystem.
//!
//! # Data Flow
//! ```text
//! Decisions (enable first, then disable)
//!     → apply.rs reads config.toml + state file fresh
//!     → engine.rs disable(): back up rule text, drop upstream, rebalance weights
//!     → engine.rs enable(): replace rebalanced rules with their backups
//!     → apply.rs writes both files only if something changed
//! ```
//!
//! # Design Decisions
//! - Backups are serialized rule text, restored by re-parsing it
//! - A weight/upstream count mismatch leaves that rule untouched
//! - Restored rules are appended, not returned to their original position
//! - A backup that cannot be decoded blocks the whole enable for that address
//! - The config is put back if the state write fails
//! - No locking: one daemon (or one manual command) per file pair

pub mod apply;
pub mod engine;

use std::fmt;

pub use apply::{apply_action, apply_plan, AppliedPlan, MutationError};
pub use engine::{disable, enable};

/// Direction of a routing change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Disable,
    Enable,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Disable => "disable",
            Action::Enable => "enable",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
