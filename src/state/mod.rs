//! Persisted failover state.
//!
//! # Data Flow
//! ```text
//! state.backup.json
//!     → store.rs (load whole map; lenient after startup)
//!     → FailoverState (address → displaced rule backups)
//!     → mutation engine adds/removes entries
//!     → store.rs (save whole map via temp + rename)
//! ```
//!
//! # Design Decisions
//! - An address is a key exactly while it is disabled
//! - Backups hold rule text, not live structures, so restores are byte-exact
//! - No partial updates: load, mutate in memory, save

pub mod store;

pub use store::{BackupEntry, FailoverState, StateError, StateStore};
