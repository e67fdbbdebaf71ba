//! Self-healing failover for a TCP/UDP relay's routing table.
//!
//! Probes every configured upstream on a schedule, removes upstreams that
//! keep failing from the relay's `[[endpoints]]` rules (rebalancing weighted
//! groups), and restores the exact original rules once they recover.

// Routing table and its persisted failover state
pub mod routing;
pub mod state;
pub mod persist;

// Health checking and the disable/enable engine
pub mod health;
pub mod mutation;

// Daemon plumbing
pub mod config;
pub mod lifecycle;
pub mod observability;

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by the object-safe collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use config::schema::DaemonConfig;
pub use lifecycle::{CycleController, Shutdown};
pub use routing::{RoutingConfig, RoutingRule};
pub use state::{FailoverState, StateStore};
