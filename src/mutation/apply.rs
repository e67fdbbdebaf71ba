//! Read-mutate-write around the mutation engine.
//!
//! Both the daemon and the manual `disable`/`enable` command go through
//! here: read the routing config and failover state fresh, apply every
//! action in order, and write both back only if something changed.
//!
//! The config is written first, then the state. If the state write fails
//! the config text read at the start is put back, so a rule never leaves
//! the config without its backup reaching disk.

use std::path::Path;

use thiserror::Error;

use crate::mutation::{engine, Action};
use crate::observability::metrics;
use crate::persist::write_atomic;
use crate::routing::{self, serialize, RoutingError};
use crate::state::{StateError, StateStore};

/// Errors that abort a mutation before anything is written.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    State(#[from] StateError),
}

/// What a plan did to the files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedPlan {
    /// Whether the routing config (and state) were rewritten.
    pub changed: bool,
    /// Addresses recorded as disabled after the plan ran.
    pub disabled_upstreams: usize,
}

/// Apply `plan` to the config at `config_path` and the state in `store`.
pub fn apply_plan(
    config_path: &Path,
    store: &StateStore,
    plan: &[(Action, String)],
) -> Result<AppliedPlan, MutationError> {
    let (original, mut config) = routing::read(config_path)?;
    let mut state = store.load();

    let mut changed = false;
    for (action, address) in plan {
        let step = match action {
            Action::Enable => engine::enable(&mut config, &mut state, address),
            Action::Disable => engine::disable(&mut config, &mut state, address),
        };
        if step {
            tracing::info!(action = %action, address = %address, "Routing configuration updated");
            metrics::record_mutation(*action);
        }
        changed |= step;
    }

    if changed {
        let text = serialize(&config);
        write_atomic(config_path, text.as_bytes()).map_err(|source| MutationError::Write {
            path: config_path.display().to_string(),
            source,
        })?;
        if let Err(e) = store.save(&state) {
            restore_config(config_path, &original);
            return Err(e.into());
        }
        tracing::info!(
            config = %config_path.display(),
            state = %store.path().display(),
            "Saved modified configuration and state files"
        );
    }

    Ok(AppliedPlan {
        changed,
        disabled_upstreams: state.len(),
    })
}

fn restore_config(config_path: &Path, original: &str) {
    match write_atomic(config_path, original.as_bytes()) {
        Ok(()) => tracing::warn!(
            config = %config_path.display(),
            "State write failed, routing configuration restored"
        ),
        Err(e) => tracing::error!(
            config = %config_path.display(),
            error = %e,
            "State write failed and the routing configuration could not be restored"
        ),
    }
}

/// Apply a single action, as the manual command does.
pub fn apply_action(
    config_path: &Path,
    state_path: &Path,
    action: Action,
    address: &str,
) -> Result<bool, MutationError> {
    let store = StateStore::new(state_path);
    let applied = apply_plan(config_path, &store, &[(action, address.to_string())])?;
    Ok(applied.changed)
}
