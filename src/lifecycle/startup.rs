//! Startup orchestration.
//!
//! # Responsibilities
//! - Check that the routing config exists and parses
//! - Check that an existing state file parses
//! - Wire the production collaborators into a controller
//!
//! # Design Decisions
//! - Fail fast: these are the only errors that stop the daemon
//! - Missing or blank state file is an empty state, not an error

use std::sync::Arc;

use thiserror::Error;

use crate::config::schema::DaemonConfig;
use crate::health::ScriptCheck;
use crate::lifecycle::collaborators::{CommandReloader, CommandValidator, ConfigValidator, LintValidator};
use crate::lifecycle::controller::CycleController;
use crate::lifecycle::schedule::ScheduleError;
use crate::routing::{self, RoutingError};
use crate::state::{StateError, StateStore};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("routing config check failed: {0}")]
    Routing(#[from] RoutingError),

    #[error("state file check failed: {0}")]
    State(#[from] StateError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// Verify the files the daemon will rewrite before the first cycle.
pub fn preflight(config: &DaemonConfig) -> Result<(), StartupError> {
    let routing = routing::load(&config.paths.routing_config)?;
    let state = StateStore::new(config.paths.state_file.clone()).load_strict()?;

    tracing::info!(
        config = %config.paths.routing_config.display(),
        rules = routing.rules.len(),
        upstreams = routing.upstreams().len(),
        disabled = state.len(),
        "Startup checks passed"
    );
    Ok(())
}

/// Build the controller with the script checker and command collaborators.
pub fn build_controller(config: &DaemonConfig) -> Result<CycleController, StartupError> {
    let validator: Box<dyn ConfigValidator> = match &config.collaborators.validate_command {
        Some(argv) => Box::new(CommandValidator::new(argv.clone())),
        None => Box::new(LintValidator),
    };
    let reloader = CommandReloader::new(config.collaborators.reload_command.clone());

    let controller = CycleController::new(config, Arc::new(ScriptCheck), validator, Box::new(reloader))?;
    Ok(controller)
}
