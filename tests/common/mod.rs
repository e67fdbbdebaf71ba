//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use relay_failover::health::{HealthCheck, ProbeOutcome, ProbeTask};
use relay_failover::lifecycle::{
    ConfigValidator, CycleController, ReloadError, ServiceReloader, ValidationFailure,
};
use relay_failover::{BoxFuture, DaemonConfig};

/// Health check whose answers the test sets per address. Unknown addresses are healthy.
#[derive(Default)]
pub struct ScriptedCheck {
    outcomes: Mutex<HashMap<String, ProbeOutcome>>,
}

impl ScriptedCheck {
    pub fn set(&self, address: &str, outcome: ProbeOutcome) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(address.to_string(), outcome);
    }
}

impl HealthCheck for ScriptedCheck {
    fn check<'a>(&'a self, task: &'a ProbeTask) -> BoxFuture<'a, ProbeOutcome> {
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .get(&task.address)
            .copied()
            .unwrap_or(ProbeOutcome::Healthy);
        Box::pin(async move { outcome })
    }
}

/// Validator that counts calls and passes unless told otherwise.
#[derive(Clone, Default)]
pub struct RecordingValidator {
    calls: Arc<AtomicUsize>,
    reject: Arc<AtomicBool>,
}

impl RecordingValidator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }
}

impl ConfigValidator for RecordingValidator {
    fn validate<'a>(&'a self, _config_path: &'a Path) -> BoxFuture<'a, Result<(), ValidationFailure>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.reject.load(Ordering::SeqCst) {
                Err(ValidationFailure::Rejected {
                    problems: vec!["rejected by test".into()],
                })
            } else {
                Ok(())
            }
        })
    }
}

/// Reloader that only counts calls.
#[derive(Clone, Default)]
pub struct RecordingReloader {
    calls: Arc<AtomicUsize>,
}

impl RecordingReloader {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ServiceReloader for RecordingReloader {
    fn reload(&self) -> BoxFuture<'_, Result<(), ReloadError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// Temporary directory holding a routing config, task list and state file.
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub config: DaemonConfig,
    pub check: Arc<ScriptedCheck>,
    pub validator: RecordingValidator,
    pub reloader: RecordingReloader,
}

impl Fixture {
    pub fn new(routing: &str, tasks: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DaemonConfig::default();
        config.paths.routing_config = dir.path().join("config.toml");
        config.paths.health_checks = dir.path().join("health_checks.conf");
        config.paths.state_file = dir.path().join("state.backup.json");
        config.schedule.min_cycle_secs = 1;

        fs::write(&config.paths.routing_config, routing).unwrap();
        fs::write(&config.paths.health_checks, tasks).unwrap();

        Self {
            dir,
            config,
            check: Arc::new(ScriptedCheck::default()),
            validator: RecordingValidator::default(),
            reloader: RecordingReloader::default(),
        }
    }

    pub fn controller(&self) -> CycleController {
        CycleController::new(
            &self.config,
            self.check.clone(),
            Box::new(self.validator.clone()),
            Box::new(self.reloader.clone()),
        )
        .unwrap()
    }

    pub fn routing_path(&self) -> &Path {
        &self.config.paths.routing_config
    }

    pub fn state_path(&self) -> &Path {
        &self.config.paths.state_file
    }

    pub fn routing_text(&self) -> String {
        fs::read_to_string(self.routing_path()).unwrap()
    }

    pub fn state_text(&self) -> String {
        fs::read_to_string(self.state_path()).unwrap_or_default()
    }
}
