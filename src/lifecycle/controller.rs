//! Cycle controller.
//!
//! # State Machine (one iteration per tick)
//! ```text
//! WAIT_FOR_TICK → LOAD_TASKS → PROBE → DECIDE → MUTATE → VALIDATE → RELOAD
//!       ↑                                  │ nothing to do              │
//!       └──────────────────────────────────┴────────────────────────────┘
//! ```
//!
//! # Design Decisions
//! - The controller owns the failure counters; nothing else mutates them
//! - Any error ends the iteration, is logged, and is followed by a fixed
//!   backoff; the loop itself never returns an error
//! - Shutdown is only observed between iterations, so a cycle that has
//!   started always finishes its writes

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time;
use tracing::Instrument;

use crate::config::schema::DaemonConfig;
use crate::health::tasks::load_task_list;
use crate::health::{Decisions, FailureCounters, HealthCheck, ProbeExecutor};
use crate::lifecycle::collaborators::{ConfigValidator, ServiceReloader};
use crate::lifecycle::schedule::{CycleTiming, ScheduleError, TickSchedule};
use crate::mutation::{apply_plan, MutationError};
use crate::observability::metrics;
use crate::routing::{self, RoutingError};
use crate::state::StateStore;

/// Global counter for cycle IDs.
static CYCLE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifier attached to every log line of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CycleId(u64);

impl CycleId {
    pub fn new() -> Self {
        Self(CYCLE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for CycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CycleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cycle-{}", self.0)
    }
}

/// Errors that abort a single cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("failed to read task list {path}: {source}")]
    TaskList {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Mutation(#[from] MutationError),
}

impl CycleError {
    fn label(&self) -> &'static str {
        match self {
            CycleError::TaskList { .. } => "task_list_error",
            CycleError::Routing(_) => "routing_error",
            CycleError::Mutation(_) => "mutation_error",
        }
    }
}

/// Why a cycle ended before probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingTaskList,
    EmptyTaskList,
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub skipped: Option<SkipReason>,
    pub probed: usize,
    pub failed: usize,
    pub decisions: Decisions,
    pub config_changed: bool,
    pub validated: bool,
    pub reloaded: bool,
}

impl CycleReport {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    fn label(&self) -> &'static str {
        match (self.skipped, self.config_changed, self.validated, self.reloaded) {
            (Some(_), ..) => "skipped",
            (None, false, ..) => "unchanged",
            (None, true, false, _) => "validation_failed",
            (None, true, true, false) => "reload_failed",
            (None, true, true, true) => "reloaded",
        }
    }
}

/// Owns everything that lives across cycles.
pub struct CycleController {
    schedule: TickSchedule,
    timing: CycleTiming,
    min_period: Duration,
    error_backoff: Duration,
    routing_config: PathBuf,
    health_checks: PathBuf,
    store: StateStore,
    executor: ProbeExecutor,
    counters: FailureCounters,
    validator: Box<dyn ConfigValidator>,
    reloader: Box<dyn ServiceReloader>,
}

impl CycleController {
    /// Build a controller; period and check timeout are fixed here.
    pub fn new(
        config: &DaemonConfig,
        checker: Arc<dyn HealthCheck>,
        validator: Box<dyn ConfigValidator>,
        reloader: Box<dyn ServiceReloader>,
    ) -> Result<Self, ScheduleError> {
        let schedule: TickSchedule = config.schedule.expression.parse()?;
        let min_period = Duration::from_secs(config.schedule.min_cycle_secs);
        let timing = CycleTiming::derive(&schedule, SystemTime::now(), min_period);

        Ok(Self {
            schedule,
            timing,
            min_period,
            error_backoff: Duration::from_secs(config.schedule.error_backoff_secs),
            routing_config: config.paths.routing_config.clone(),
            health_checks: config.paths.health_checks.clone(),
            store: StateStore::new(config.paths.state_file.clone()),
            executor: ProbeExecutor::new(
                checker,
                config.failover.concurrent_checks,
                timing.check_timeout,
            ),
            counters: FailureCounters::new(config.failover.failures_to_disable),
            validator,
            reloader,
        })
    }

    pub fn timing(&self) -> CycleTiming {
        self.timing
    }

    pub fn counters(&self) -> &FailureCounters {
        &self.counters
    }

    /// Run one full cycle now, without waiting for a tick.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let tasks = load_task_list(&self.health_checks).map_err(|source| CycleError::TaskList {
            path: self.health_checks.display().to_string(),
            source,
        })?;
        let tasks = match tasks {
            None => {
                tracing::warn!(path = %self.health_checks.display(), "Task list not found, skipping cycle");
                return Ok(CycleReport::skipped(SkipReason::MissingTaskList));
            }
            Some(tasks) if tasks.is_empty() => {
                tracing::info!(path = %self.health_checks.display(), "No health check tasks, skipping cycle");
                return Ok(CycleReport::skipped(SkipReason::EmptyTaskList));
            }
            Some(tasks) => tasks,
        };

        tracing::info!(
            tasks = tasks.len(),
            concurrency = self.executor.concurrency(),
            timeout_secs = self.executor.timeout().as_secs(),
            "Starting check cycle"
        );

        let results = self.executor.run_cycle(tasks).await;
        let failed = results.iter().filter(|r| !r.outcome.is_healthy()).count();
        tracing::info!(
            total = results.len(),
            healthy = results.len() - failed,
            failed,
            "Check cycle finished"
        );

        let active = routing::load(&self.routing_config)?.upstreams();
        let state = self.store.load();
        metrics::record_disabled_upstreams(state.len());

        let decisions = self.counters.evaluate(&results, &active, &state);
        let mut report = CycleReport {
            probed: results.len(),
            failed,
            decisions,
            ..CycleReport::default()
        };
        if report.decisions.is_empty() {
            return Ok(report);
        }

        let applied = apply_plan(&self.routing_config, &self.store, &report.decisions.plan())?;
        metrics::record_disabled_upstreams(applied.disabled_upstreams);
        report.config_changed = applied.changed;
        if !applied.changed {
            return Ok(report);
        }

        if let Err(e) = self.validator.validate(&self.routing_config).await {
            tracing::error!(
                config = %self.routing_config.display(),
                error = %e,
                "Modified configuration failed validation; it is left in place unverified and the relay was not reloaded"
            );
            return Ok(report);
        }
        report.validated = true;

        match self.reloader.reload().await {
            Ok(()) => {
                tracing::info!("Relay reloaded with the new configuration");
                report.reloaded = true;
            }
            Err(e) => tracing::error!(error = %e, "Failed to reload the relay"),
        }

        Ok(report)
    }

    /// Run cycles on schedule until `shutdown` fires.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            schedule = %self.schedule,
            period_secs = self.timing.period.as_secs(),
            check_timeout_secs = self.timing.check_timeout.as_secs(),
            threshold = self.counters.threshold(),
            "Failover daemon started"
        );

        let mut next_tick = self.schedule.next_after(SystemTime::now());

        loop {
            let wait = next_tick
                .duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO);
            if !wait.is_zero() {
                tracing::debug!(wait_secs = wait.as_secs(), "Sleeping until next cycle");
                tokio::select! {
                    _ = time::sleep(wait) => {}
                    _ = shutdown.recv() => break,
                }
            }

            let id = CycleId::new();
            let started = Instant::now();
            let started_at = SystemTime::now();
            let span = tracing::info_span!("cycle", id = %id);

            let outcome = self.run_cycle().instrument(span).await;
            match outcome {
                Ok(report) => {
                    metrics::record_cycle(report.label(), started.elapsed());
                    next_tick = self.following_tick(next_tick, started_at, SystemTime::now());
                }
                Err(e) => {
                    metrics::record_cycle(e.label(), started.elapsed());
                    tracing::error!(
                        cycle = %id,
                        error = %e,
                        backoff_secs = self.error_backoff.as_secs(),
                        "Cycle failed, retrying after backoff"
                    );
                    tokio::select! {
                        _ = time::sleep(self.error_backoff) => {}
                        _ = shutdown.recv() => break,
                    }
                    next_tick = self.schedule.next_after(SystemTime::now());
                }
            }

            if shutdown_requested(&mut shutdown) {
                break;
            }
        }

        tracing::info!("Failover daemon stopped");
    }

    /// Next tick after `previous`, no sooner than the minimum period after
    /// the cycle started. An overrun yields `now`: one immediate catch-up cycle, after
    /// which the schedule realigns.
    fn following_tick(&self, previous: SystemTime, started_at: SystemTime, now: SystemTime) -> SystemTime {
        let scheduled = self.schedule.next_after(previous).max(started_at + self.min_period);
        if scheduled <= now {
            tracing::warn!("Cycle overran the next tick, running a catch-up cycle");
            return now;
        }
        scheduled
    }
}

fn shutdown_requested(shutdown: &mut broadcast::Receiver<()>) -> bool {
    !matches!(shutdown.try_recv(), Err(broadcast::error::TryRecvError::Empty))
}
