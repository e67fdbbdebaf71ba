//! Probe executor.
//!
//! # Responsibilities
//! - Run one external check per task, at most `concurrency` at a time
//! - Enforce a hard per-check timeout, killing the check when it expires
//! - Map exit status 0 to healthy and everything else to unhealthy
//!
//! # Design Decisions
//! - Launch failures, timeouts and panics all count as unhealthy
//! - Results are gathered for every task before returning

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::time;

use crate::health::tasks::ProbeTask;
use crate::observability::metrics;
use crate::BoxFuture;

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Healthy,
    Unhealthy,
}

impl ProbeOutcome {
    pub fn is_healthy(self) -> bool {
        self == ProbeOutcome::Healthy
    }
}

/// Outcome for one upstream address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub address: String,
    pub outcome: ProbeOutcome,
}

/// Something that can decide whether a probe target is healthy.
pub trait HealthCheck: Send + Sync {
    fn check<'a>(&'a self, task: &'a ProbeTask) -> BoxFuture<'a, ProbeOutcome>;
}

/// Runs the task's command as `<command> <host> <port>` with stdio discarded.
///
/// A command that names an existing file is run as that single program, so
/// script paths may contain spaces. Anything else is split on whitespace
/// into the program and its leading arguments.
///
/// The child is killed if the returned future is dropped, which is how the
/// executor's timeout terminates a hung check.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptCheck;

impl HealthCheck for ScriptCheck {
    fn check<'a>(&'a self, task: &'a ProbeTask) -> BoxFuture<'a, ProbeOutcome> {
        Box::pin(async move {
            let Some((program, args)) = command_argv(&task.command).await else {
                tracing::error!(address = %task.address, "Empty check command");
                return ProbeOutcome::Unhealthy;
            };
            let (host, port) = task.target();

            let child = Command::new(program)
                .args(args)
                .arg(host)
                .arg(port)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn();

            let mut child = match child {
                Ok(child) => child,
                Err(e) => {
                    tracing::error!(
                        address = %task.address,
                        command = %task.command,
                        error = %e,
                        "Failed to execute check command"
                    );
                    return ProbeOutcome::Unhealthy;
                }
            };

            match child.wait().await {
                Ok(status) if status.success() => ProbeOutcome::Healthy,
                Ok(status) => {
                    tracing::debug!(address = %task.address, code = ?status.code(), "Check exited non-zero");
                    ProbeOutcome::Unhealthy
                }
                Err(e) => {
                    tracing::error!(address = %task.address, error = %e, "Failed to wait for check command");
                    ProbeOutcome::Unhealthy
                }
            }
        })
    }
}

async fn command_argv(command: &str) -> Option<(&str, Vec<&str>)> {
    let command = command.trim();
    if command.is_empty() {
        return None;
    }
    let is_file = tokio::fs::metadata(command)
        .await
        .is_ok_and(|meta| meta.is_file());
    if is_file {
        return Some((command, Vec::new()));
    }
    let mut words = command.split_whitespace();
    let program = words.next()?;
    Some((program, words.collect()))
}

/// Bounded-concurrency runner for one probe cycle.
#[derive(Clone)]
pub struct ProbeExecutor {
    checker: Arc<dyn HealthCheck>,
    concurrency: usize,
    timeout: Duration,
}

impl ProbeExecutor {
    pub fn new(checker: Arc<dyn HealthCheck>, concurrency: usize, timeout: Duration) -> Self {
        Self {
            checker,
            concurrency: concurrency.max(1),
            timeout,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe every task and return one result per task.
    pub async fn run_cycle(&self, tasks: Vec<ProbeTask>) -> Vec<ProbeResult> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(tasks.len());

        for task in tasks {
            let semaphore = semaphore.clone();
            let checker = self.checker.clone();
            let timeout = self.timeout;
            let address = task.address.clone();

            let handle = tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return ProbeOutcome::Unhealthy;
                };
                match time::timeout(timeout, checker.check(&task)).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        tracing::warn!(
                            address = %task.address,
                            timeout_secs = timeout.as_secs_f64(),
                            "Health check timed out"
                        );
                        ProbeOutcome::Unhealthy
                    }
                }
            });
            handles.push((address, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (address, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(address = %address, error = %e, "Health check task failed");
                    ProbeOutcome::Unhealthy
                }
            };
            metrics::record_probe(outcome.is_healthy());
            results.push(ProbeResult { address, outcome });
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers from a fixed table after an optional delay, tracking peak concurrency.
    struct TableCheck {
        answers: HashMap<String, (ProbeOutcome, Duration)>,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl TableCheck {
        fn new(answers: &[(&str, ProbeOutcome, u64)]) -> Self {
            Self {
                answers: answers
                    .iter()
                    .map(|(a, o, ms)| (a.to_string(), (*o, Duration::from_millis(*ms))))
                    .collect(),
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    impl HealthCheck for TableCheck {
        fn check<'a>(&'a self, task: &'a ProbeTask) -> BoxFuture<'a, ProbeOutcome> {
            Box::pin(async move {
                let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                let (outcome, delay) = self.answers[&task.address];
                time::sleep(delay).await;
                self.running.fetch_sub(1, Ordering::SeqCst);
                outcome
            })
        }
    }

    fn tasks(addresses: &[&str]) -> Vec<ProbeTask> {
        addresses.iter().map(|a| ProbeTask::new(*a, "unused")).collect()
    }

    fn outcome_of(results: &[ProbeResult], address: &str) -> ProbeOutcome {
        results.iter().find(|r| r.address == address).unwrap().outcome
    }

    #[tokio::test]
    async fn collects_every_result() {
        let check = Arc::new(TableCheck::new(&[
            ("a", ProbeOutcome::Healthy, 5),
            ("b", ProbeOutcome::Unhealthy, 1),
            ("c", ProbeOutcome::Healthy, 0),
        ]));
        let executor = ProbeExecutor::new(check, 5, Duration::from_secs(2));

        let results = executor.run_cycle(tasks(&["a", "b", "c"])).await;

        assert_eq!(results.len(), 3);
        assert_eq!(outcome_of(&results, "a"), ProbeOutcome::Healthy);
        assert_eq!(outcome_of(&results, "b"), ProbeOutcome::Unhealthy);
        assert_eq!(outcome_of(&results, "c"), ProbeOutcome::Healthy);
    }

    #[tokio::test]
    async fn respects_concurrency_limit() {
        let answers: Vec<(String, ProbeOutcome, u64)> = (0..8)
            .map(|i| (format!("h{i}"), ProbeOutcome::Healthy, 20))
            .collect();
        let answers: Vec<(&str, ProbeOutcome, u64)> =
            answers.iter().map(|(a, o, d)| (a.as_str(), *o, *d)).collect();
        let check = Arc::new(TableCheck::new(&answers));
        let executor = ProbeExecutor::new(check.clone(), 2, Duration::from_secs(2));

        let names: Vec<&str> = answers.iter().map(|(a, _, _)| *a).collect();
        let results = executor.run_cycle(tasks(&names)).await;

        assert_eq!(results.len(), 8);
        assert!(check.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn slow_check_times_out_as_unhealthy() {
        let check = Arc::new(TableCheck::new(&[
            ("slow", ProbeOutcome::Healthy, 5_000),
            ("fast", ProbeOutcome::Healthy, 0),
        ]));
        let executor = ProbeExecutor::new(check, 2, Duration::from_millis(50));

        let started = std::time::Instant::now();
        let results = executor.run_cycle(tasks(&["slow", "fast"])).await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(outcome_of(&results, "slow"), ProbeOutcome::Unhealthy);
        assert_eq!(outcome_of(&results, "fast"), ProbeOutcome::Healthy);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn script_check_uses_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("check.sh");
        std::fs::write(&script, "[ \"$1\" = \"10.0.0.1\" ] && [ \"$2\" = \"443\" ]\n").unwrap();
        let command = format!("/bin/sh {}", script.display());

        let executor = ProbeExecutor::new(Arc::new(ScriptCheck), 2, Duration::from_secs(5));
        let results = executor
            .run_cycle(vec![
                ProbeTask::new("10.0.0.1:443", command.clone()),
                ProbeTask::new("10.0.0.2:443", command),
                ProbeTask::new("10.0.0.3:443", "/nonexistent/check"),
            ])
            .await;

        assert_eq!(outcome_of(&results, "10.0.0.1:443"), ProbeOutcome::Healthy);
        assert_eq!(outcome_of(&results, "10.0.0.2:443"), ProbeOutcome::Unhealthy);
        assert_eq!(outcome_of(&results, "10.0.0.3:443"), ProbeOutcome::Unhealthy);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn script_path_with_spaces_runs_as_one_program() {
        let dir = tempfile::tempdir().unwrap();
        let ok = dir.path().join("check ok");
        let fail = dir.path().join("check fail");
        std::os::unix::fs::symlink("/bin/true", &ok).unwrap();
        std::os::unix::fs::symlink("/bin/false", &fail).unwrap();

        let executor = ProbeExecutor::new(Arc::new(ScriptCheck), 2, Duration::from_secs(5));
        let results = executor
            .run_cycle(vec![
                ProbeTask::new("10.0.0.1:443", ok.display().to_string()),
                ProbeTask::new("10.0.0.2:443", fail.display().to_string()),
            ])
            .await;

        assert_eq!(outcome_of(&results, "10.0.0.1:443"), ProbeOutcome::Healthy);
        assert_eq!(outcome_of(&results, "10.0.0.2:443"), ProbeOutcome::Unhealthy);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn script_check_is_killed_on_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("hang.sh");
        std::fs::write(&script, "exec sleep 30\n").unwrap();

        let executor = ProbeExecutor::new(Arc::new(ScriptCheck), 1, Duration::from_millis(200));
        let started = std::time::Instant::now();
        let results = executor
            .run_cycle(vec![ProbeTask::new("10.0.0.9:80", format!("/bin/sh {}", script.display()))])
            .await;

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(results[0].outcome, ProbeOutcome::Unhealthy);
    }
}
