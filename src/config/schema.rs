//! Daemon settings schema.
//!
//! Every section is `#[serde(default)]`, so an empty settings file (or none
//! at all) yields the stock layout under `/etc/realm`.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root settings for the failover daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Files the daemon reads and rewrites.
    pub paths: PathsConfig,

    /// When cycles run.
    pub schedule: ScheduleConfig,

    /// Thresholds and probe fan-out.
    pub failover: FailoverConfig,

    /// External validator and reload commands.
    pub collaborators: CollaboratorConfig,

    /// Metrics exporter settings.
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    /// Relay routing config (`[[endpoints]]` rules).
    pub routing_config: PathBuf,

    /// `address=command` task list.
    pub health_checks: PathBuf,

    /// Failover state (disabled addresses and their rule backups).
    pub state_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            routing_config: PathBuf::from("/etc/realm/config.toml"),
            health_checks: PathBuf::from("/etc/realm/health_checks.conf"),
            state_file: PathBuf::from("/etc/realm/state.backup.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Cron-style minute schedule or `@every <N>s|m`.
    pub expression: String,

    /// Floor on the cycle period in seconds.
    pub min_cycle_secs: u64,

    /// Sleep after a failed cycle before trying again.
    pub error_backoff_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            expression: "*/5 * * * *".to_string(),
            min_cycle_secs: 5,
            error_backoff_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct FailoverConfig {
    /// Consecutive failed probes before an upstream is removed.
    pub failures_to_disable: u32,

    /// Checks allowed to run at once.
    pub concurrent_checks: usize,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            failures_to_disable: 2,
            concurrent_checks: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CollaboratorConfig {
    /// Validator argv; the config path is appended. `None` uses the built-in linter.
    pub validate_command: Option<Vec<String>>,

    /// Command that makes the relay pick up a rewritten config.
    pub reload_command: Vec<String>,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            validate_command: None,
            reload_command: vec!["systemctl".into(), "restart".into(), "realm".into()],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Prometheus listener, e.g. "127.0.0.1:9100". Disabled when unset.
    pub metrics_address: Option<SocketAddr>,
}
