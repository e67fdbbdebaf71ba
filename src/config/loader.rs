//! Settings loading: defaults, then an optional TOML file, then environment.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::DaemonConfig;
use crate::config::validation::{validate_config, ValidationError};

pub const ENV_ROUTING_CONFIG: &str = "REALM_CONFIG_FILE";
pub const ENV_HEALTH_CHECKS: &str = "HEALTH_CHECKS_FILE";
pub const ENV_STATE_FILE: &str = "STATE_BACKUP_FILE";
pub const ENV_SCHEDULE: &str = "HEALTH_CHECK_CRON";
pub const ENV_FAILURES_TO_DISABLE: &str = "FAILURES_TO_DISABLE";
pub const ENV_CONCURRENT_CHECKS: &str = "CONCURRENT_CHECKS";

/// Error type for settings loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { var: &'static str, value: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, value } => {
                write!(f, "Invalid value for {}: {:?} is not a positive integer", var, value)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

/// Load settings from `path` (or defaults), apply process environment
/// overrides, and validate.
pub fn load_config(path: Option<&Path>) -> Result<DaemonConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => DaemonConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables onto `config`. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut DaemonConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    if let Some(v) = get(ENV_ROUTING_CONFIG) {
        config.paths.routing_config = PathBuf::from(v);
    }
    if let Some(v) = get(ENV_HEALTH_CHECKS) {
        config.paths.health_checks = PathBuf::from(v);
    }
    if let Some(v) = get(ENV_STATE_FILE) {
        config.paths.state_file = PathBuf::from(v);
    }
    if let Some(v) = get(ENV_SCHEDULE) {
        config.schedule.expression = v;
    }
    if let Some(v) = get(ENV_FAILURES_TO_DISABLE) {
        config.failover.failures_to_disable = parse_count(ENV_FAILURES_TO_DISABLE, &v)?;
    }
    if let Some(v) = get(ENV_CONCURRENT_CHECKS) {
        config.failover.concurrent_checks = parse_count(ENV_CONCURRENT_CHECKS, &v)?;
    }

    Ok(())
}

fn parse_count<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var,
        value: value.to_string(),
    })
}
