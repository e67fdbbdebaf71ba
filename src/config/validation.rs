//! Settings validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: DaemonConfig → Result<(), Vec<ValidationError>>

use std::fmt;

use crate::config::schema::DaemonConfig;
use crate::lifecycle::schedule::TickSchedule;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &DaemonConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.failover.failures_to_disable == 0 {
        errors.push(ValidationError::new("failover.failures_to_disable", "must be at least 1"));
    }
    if config.failover.concurrent_checks == 0 {
        errors.push(ValidationError::new("failover.concurrent_checks", "must be at least 1"));
    }
    if config.collaborators.reload_command.is_empty() {
        errors.push(ValidationError::new("collaborators.reload_command", "must not be empty"));
    }
    if matches!(&config.collaborators.validate_command, Some(argv) if argv.is_empty()) {
        errors.push(ValidationError::new(
            "collaborators.validate_command",
            "must not be empty when set",
        ));
    }
    if let Err(e) = config.schedule.expression.parse::<TickSchedule>() {
        errors.push(ValidationError::new("schedule.expression", e.to_string()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&DaemonConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_problem() {
        let mut config = DaemonConfig::default();
        config.failover.failures_to_disable = 0;
        config.failover.concurrent_checks = 0;
        config.collaborators.reload_command.clear();
        config.collaborators.validate_command = Some(Vec::new());
        config.schedule.expression = "0 0 1 * *".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "failover.failures_to_disable",
                "failover.concurrent_checks",
                "collaborators.reload_command",
                "collaborators.validate_command",
                "schedule.expression",
            ]
        );
    }
}
