//! Post-mutation collaborators: config validation and service reload.
//!
//! # Design Decisions
//! - Both are traits so the controller can be driven without real services
//! - A failed validation never triggers a reload
//! - Command collaborators inherit stdio so their output reaches the journal

use std::path::Path;

use thiserror::Error;
use tokio::process::Command;

use crate::routing::lint::lint_text;
use crate::BoxFuture;

/// The just-written routing config did not pass validation.
#[derive(Debug, Error)]
pub enum ValidationFailure {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config rejected: {}", .problems.join("; "))]
    Rejected { problems: Vec<String> },

    #[error("failed to run validator {command}: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("validator {command} exited with {code:?}")]
    Exit { command: String, code: Option<i32> },
}

/// The relay could not be told to pick up the new config.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("failed to run reload command {command}: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("reload command {command} exited with {code:?}")]
    Exit { command: String, code: Option<i32> },

    #[error("reload command is empty")]
    Empty,
}

pub trait ConfigValidator: Send + Sync {
    fn validate<'a>(&'a self, config_path: &'a Path) -> BoxFuture<'a, Result<(), ValidationFailure>>;
}

pub trait ServiceReloader: Send + Sync {
    fn reload(&self) -> BoxFuture<'_, Result<(), ReloadError>>;
}

/// Validates with the built-in routing linter.
#[derive(Debug, Clone, Copy, Default)]
pub struct LintValidator;

impl ConfigValidator for LintValidator {
    fn validate<'a>(&'a self, config_path: &'a Path) -> BoxFuture<'a, Result<(), ValidationFailure>> {
        Box::pin(async move {
            let text = tokio::fs::read_to_string(config_path)
                .await
                .map_err(|source| ValidationFailure::Read {
                    path: config_path.display().to_string(),
                    source,
                })?;
            lint_text(&text).map_err(|errors| ValidationFailure::Rejected {
                problems: errors.iter().map(ToString::to_string).collect(),
            })
        })
    }
}

/// Runs an external validator as `<argv...> <config-path>`.
#[derive(Debug, Clone)]
pub struct CommandValidator {
    argv: Vec<String>,
}

impl CommandValidator {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl ConfigValidator for CommandValidator {
    fn validate<'a>(&'a self, config_path: &'a Path) -> BoxFuture<'a, Result<(), ValidationFailure>> {
        Box::pin(async move {
            let command = self.argv.join(" ");
            let Some((program, args)) = self.argv.split_first() else {
                return Err(ValidationFailure::Exit { command, code: None });
            };

            let status = Command::new(program)
                .args(args)
                .arg(config_path)
                .status()
                .await
                .map_err(|source| ValidationFailure::Launch {
                    command: command.clone(),
                    source,
                })?;

            if status.success() {
                Ok(())
            } else {
                Err(ValidationFailure::Exit {
                    command,
                    code: status.code(),
                })
            }
        })
    }
}

/// Restarts the relay with a fixed command, `systemctl restart realm` by default.
#[derive(Debug, Clone)]
pub struct CommandReloader {
    argv: Vec<String>,
}

impl CommandReloader {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl ServiceReloader for CommandReloader {
    fn reload(&self) -> BoxFuture<'_, Result<(), ReloadError>> {
        Box::pin(async move {
            let Some((program, args)) = self.argv.split_first() else {
                return Err(ReloadError::Empty);
            };
            let command = self.argv.join(" ");

            let status = Command::new(program)
                .args(args)
                .status()
                .await
                .map_err(|source| ReloadError::Launch {
                    command: command.clone(),
                    source,
                })?;

            if status.success() {
                Ok(())
            } else {
                Err(ReloadError::Exit {
                    command,
                    code: status.code(),
                })
            }
        })
    }
}
