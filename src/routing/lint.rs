//! Built-in routing config linter.
//!
//! # Responsibilities
//! - Require at least one `[[endpoints]]` rule
//! - Require non-empty `listen` and `remote` on every rule
//! - Reject duplicate `listen` addresses
//! - Check `balance` weight count against `1 + len(extra_remotes)`
//!
//! # Design Decisions
//! - Returns all problems, not just the first
//! - Pure function over the parsed model; reading the file is the caller's job

use std::collections::HashSet;

use thiserror::Error;

use crate::routing::model::RoutingConfig;
use crate::routing::parser::{parse, ParseError};

/// A single lint finding. Rule indices are 1-based, as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LintError {
    #[error("config is empty or has no [[endpoints]] rule")]
    NoRules,

    #[error("config could not be parsed: {0}")]
    Parse(#[from] ParseError),

    #[error("rule {index} is missing `listen`")]
    MissingListen { index: usize },

    #[error("rule {index} is missing `remote`")]
    MissingRemote { index: usize },

    #[error("rule {index} reuses listen address `{listen}`")]
    DuplicateListen { index: usize, listen: String },

    #[error("rule {index} has malformed balance `{balance}`")]
    MalformedBalance { index: usize, balance: String },

    #[error("rule {index} has {weights} balance weights for {upstreams} upstreams")]
    WeightCountMismatch {
        index: usize,
        weights: usize,
        upstreams: usize,
    },
}

/// Lint raw config text.
pub fn lint_text(text: &str) -> Result<(), Vec<LintError>> {
    if text.trim().is_empty() {
        return Err(vec![LintError::NoRules]);
    }
    let config = parse(text).map_err(|e| vec![LintError::Parse(e)])?;
    lint(&config)
}

/// Lint a parsed config.
pub fn lint(config: &RoutingConfig) -> Result<(), Vec<LintError>> {
    if config.rules.is_empty() {
        return Err(vec![LintError::NoRules]);
    }

    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (i, rule) in config.rules.iter().enumerate() {
        let index = i + 1;

        match rule.listen.as_deref().filter(|l| !l.is_empty()) {
            None => errors.push(LintError::MissingListen { index }),
            Some(listen) => {
                if !seen.insert(listen) {
                    errors.push(LintError::DuplicateListen {
                        index,
                        listen: listen.to_string(),
                    });
                }
            }
        }

        if rule.remote.as_deref().map_or(true, str::is_empty) {
            errors.push(LintError::MissingRemote { index });
        }

        if let Some(balance) = &rule.balance {
            let upstreams = 1 + rule.extra_remotes.len();
            if balance.weights.is_empty() {
                errors.push(LintError::MalformedBalance {
                    index,
                    balance: balance.to_string(),
                });
            } else if balance.weights.len() != upstreams {
                errors.push(LintError::WeightCountMismatch {
                    index,
                    weights: balance.weights.len(),
                    upstreams,
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
