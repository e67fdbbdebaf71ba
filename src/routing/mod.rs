//! Relay routing configuration subsystem.
//!
//! # Data Flow
//! ```text
//! config.toml (relay format)
//!     → parser.rs (permissive line reader)
//!     → RoutingConfig (model.rs: sections + ordered [[endpoints]] rules)
//!     → mutation engine rewrites rules
//!     → writer.rs (serialize, listen/remote first)
//!     → config.toml rewritten in place
//!
//! Before a reload:
//!     lint.rs checks listen uniqueness and balance/upstream parity
//! ```
//!
//! # Design Decisions
//! - Only the subset of TOML the relay config uses is understood
//! - Unrecognised keys ride along untouched in a passthrough table
//! - Unsupported bare values are dropped instead of failing the read
//! - Structural damage (unterminated strings, broken headers) is a hard error

pub mod lint;
pub mod model;
pub mod parser;
pub mod writer;

use std::path::Path;

pub use model::{Balance, RoutingConfig, RoutingRule, Section, Table, Value};
pub use parser::{parse, ParseError, ParseErrorKind};
pub use writer::{serialize, serialize_rule};

/// Error reading a routing config from disk.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },
}

/// Read and parse the routing config at `path`.
pub fn load(path: &Path) -> Result<RoutingConfig, RoutingError> {
    read(path).map(|(_, config)| config)
}

/// Like [`load`], but also hands back the text as it was on disk.
pub fn read(path: &Path) -> Result<(String, RoutingConfig), RoutingError> {
    let text = std::fs::read_to_string(path).map_err(|source| RoutingError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config = parse(&text).map_err(|source| RoutingError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    Ok((text, config))
}
