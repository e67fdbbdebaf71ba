//! Failover state file.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persist::write_atomic;

/// One rule that was removed or rebalanced because an upstream failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupEntry {
    /// Listen address of the perturbed rule.
    pub listen: String,
    /// The rule exactly as it was serialized before the change.
    pub original_block: String,
}

/// Disabled upstream address → backups of the rules it displaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailoverState {
    entries: BTreeMap<String, Vec<BackupEntry>>,
}

impl FailoverState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `address` is currently recorded as disabled.
    pub fn is_disabled(&self, address: &str) -> bool {
        self.entries.contains_key(address)
    }

    pub fn backups(&self, address: &str) -> Option<&[BackupEntry]> {
        self.entries.get(address).map(Vec::as_slice)
    }

    pub fn has_backup(&self, address: &str, listen: &str) -> bool {
        self.entries
            .get(address)
            .is_some_and(|backups| backups.iter().any(|b| b.listen == listen))
    }

    pub fn push_backup(&mut self, address: &str, entry: BackupEntry) {
        self.entries.entry(address.to_string()).or_default().push(entry);
    }

    /// Remove and return every backup held for `address`.
    pub fn take(&mut self, address: &str) -> Option<Vec<BackupEntry>> {
        self.entries.remove(address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Errors from the strict load and from saving.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to access state file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("state file {path} is not valid: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// JSON-backed storage for [`FailoverState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state, falling back to empty when the file is missing or
    /// unreadable. Never fails the caller.
    pub fn load(&self) -> FailoverState {
        match self.load_strict() {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable failover state, starting empty");
                FailoverState::default()
            }
        }
    }

    /// Load the state, reporting a corrupt file instead of discarding it.
    /// A missing or blank file is still an empty state.
    pub fn load_strict(&self) -> Result<FailoverState, StateError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(FailoverState::default()),
            Err(source) => return Err(self.io_error(source)),
        };
        if content.trim().is_empty() {
            return Ok(FailoverState::default());
        }
        serde_json::from_str(&content).map_err(|source| StateError::Parse {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Overwrite the whole state file.
    pub fn save(&self, state: &FailoverState) -> Result<(), StateError> {
        let json = serde_json::to_string_pretty(state).map_err(|source| StateError::Parse {
            path: self.path.display().to_string(),
            source,
        })?;
        write_atomic(&self.path, json.as_bytes()).map_err(|source| self.io_error(source))?;
        tracing::debug!(path = %self.path.display(), disabled = state.len(), "Saved failover state");
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> StateError {
        StateError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(listen: &str) -> BackupEntry {
        BackupEntry {
            listen: listen.to_string(),
            original_block: format!("[[endpoints]]\n  listen = \"{listen}\"\n"),
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("absent.json"));
        assert!(store.load().is_empty());
        assert!(store.load_strict().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_lenient_or_strict() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        let store = StateStore::new(&path);

        assert!(store.load().is_empty());
        assert!(matches!(store.load_strict(), Err(StateError::Parse { .. })));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        let mut state = FailoverState::new();
        state.push_backup("10.0.0.1:443", entry("0.0.0.0:443"));
        state.push_backup("10.0.0.1:443", entry("0.0.0.0:8443"));
        store.save(&state).unwrap();

        let loaded = store.load();
        assert_eq!(loaded, state);
        assert!(loaded.has_backup("10.0.0.1:443", "0.0.0.0:8443"));
        assert!(!loaded.has_backup("10.0.0.2:443", "0.0.0.0:8443"));
    }

    #[test]
    fn reads_original_daemon_layout() {
        let json = r#"{
  "10.0.0.1:443": [
    {"listen": "0.0.0.0:443", "original_block": "{\"listen\": \"0.0.0.0:443\", \"remote\": \"10.0.0.1:443\"}"}
  ]
}"#;
        let state: FailoverState = serde_json::from_str(json).unwrap();
        assert!(state.is_disabled("10.0.0.1:443"));
        assert_eq!(state.backups("10.0.0.1:443").unwrap()[0].listen, "0.0.0.0:443");
    }

    #[test]
    fn take_clears_address() {
        let mut state = FailoverState::new();
        state.push_backup("a", entry("l"));
        assert_eq!(state.take("a").unwrap().len(), 1);
        assert!(!state.is_disabled("a"));
        assert!(state.take("a").is_none());
    }
}
