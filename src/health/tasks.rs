//! Probe task list.
//!
//! One `<address>=<check-command>` per line; blank lines and lines starting
//! with `#` are ignored.

use std::fs;
use std::io;
use std::path::Path;

/// One upstream to probe and the command that checks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTask {
    /// Upstream address exactly as it appears in the routing config.
    pub address: String,
    /// Executable invoked as `<command> <host> <port>`.
    pub command: String,
}

impl ProbeTask {
    pub fn new(address: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            command: command.into(),
        }
    }

    /// Split the address into host and port.
    ///
    /// Accepts `[v6]:port` and `host:port`; anything else is returned as the
    /// host with an empty port.
    pub fn target(&self) -> (String, String) {
        let addr = self.address.as_str();

        if let Some(rest) = addr.strip_prefix('[') {
            if let Some((host, port)) = rest.rsplit_once("]:") {
                if !host.is_empty() && !port.is_empty() {
                    return (host.to_string(), port.to_string());
                }
            }
        }

        if let Some((host, port)) = addr.split_once(':') {
            if !host.is_empty() && !port.is_empty() && !port.contains(':') {
                return (host.to_string(), port.to_string());
            }
        }

        (addr.to_string(), String::new())
    }
}

/// Parse task list text. Lines without `=` are logged and skipped.
pub fn parse_task_list(text: &str) -> Vec<ProbeTask> {
    let mut tasks = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.split_once('=') {
            Some((address, command)) if !address.trim().is_empty() && !command.trim().is_empty() => {
                tasks.push(ProbeTask::new(address.trim(), command.trim()));
            }
            _ => {
                tracing::warn!(line = index + 1, content = line, "Skipping malformed health check line");
            }
        }
    }
    tasks
}

/// Read the task list. `Ok(None)` when the file does not exist.
pub fn load_task_list(path: &Path) -> io::Result<Option<Vec<ProbeTask>>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(parse_task_list(&text))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
