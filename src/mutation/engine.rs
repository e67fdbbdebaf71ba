//! Disable/enable algorithms over the routing model.

use std::collections::HashSet;

use thiserror::Error;

use crate::routing::{parse, serialize_rule, Balance, ParseError, RoutingConfig, RoutingRule, Value};
use crate::state::{BackupEntry, FailoverState};

/// Remove `address` from every rule that forwards to it.
///
/// Each touched rule is backed up (once per listen address) under `address`
/// before it changes. A rule left without upstreams is removed. Returns
/// whether the config changed.
pub fn disable(config: &mut RoutingConfig, state: &mut FailoverState, address: &str) -> bool {
    let matches: Vec<usize> = config
        .rules
        .iter()
        .enumerate()
        .filter(|(_, rule)| rule.references(address))
        .map(|(index, _)| index)
        .collect();

    if matches.is_empty() {
        return false;
    }

    let mut changed = false;
    let mut new_backups = Vec::new();

    // Reverse order keeps the remaining indices valid across removals.
    for &index in matches.iter().rev() {
        let rule = &config.rules[index];
        let Some(listen) = rule.listen.clone() else {
            tracing::warn!(address, "Skipping rule without listen address");
            continue;
        };

        let mut upstreams = rule.upstreams();
        if let Some(balance) = &rule.balance {
            if !balance.weights.is_empty() && balance.weights.len() != upstreams.len() {
                tracing::error!(
                    listen = %listen,
                    weights = balance.weights.len(),
                    upstreams = upstreams.len(),
                    "Balance weight count does not match upstream count, leaving rule untouched"
                );
                continue;
            }
        }
        let Some(position) = upstreams.iter().position(|u| u == address) else {
            continue;
        };

        if !state.has_backup(address, &listen) {
            new_backups.push(BackupEntry {
                listen: listen.clone(),
                original_block: serialize_rule(rule),
            });
        }

        upstreams.remove(position);
        if upstreams.is_empty() {
            tracing::warn!(listen = %listen, address, "Only upstream of rule failed, removing the whole rule");
            config.rules.remove(index);
        } else {
            rebalance(&mut config.rules[index], upstreams, position);
        }
        changed = true;
    }

    // Store backups in the order the rules appear in the config.
    for entry in new_backups.into_iter().rev() {
        state.push_backup(address, entry);
    }

    changed
}

/// Point `rule` at `remaining` upstreams, dropping the weight at `removed`.
fn rebalance(rule: &mut RoutingRule, mut remaining: Vec<String>, removed: usize) {
    let balance = rule.balance.take();

    rule.remote = Some(remaining.remove(0));
    rule.extra_remotes = remaining;

    if rule.extra_remotes.is_empty() {
        return;
    }
    if let Some(Balance { strategy, mut weights }) = balance {
        if removed < weights.len() {
            weights.remove(removed);
        }
        if !weights.is_empty() {
            rule.balance = Some(Balance { strategy, weights });
        }
    }
}

/// Restore every rule that was backed up because `address` failed.
///
/// Current rules sharing a backed-up listen address are replaced by the
/// verbatim originals, appended at the end. Every backup is decoded before
/// anything is touched: if one cannot be restored, the config and the state
/// stay as they are. Returns whether the config changed.
pub fn enable(config: &mut RoutingConfig, state: &mut FailoverState, address: &str) -> bool {
    let Some(backups) = state.backups(address) else {
        return false;
    };

    let mut restored = Vec::with_capacity(backups.len());
    for backup in backups {
        match restore_rule(&backup.original_block) {
            Ok(rule) => restored.push(rule),
            Err(e) => {
                tracing::error!(
                    address,
                    listen = %backup.listen,
                    error = %e,
                    "Backup block could not be restored, keeping upstream disabled"
                );
                return false;
            }
        }
    }

    tracing::info!(address, rules = restored.len(), "Restoring configuration for recovered upstream");

    let listens: HashSet<String> = backups.iter().map(|b| b.listen.clone()).collect();
    config
        .rules
        .retain(|rule| rule.listen.as_deref().map_or(true, |l| !listens.contains(l)));
    config.rules.extend(restored);
    state.take(address);

    true
}

#[derive(Debug, Error)]
enum RestoreError {
    #[error("backup is not a valid rule block: {0}")]
    Parse(#[from] ParseError),

    #[error("backup is not a valid JSON object: {0}")]
    Json(#[from] serde_json::Error),

    #[error("backup contains no rule")]
    Empty,
}

/// Rebuild a rule from backup text. JSON objects are backups written by
/// earlier releases of the daemon.
fn restore_rule(block: &str) -> Result<RoutingRule, RestoreError> {
    if block.trim_start().starts_with('{') {
        return legacy_rule(block);
    }
    parse(block)?.rules.into_iter().next().ok_or(RestoreError::Empty)
}

fn legacy_rule(block: &str) -> Result<RoutingRule, RestoreError> {
    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(block)?;
    let mut rule = RoutingRule::default();
    for (key, value) in object {
        let value = match value {
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(n) => Value::Integer(n),
                None => continue,
            },
            serde_json::Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
            ),
            _ => continue,
        };
        rule.set(&key, value);
    }
    if rule == RoutingRule::default() {
        return Err(RestoreError::Empty);
    }
    Ok(rule)
}
