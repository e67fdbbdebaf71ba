//! Serializer for the relay config text format.
//!
//! Global sections come first, then one `[[endpoints]]` block per rule with
//! `listen` and `remote` leading. Keys are indented two spaces and every
//! block is followed by a blank line.

use std::fmt::Write as _;

use crate::routing::model::{RoutingConfig, RoutingRule, Table, Value};
use crate::routing::parser::RULE_HEADER;

const INDENT: &str = "  ";

/// Serialize the whole config.
pub fn serialize(config: &RoutingConfig) -> String {
    let mut out = String::new();

    if !config.root.is_empty() {
        write_table(&mut out, &config.root, "");
        out.push('\n');
    }

    for section in &config.sections {
        let _ = writeln!(out, "[{}]", section.name);
        write_table(&mut out, &section.table, INDENT);
        out.push('\n');
    }

    for rule in &config.rules {
        out.push_str(&serialize_rule(rule));
        out.push('\n');
    }

    out
}

/// Serialize a single rule as a standalone `[[endpoints]]` block.
///
/// This text is what failover backups store, so parsing it back must
/// reproduce `rule` exactly.
pub fn serialize_rule(rule: &RoutingRule) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "[[{RULE_HEADER}]]");

    if let Some(listen) = &rule.listen {
        write_entry(&mut out, INDENT, "listen", &Value::String(listen.clone()));
    }
    if let Some(remote) = &rule.remote {
        write_entry(&mut out, INDENT, "remote", &Value::String(remote.clone()));
    }
    if !rule.extra_remotes.is_empty() {
        write_entry(
            &mut out,
            INDENT,
            "extra_remotes",
            &Value::Array(rule.extra_remotes.clone()),
        );
    }
    if let Some(balance) = &rule.balance {
        write_entry(&mut out, INDENT, "balance", &Value::String(balance.to_string()));
    }
    write_table(&mut out, &rule.passthrough, INDENT);

    out
}

fn write_table(out: &mut String, table: &Table, indent: &str) {
    for (key, value) in table.iter() {
        write_entry(out, indent, key, value);
    }
}

fn write_entry(out: &mut String, indent: &str, key: &str, value: &Value) {
    let _ = writeln!(out, "{indent}{key} = {}", format_value(value));
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(|s| quote(s)).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Bool(b) => b.to_string(),
        Value::Integer(n) => n.to_string(),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
