//! In-memory model of the relay routing configuration.
//!
//! # Responsibilities
//! - Hold global sections and `[[endpoints]]` rules in file order
//! - Give the engine typed access to `listen`, `remote`, `extra_remotes`, `balance`
//! - Carry every other key through as an opaque, ordered passthrough value

use std::collections::BTreeSet;
use std::fmt;

/// A right-hand side value the reader understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    String(String),
    Array(Vec<String>),
    Bool(bool),
    Integer(i64),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// Insertion-ordered key/value table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    entries: Vec<(String, Value)>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Insert or replace. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A named global section such as `[network]` or `[log]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub table: Table,
}

/// Load-balancing directive, written as `"<strategy>: w1, w2, ..."`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Balance {
    pub strategy: String,
    pub weights: Vec<String>,
}

impl Balance {
    /// Lenient parse. Text without a `:` becomes a strategy with no weights.
    pub fn parse(text: &str) -> Self {
        match text.split_once(':') {
            Some((strategy, weights)) => Self {
                strategy: strategy.trim().to_string(),
                weights: weights
                    .split(',')
                    .map(str::trim)
                    .filter(|w| !w.is_empty())
                    .map(str::to_string)
                    .collect(),
            },
            None => Self {
                strategy: text.trim().to_string(),
                weights: Vec::new(),
            },
        }
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.weights.is_empty() {
            write!(f, "{}", self.strategy)
        } else {
            write!(f, "{}: {}", self.strategy, self.weights.join(", "))
        }
    }
}

/// One `[[endpoints]]` forwarding rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingRule {
    /// Bind address. Unique across rules.
    pub listen: Option<String>,
    /// Primary upstream.
    pub remote: Option<String>,
    /// Additional upstreams; empty means the key is absent.
    pub extra_remotes: Vec<String>,
    pub balance: Option<Balance>,
    /// Everything else (`through`, `interface`, transports, dotted overrides).
    pub passthrough: Table,
}

impl RoutingRule {
    /// Assign a key read from the config.
    ///
    /// Known keys with the expected value kind land in their typed field;
    /// anything else is kept verbatim in `passthrough`.
    pub fn set(&mut self, key: &str, value: Value) {
        match (key, value) {
            ("listen", Value::String(s)) => {
                self.passthrough.remove(key);
                self.listen = Some(s);
            }
            ("remote", Value::String(s)) => {
                self.passthrough.remove(key);
                self.remote = Some(s);
            }
            ("extra_remotes", Value::Array(items)) => {
                self.passthrough.remove(key);
                self.extra_remotes = items;
            }
            ("balance", Value::String(s)) => {
                self.passthrough.remove(key);
                self.balance = Some(Balance::parse(&s));
            }
            (key, value) => {
                match key {
                    "listen" => self.listen = None,
                    "remote" => self.remote = None,
                    "extra_remotes" => self.extra_remotes.clear(),
                    "balance" => self.balance = None,
                    _ => {}
                }
                self.passthrough.insert(key, value);
            }
        }
    }

    /// Full upstream list: `remote` followed by `extra_remotes`.
    pub fn upstreams(&self) -> Vec<String> {
        self.remote
            .iter()
            .filter(|r| !r.is_empty())
            .chain(self.extra_remotes.iter())
            .cloned()
            .collect()
    }

    /// Whether `address` is one of this rule's upstreams.
    pub fn references(&self, address: &str) -> bool {
        self.remote.as_deref() == Some(address) || self.extra_remotes.iter().any(|r| r == address)
    }
}

/// The whole routing configuration, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingConfig {
    /// Keys that appear before any section header.
    pub root: Table,
    pub sections: Vec<Section>,
    pub rules: Vec<RoutingRule>,
}

impl RoutingConfig {
    pub fn section(&self, name: &str) -> Option<&Table> {
        self.sections.iter().find(|s| s.name == name).map(|s| &s.table)
    }

    pub(crate) fn section_index_or_insert(&mut self, name: &str) -> usize {
        match self.sections.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.sections.push(Section {
                    name: name.to_string(),
                    table: Table::new(),
                });
                self.sections.len() - 1
            }
        }
    }

    pub fn rule(&self, listen: &str) -> Option<&RoutingRule> {
        self.rules.iter().find(|r| r.listen.as_deref() == Some(listen))
    }

    /// Every upstream referenced as `remote` or in `extra_remotes`, sorted.
    pub fn upstreams(&self) -> BTreeSet<String> {
        self.rules.iter().flat_map(RoutingRule::upstreams).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_parse_and_display() {
        let b = Balance::parse("roundrobin: 3, 1 ,2");
        assert_eq!(b.strategy, "roundrobin");
        assert_eq!(b.weights, vec!["3", "1", "2"]);
        assert_eq!(b.to_string(), "roundrobin: 3, 1, 2");

        let bare = Balance::parse("iphash");
        assert_eq!(bare.strategy, "iphash");
        assert!(bare.weights.is_empty());
        assert_eq!(bare.to_string(), "iphash");
    }

    #[test]
    fn rule_set_routes_known_keys() {
        let mut rule = RoutingRule::default();
        rule.set("listen", "0.0.0.0:80".into());
        rule.set("remote", "10.0.0.1:80".into());
        rule.set("extra_remotes", Value::Array(vec!["10.0.0.2:80".into()]));
        rule.set("through", "0.0.0.0".into());

        assert_eq!(rule.listen.as_deref(), Some("0.0.0.0:80"));
        assert_eq!(rule.upstreams(), vec!["10.0.0.1:80", "10.0.0.2:80"]);
        assert_eq!(rule.passthrough.len(), 1);
        assert!(rule.references("10.0.0.2:80"));
        assert!(!rule.references("10.0.0.3:80"));
    }

    #[test]
    fn rule_set_keeps_wrongly_typed_known_key_opaque() {
        let mut rule = RoutingRule::default();
        rule.set("remote", "10.0.0.1:80".into());
        rule.set("remote", Value::Integer(5));

        assert!(rule.remote.is_none());
        assert_eq!(rule.passthrough.get("remote"), Some(&Value::Integer(5)));
        assert!(rule.upstreams().is_empty());
    }

    #[test]
    fn table_replace_keeps_position() {
        let mut table = Table::new();
        table.insert("a", Value::Bool(true));
        table.insert("b", Value::Integer(1));
        table.insert("a", Value::Bool(false));

        let keys: Vec<_> = table.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(table.get("a"), Some(&Value::Bool(false)));
    }

    #[test]
    fn config_upstreams_are_sorted_and_unique() {
        let mut config = RoutingConfig::default();
        for (listen, remote, extra) in [
            ("0.0.0.0:1", "b:1", vec!["a:1"]),
            ("0.0.0.0:2", "a:1", vec![]),
        ] {
            let mut rule = RoutingRule::default();
            rule.set("listen", listen.into());
            rule.set("remote", remote.into());
            rule.extra_remotes = extra.into_iter().map(String::from).collect();
            config.rules.push(rule);
        }

        let upstreams: Vec<_> = config.upstreams().into_iter().collect();
        assert_eq!(upstreams, vec!["a:1", "b:1"]);
    }
}
