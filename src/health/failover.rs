//! Failover decision state machine.
//!
//! # State Transitions (per address, one probe result at a time)
//! ```text
//! healthy,   count > 0  → log recovery, count = 0
//! healthy,   any count  → enable-candidate if the address holds backups
//! unhealthy             → count += 1
//!                         disable-candidate once count >= threshold
//!                         and the address is still an active upstream
//! ```
//!
//! # Design Decisions
//! - Counters are per address and independent of each other
//! - An address already removed from the live config is never re-marked
//! - A healthy result resets the count, so one address cannot be both
//!   enable- and disable-candidate in the same cycle

use std::collections::{BTreeSet, HashMap};

use crate::health::probe::ProbeResult;
use crate::mutation::Action;
use crate::state::FailoverState;

/// Addresses to restore and to remove this cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decisions {
    pub enable: BTreeSet<String>,
    pub disable: BTreeSet<String>,
}

impl Decisions {
    pub fn is_empty(&self) -> bool {
        self.enable.is_empty() && self.disable.is_empty()
    }

    /// Mutation plan: every enable before any disable.
    pub fn plan(&self) -> Vec<(Action, String)> {
        self.enable
            .iter()
            .map(|a| (Action::Enable, a.clone()))
            .chain(self.disable.iter().map(|a| (Action::Disable, a.clone())))
            .collect()
    }
}

/// Consecutive-failure counts for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct FailureCounters {
    counts: HashMap<String, u32>,
    threshold: u32,
}

impl FailureCounters {
    pub fn new(threshold: u32) -> Self {
        Self {
            counts: HashMap::new(),
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn count(&self, address: &str) -> u32 {
        self.counts.get(address).copied().unwrap_or(0)
    }

    /// Fold one cycle of probe results into the counters.
    ///
    /// `active` is the set of upstreams in the live routing config and
    /// `state` the persisted failover state, both read after probing.
    pub fn evaluate(
        &mut self,
        results: &[ProbeResult],
        active: &BTreeSet<String>,
        state: &FailoverState,
    ) -> Decisions {
        let mut decisions = Decisions::default();

        for result in results {
            let address = result.address.as_str();

            if result.outcome.is_healthy() {
                let previous = self.counts.insert(address.to_string(), 0).unwrap_or(0);
                if previous > 0 {
                    tracing::info!(address, failures = previous, "Upstream has recovered");
                }
                if state.is_disabled(address) {
                    decisions.enable.insert(address.to_string());
                }
                continue;
            }

            let failures = {
                let count = self.counts.entry(address.to_string()).or_insert(0);
                *count = count.saturating_add(1);
                *count
            };
            tracing::warn!(address, failures, "Upstream failed health check");

            if failures >= self.threshold && active.contains(address) {
                decisions.disable.insert(address.to_string());
            }
        }

        decisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::probe::ProbeOutcome;
    use crate::state::BackupEntry;

    fn result(address: &str, healthy: bool) -> ProbeResult {
        ProbeResult {
            address: address.to_string(),
            outcome: if healthy { ProbeOutcome::Healthy } else { ProbeOutcome::Unhealthy },
        }
    }

    fn active(addresses: &[&str]) -> BTreeSet<String> {
        addresses.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn disables_once_threshold_reached() {
        let mut counters = FailureCounters::new(2);
        let live = active(&["203.0.113.5:443"]);
        let state = FailoverState::new();

        let first = counters.evaluate(&[result("203.0.113.5:443", false)], &live, &state);
        assert!(first.is_empty());
        assert_eq!(counters.count("203.0.113.5:443"), 1);

        let second = counters.evaluate(&[result("203.0.113.5:443", false)], &live, &state);
        assert_eq!(second.disable, active(&["203.0.113.5:443"]));

        // Gone from the live config after the disable: no second trigger.
        let third = counters.evaluate(&[result("203.0.113.5:443", false)], &active(&[]), &state);
        assert!(third.is_empty());
        assert_eq!(counters.count("203.0.113.5:443"), 3);
    }

    #[test]
    fn success_resets_and_enables_disabled_address() {
        let mut counters = FailureCounters::new(2);
        let mut state = FailoverState::new();
        state.push_backup(
            "10.0.0.1:80",
            BackupEntry {
                listen: "0.0.0.0:80".into(),
                original_block: String::new(),
            },
        );

        counters.evaluate(&[result("10.0.0.1:80", false)], &active(&[]), &state);
        let decisions = counters.evaluate(&[result("10.0.0.1:80", true)], &active(&[]), &state);

        assert_eq!(counters.count("10.0.0.1:80"), 0);
        assert_eq!(decisions.enable, active(&["10.0.0.1:80"]));
        assert!(decisions.disable.is_empty());
    }

    #[test]
    fn healthy_unknown_address_is_a_no_op() {
        let mut counters = FailureCounters::new(2);
        let decisions = counters.evaluate(&[result("a:1", true)], &active(&["a:1"]), &FailoverState::new());
        assert!(decisions.is_empty());
        assert_eq!(counters.count("a:1"), 0);
    }

    #[test]
    fn addresses_are_tracked_independently() {
        let mut counters = FailureCounters::new(1);
        let live = active(&["a:1", "b:1", "c:1"]);
        let decisions = counters.evaluate(
            &[result("a:1", false), result("b:1", true), result("c:1", false)],
            &live,
            &FailoverState::new(),
        );
        assert_eq!(decisions.disable, active(&["a:1", "c:1"]));
        assert_eq!(counters.count("b:1"), 0);
    }

    #[test]
    fn plan_orders_enables_first() {
        let decisions = Decisions {
            enable: active(&["z:1"]),
            disable: active(&["a:1"]),
        };
        assert_eq!(
            decisions.plan(),
            vec![(Action::Enable, "z:1".to_string()), (Action::Disable, "a:1".to_string())]
        );
    }
}
