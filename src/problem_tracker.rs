//! Problem Tracker (§2, §4.5): records per-resource error/warning records
//! and emits only the delta against the previous reconciliation, so
//! re-applying the same state yields no output (idempotence, §8).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Closed set of soft-problem reasons (§6, §7). `Rejected` also covers hard
/// validation failures reported outside of a `ResourceChange.error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProblemReason {
    Rejected,
    NoIngressMasterFound,
    NoVirtualServerFound,
    Ignored,
}

/// A structured warning or error about a resource's configuration (§6).
/// `object_key` is the resource's `"Kind/namespace/name"` identity — the
/// core doesn't replicate the full object here; status publication (an
/// out-of-scope collaborator, §1) resolves the key back to the live object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationProblem {
    pub object_key: String,
    pub is_error: bool,
    pub reason: ProblemReason,
    pub message: String,
}

/// Diffs a freshly rebuilt problem set against the previous one and emits
/// only new-or-changed entries (§4.5).
#[derive(Debug, Clone, Default)]
pub struct ProblemTracker {
    host_problems: BTreeMap<String, ConfigurationProblem>,
    listener_problems: BTreeMap<String, ConfigurationProblem>,
}

fn diff(
    old: &BTreeMap<String, ConfigurationProblem>,
    new: &BTreeMap<String, ConfigurationProblem>,
) -> Vec<ConfigurationProblem> {
    new.iter()
        .filter(|(key, problem)| old.get(*key).map(|o| o != *problem).unwrap_or(true))
        .map(|(_, problem)| problem.clone())
        .collect()
}

impl ProblemTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_host_problems(
        &mut self,
        new: BTreeMap<String, ConfigurationProblem>,
    ) -> Vec<ConfigurationProblem> {
        let delta = diff(&self.host_problems, &new);
        self.host_problems = new;
        delta
    }

    pub fn update_listener_problems(
        &mut self,
        new: BTreeMap<String, ConfigurationProblem>,
    ) -> Vec<ConfigurationProblem> {
        let delta = diff(&self.listener_problems, &new);
        self.listener_problems = new;
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem(key: &str, message: &str) -> ConfigurationProblem {
        ConfigurationProblem {
            object_key: key.to_string(),
            is_error: false,
            reason: ProblemReason::Rejected,
            message: message.to_string(),
        }
    }

    #[test]
    fn reapplying_same_state_is_idempotent() {
        let mut tracker = ProblemTracker::new();
        let mut problems = BTreeMap::new();
        problems.insert("VirtualServer/b/b".to_string(), problem("VirtualServer/b/b", "Host is taken by another resource"));

        let first = tracker.update_host_problems(problems.clone());
        assert_eq!(first.len(), 1);

        let second = tracker.update_host_problems(problems);
        assert!(second.is_empty());
    }

    #[test]
    fn orphan_clears_once_resolved() {
        let mut tracker = ProblemTracker::new();
        let mut problems = BTreeMap::new();
        problems.insert(
            "Ingress/a/minion".to_string(),
            ConfigurationProblem {
                object_key: "Ingress/a/minion".to_string(),
                is_error: false,
                reason: ProblemReason::NoIngressMasterFound,
                message: "Ingress master is invalid or doesn't exist".to_string(),
            },
        );
        let first = tracker.update_host_problems(problems);
        assert_eq!(first.len(), 1);

        let resolved = tracker.update_host_problems(BTreeMap::new());
        assert!(resolved.is_empty(), "clearing a problem emits no new problem, just stops reporting it");
    }
}
