//! Master/Minion Composer (§2, §4.2, §9): groups minion ingresses under
//! their master by host and arbitrates sub-path ownership the same way the
//! host arbiter arbitrates hosts.

use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;

use crate::meta::{resource_key, wins};
use crate::problem_tracker::{ConfigurationProblem, ProblemReason};
use crate::resources::ingress::{host_paths, MinionConfiguration};
use crate::resources::ResourceRef;

/// Attaches eligible minions to their master (mutating the matching entry
/// of `resources` in place) and returns problems for orphaned minions (§3
/// invariant 5).
///
/// `hosts` is the finalized host ownership map (`host -> winning resource
/// key`) produced by the host arbiter; `master_keys` is the set of keys in
/// `resources` that are master ingresses.
pub fn compose(
    resources: &mut BTreeMap<String, ResourceRef>,
    master_keys: &BTreeSet<String>,
    hosts: &BTreeMap<String, String>,
    minions: &BTreeMap<String, Ingress>,
) -> Vec<ConfigurationProblem> {
    let mut by_master: BTreeMap<String, Vec<&Ingress>> = BTreeMap::new();
    let mut problems = Vec::new();

    for (minion_key, minion) in minions {
        let Some(minion_host) = crate::resources::ingress::hosts(minion).into_iter().next() else {
            continue;
        };

        match hosts.get(&minion_host).filter(|k| master_keys.contains(*k)) {
            Some(master_key) => {
                by_master.entry(master_key.clone()).or_default().push(minion);
            }
            None => {
                problems.push(ConfigurationProblem {
                    object_key: minion_key.clone(),
                    is_error: false,
                    reason: ProblemReason::NoIngressMasterFound,
                    message: "Ingress master is invalid or doesn't exist".to_string(),
                });
            }
        }
    }

    for (master_key, mut group) in by_master {
        group.sort_by_key(|m| resource_key("Ingress", &m.namespace().unwrap_or_default(), &m.name_any()));
        let (minion_configs, warnings) = arbitrate_paths(&group);
        if let Some(ResourceRef::Ingress(master)) = resources.get_mut(&master_key) {
            master.minions = minion_configs;
            for (minion_key, msgs) in warnings {
                for msg in msgs {
                    master.add_minion_warning(minion_key.clone(), msg);
                }
            }
        }
    }

    problems
}

/// Claims each minion's paths against every other minion sharing the same
/// master, using the same `wins` ordering as host collisions (§4.1, §9:
/// deterministic iteration fixes tie-breaking).
fn arbitrate_paths(
    minions: &[&Ingress],
) -> (Vec<MinionConfiguration>, BTreeMap<String, Vec<String>>) {
    let mut path_owner: BTreeMap<String, (String, &Ingress)> = BTreeMap::new();
    let mut valid_paths_per_minion: BTreeMap<String, BTreeMap<String, bool>> = BTreeMap::new();
    let mut warnings_per_minion: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for minion in minions {
        let key = resource_key("Ingress", &minion.namespace().unwrap_or_default(), &minion.name_any());
        for (_, path) in host_paths(minion) {
            match path_owner.get(&path).cloned() {
                None => {
                    path_owner.insert(path.clone(), (key.clone(), minion));
                    valid_paths_per_minion.entry(key.clone()).or_default().insert(path, true);
                }
                Some((holder_key, _holder)) if holder_key == key => {
                    valid_paths_per_minion.entry(key.clone()).or_default().insert(path, true);
                }
                Some((holder_key, holder)) => {
                    if minion_wins(minion, holder) {
                        path_owner.insert(path.clone(), (key.clone(), minion));
                        valid_paths_per_minion.entry(key.clone()).or_default().insert(path.clone(), true);
                        valid_paths_per_minion
                            .entry(holder_key.clone())
                            .or_default()
                            .insert(path.clone(), false);
                        warnings_per_minion
                            .entry(holder_key)
                            .or_default()
                            .push(format!("path {path} is taken by another resource"));
                    } else {
                        valid_paths_per_minion.entry(key.clone()).or_default().insert(path.clone(), false);
                        warnings_per_minion
                            .entry(key.clone())
                            .or_default()
                            .push(format!("path {path} is taken by another resource"));
                    }
                }
            }
        }
    }

    let configs = minions
        .iter()
        .map(|minion| {
            let key = resource_key("Ingress", &minion.namespace().unwrap_or_default(), &minion.name_any());
            MinionConfiguration {
                ingress: (*minion).clone(),
                valid_paths: valid_paths_per_minion.remove(&key).unwrap_or_default(),
            }
        })
        .collect();

    (configs, warnings_per_minion)
}

fn minion_wins(a: &Ingress, b: &Ingress) -> bool {
    wins(
        a.metadata.creation_timestamp.as_ref(),
        a.metadata.uid.as_deref().unwrap_or_default(),
        b.metadata.creation_timestamp.as_ref(),
        b.metadata.uid.as_deref().unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::IngressConfiguration;
    use crate::test_support::{build_master_ingress, build_minion_ingress};

    #[test]
    fn minion_attaches_to_master_on_same_host() {
        let master = build_master_ingress("a", "master", "api.example", "master-uid", 1);
        let minion = build_minion_ingress("a", "minion", "api.example", "/foo", "svc", "minion-uid", 2);

        let master_key = resource_key("Ingress", "a", "master");
        let mut resources = BTreeMap::new();
        resources.insert(master_key.clone(), ResourceRef::Ingress(IngressConfiguration::master(master)));

        let mut master_keys = BTreeSet::new();
        master_keys.insert(master_key.clone());

        let mut hosts = BTreeMap::new();
        hosts.insert("api.example".to_string(), master_key.clone());

        let mut minions = BTreeMap::new();
        minions.insert(resource_key("Ingress", "a", "minion"), minion);

        let problems = compose(&mut resources, &master_keys, &hosts, &minions);
        assert!(problems.is_empty());
        let ResourceRef::Ingress(cfg) = resources.get(&master_key).unwrap() else {
            panic!("expected ingress");
        };
        assert_eq!(cfg.minions.len(), 1);
        assert_eq!(cfg.minions[0].valid_paths.get("/foo"), Some(&true));
    }

    #[test]
    fn orphan_minion_without_master_is_reported() {
        let minion = build_minion_ingress("a", "minion", "api.example", "/foo", "svc", "minion-uid", 2);
        let mut resources = BTreeMap::new();
        let master_keys = BTreeSet::new();
        let hosts = BTreeMap::new();
        let mut minions = BTreeMap::new();
        minions.insert(resource_key("Ingress", "a", "minion"), minion);

        let problems = compose(&mut resources, &master_keys, &hosts, &minions);
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].reason, ProblemReason::NoIngressMasterFound);
    }
}
