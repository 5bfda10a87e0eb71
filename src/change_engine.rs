//! Change Engine (§2, §4.4): diffs successive ownership maps into an
//! ordered, squashed, delete-before-upsert change list.

use std::collections::{BTreeMap, BTreeSet};

use crate::problem_tracker::{ConfigurationProblem, ProblemReason};
use crate::resources::ResourceRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Delete,
    AddOrUpdate,
}

#[derive(Debug, Clone)]
pub struct ResourceChange {
    pub op: ChangeOp,
    pub resource: ResourceRef,
    pub error: Option<String>,
}

pub struct ChangeEngineOutput {
    pub changes: Vec<ResourceChange>,
    pub problems: Vec<ConfigurationProblem>,
}

/// The four fields whose change alone forces a VS update even when
/// `equals()` otherwise reports no change (§4.4).
fn vs_extra_changed(old: &ResourceRef, new: &ResourceRef) -> bool {
    match (old, new) {
        (ResourceRef::VirtualServer(a), ResourceRef::VirtualServer(b)) => {
            a.http_port != b.http_port
                || a.https_port != b.https_port
                || a.http_ipv4 != b.http_ipv4
                || a.http_ipv6 != b.http_ipv6
        }
        _ => false,
    }
}

/// Diffs one ownership map (`host -> owner key` or `"listener/host" ->
/// owner key`) between two reconciliation states, appending raw, unsquashed
/// changes in sorted-key order.
fn diff_ownership(
    old_owner: &BTreeMap<String, String>,
    new_owner: &BTreeMap<String, String>,
    old_resources: &BTreeMap<String, ResourceRef>,
    new_resources: &BTreeMap<String, ResourceRef>,
    out: &mut Vec<(ChangeOp, ResourceRef)>,
) {
    let keys: BTreeSet<&String> = old_owner.keys().chain(new_owner.keys()).collect();
    for key in keys {
        match (old_owner.get(key), new_owner.get(key)) {
            (Some(old_owner_key), None) => {
                if let Some(r) = old_resources.get(old_owner_key) {
                    out.push((ChangeOp::Delete, r.clone()));
                }
            }
            (None, Some(new_owner_key)) => {
                if let Some(r) = new_resources.get(new_owner_key) {
                    out.push((ChangeOp::AddOrUpdate, r.clone()));
                }
            }
            (Some(old_owner_key), Some(new_owner_key)) => {
                let old_res = old_resources.get(old_owner_key);
                let new_res = new_resources.get(new_owner_key);
                let identity_changed = old_owner_key != new_owner_key;
                let content_changed = match (old_res, new_res) {
                    (Some(o), Some(n)) => !o.equals(n) || vs_extra_changed(o, n),
                    _ => true,
                };
                if identity_changed || content_changed {
                    if identity_changed {
                        if let Some(o) = old_res {
                            out.push((ChangeOp::Delete, o.clone()));
                        }
                    }
                    if let Some(n) = new_res {
                        out.push((ChangeOp::AddOrUpdate, n.clone()));
                    }
                }
            }
            (None, None) => unreachable!("key came from the union of both maps"),
        }
    }
}

/// Groups by resource identity preserving first-seen order, keeping only
/// the last entry per resource, then emits all deletes before all upserts
/// (§4.4, §8).
fn squash_and_order(raw: Vec<(ChangeOp, ResourceRef)>) -> Vec<(ChangeOp, ResourceRef)> {
    let mut last_by_key: BTreeMap<String, usize> = BTreeMap::new();
    for (i, (_, resource)) in raw.iter().enumerate() {
        last_by_key.insert(resource.key(), i);
    }

    let mut order: Vec<String> = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();
    for (_, resource) in &raw {
        let key = resource.key();
        if seen.insert(key.clone()) {
            order.push(key);
        }
    }

    let squashed: Vec<(ChangeOp, ResourceRef)> =
        order.into_iter().map(|key| raw[last_by_key[&key]].clone()).collect();

    let mut deletes: Vec<(ChangeOp, ResourceRef)> =
        squashed.iter().filter(|(op, _)| *op == ChangeOp::Delete).cloned().collect();
    let upserts = squashed.into_iter().filter(|(op, _)| *op == ChangeOp::AddOrUpdate);
    deletes.extend(upserts);
    deletes
}

/// Diffs both the host and listener-host ownership maps between two
/// reconciliation states and produces the final ordered change list plus
/// any unattached validation-error problems (§4.4).
#[allow(clippy::too_many_arguments)]
pub fn diff(
    old_hosts: &BTreeMap<String, String>,
    new_hosts: &BTreeMap<String, String>,
    old_listener_hosts: &BTreeMap<String, String>,
    new_listener_hosts: &BTreeMap<String, String>,
    old_resources: &BTreeMap<String, ResourceRef>,
    new_resources: &BTreeMap<String, ResourceRef>,
    validation_errors: &BTreeMap<String, String>,
) -> ChangeEngineOutput {
    let mut raw = Vec::new();
    diff_ownership(old_hosts, new_hosts, old_resources, new_resources, &mut raw);
    diff_ownership(old_listener_hosts, new_listener_hosts, old_resources, new_resources, &mut raw);

    let ordered = squash_and_order(raw);

    let mut unattached_errors = validation_errors.clone();
    let changes: Vec<ResourceChange> = ordered
        .into_iter()
        .map(|(op, resource)| {
            let key = resource.key();
            let resource = new_resources.get(&key).cloned().unwrap_or(resource);
            let error = unattached_errors.remove(&key);
            ResourceChange { op, resource, error }
        })
        .collect();

    let problems = unattached_errors
        .into_iter()
        .map(|(object_key, message)| ConfigurationProblem {
            object_key,
            is_error: true,
            reason: ProblemReason::Rejected,
            message,
        })
        .collect();

    ChangeEngineOutput { changes, problems }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::resource_key;
    use crate::resources::IngressConfiguration;
    use crate::test_support::*;

    fn empty_map() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[test]
    fn replacing_owner_emits_delete_then_upsert() {
        let ingress = build_ingress_at("a", "a", &[("x.io", "/", "svc")], "a-uid", 2);
        let vs = build_vs("b", "b", "x.io", "b-uid", 1);

        let ingress_key = resource_key("Ingress", "a", "a");
        let vs_key = resource_key("VirtualServer", "b", "b");

        let mut old_hosts = BTreeMap::new();
        old_hosts.insert("x.io".to_string(), ingress_key.clone());
        let mut old_resources = BTreeMap::new();
        old_resources.insert(ingress_key.clone(), ResourceRef::Ingress(IngressConfiguration::regular(ingress)));

        let mut new_hosts = BTreeMap::new();
        new_hosts.insert("x.io".to_string(), vs_key.clone());
        let mut new_resources = BTreeMap::new();
        new_resources.insert(vs_key.clone(), ResourceRef::VirtualServer(crate::resources::virtual_server::VirtualServerConfiguration::new(vs)));

        let output = diff(
            &old_hosts,
            &new_hosts,
            &empty_map(),
            &empty_map(),
            &old_resources,
            &new_resources,
            &BTreeMap::new(),
        );

        assert_eq!(output.changes.len(), 2);
        assert_eq!(output.changes[0].op, ChangeOp::Delete);
        assert_eq!(output.changes[0].resource.key(), ingress_key);
        assert_eq!(output.changes[1].op, ChangeOp::AddOrUpdate);
        assert_eq!(output.changes[1].resource.key(), vs_key);
    }

    #[test]
    fn unattached_validation_error_surfaces_as_problem() {
        let mut errors = BTreeMap::new();
        errors.insert("Ingress/a/ghost".to_string(), "spec rejected by validator".to_string());

        let output = diff(
            &empty_map(),
            &empty_map(),
            &empty_map(),
            &empty_map(),
            &BTreeMap::new(),
            &BTreeMap::new(),
            &errors,
        );

        assert!(output.changes.is_empty());
        assert_eq!(output.problems.len(), 1);
        assert!(output.problems[0].is_error);
        assert_eq!(output.problems[0].reason, ProblemReason::Rejected);
    }

    #[test]
    fn repeated_key_keeps_only_the_last_change() {
        let ingress = build_ingress_at("a", "a", &[("x.io", "/", "svc")], "a-uid", 1);
        let key = resource_key("Ingress", "a", "a");
        let resource = ResourceRef::Ingress(IngressConfiguration::regular(ingress));

        let raw = vec![(ChangeOp::AddOrUpdate, resource.clone()), (ChangeOp::Delete, resource.clone()), (ChangeOp::AddOrUpdate, resource)];
        let squashed = squash_and_order(raw);

        assert_eq!(squashed.len(), 1);
        assert_eq!(squashed[0].0, ChangeOp::AddOrUpdate);
        assert_eq!(squashed[0].1.key(), key);
    }
}
