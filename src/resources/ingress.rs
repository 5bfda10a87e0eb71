//! `Ingress` helpers and the derived `IngressConfiguration` /
//! `MinionConfiguration` the host arbiter and master/minion composer build
//! (§3, §4.2, §6).

use std::collections::BTreeMap;

use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};

/// `nginx.org/mergeable-ingress-type: master|minion` marks an ingress as
/// part of a master/minion decomposition (§6).
pub const MERGEABLE_TYPE_ANNOTATION: &str = "nginx.org/mergeable-ingress-type";
/// cert-manager's HTTP-01 solver label (§4.2, §6).
pub const ACME_HTTP01_SOLVER_LABEL: &str = "acme.cert-manager.io/http01-solver";

fn mergeable_type(ingress: &Ingress) -> Option<&str> {
    ingress
        .metadata
        .annotations
        .as_ref()?
        .get(MERGEABLE_TYPE_ANNOTATION)
        .map(String::as_str)
}

/// Distinct, order-preserving rule hosts, skipping empty ones.
pub fn hosts(ingress: &Ingress) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for rule in ingress.spec.iter().flat_map(|s| s.rules.iter().flatten()) {
        if let Some(host) = rule.host.as_ref().filter(|h| !h.is_empty()) {
            if seen.insert(host.clone()) {
                out.push(host.clone());
            }
        }
    }
    out
}

fn total_paths(ingress: &Ingress) -> usize {
    ingress
        .spec
        .iter()
        .flat_map(|s| s.rules.iter().flatten())
        .flat_map(|rule| rule.http.iter())
        .flat_map(|http| http.paths.iter())
        .count()
}

/// All `(host, path)` pairs declared by the ingress rules.
pub fn host_paths(ingress: &Ingress) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for rule in ingress.spec.iter().flat_map(|s| s.rules.iter().flatten()) {
        let Some(host) = rule.host.as_ref().filter(|h| !h.is_empty()) else {
            continue;
        };
        for path in rule.http.iter().flat_map(|http| http.paths.iter()) {
            out.push((host.clone(), path.path.clone().unwrap_or_default()));
        }
    }
    out
}

/// A single host and zero paths (paths are contributed by minions) (§6).
pub fn is_master(ingress: &Ingress) -> bool {
    mergeable_type(ingress) == Some("master") && hosts(ingress).len() == 1 && total_paths(ingress) == 0
}

/// Declares a master via the mergeable-ingress-type annotation (§6).
pub fn is_minion(ingress: &Ingress) -> bool {
    mergeable_type(ingress) == Some("minion")
}

/// An ephemeral ACME HTTP-01 solver ingress eligible for challenge
/// synthesis (§4.2 step 1), gated on `is_cert_manager_enabled` by the
/// caller.
pub fn is_challenge_ingress(ingress: &Ingress) -> bool {
    ingress
        .metadata
        .labels
        .as_ref()
        .and_then(|l| l.get(ACME_HTTP01_SOLVER_LABEL))
        .map(|v| v == "true")
        .unwrap_or(false)
}

/// Structural equality per §4.1: for ingresses, annotations matter too
/// (the spec's renderer reads config-bearing annotations).
pub fn ingress_spec_equals(a: &Ingress, b: &Ingress) -> bool {
    a.metadata.generation == b.metadata.generation
        && a.metadata.annotations == b.metadata.annotations
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinionConfiguration {
    pub ingress: Ingress,
    pub valid_paths: BTreeMap<String, bool>,
}

impl MinionConfiguration {
    pub fn key(&self) -> String {
        crate::meta::resource_key("Ingress", &self.ingress.namespace().unwrap_or_default(), &self.ingress.name_any())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngressConfiguration {
    pub ingress: Ingress,
    pub is_master: bool,
    pub minions: Vec<MinionConfiguration>,
    pub valid_hosts: BTreeMap<String, bool>,
    pub warnings: Vec<String>,
    /// Warnings attached to individual minions, keyed by `"namespace/name"`.
    pub child_warnings: BTreeMap<String, Vec<String>>,
}

impl IngressConfiguration {
    pub fn regular(ingress: Ingress) -> Self {
        Self {
            ingress,
            is_master: false,
            minions: Vec::new(),
            valid_hosts: BTreeMap::new(),
            warnings: Vec::new(),
            child_warnings: BTreeMap::new(),
        }
    }

    pub fn master(ingress: Ingress) -> Self {
        Self {
            ingress,
            is_master: true,
            minions: Vec::new(),
            valid_hosts: BTreeMap::new(),
            warnings: Vec::new(),
            child_warnings: BTreeMap::new(),
        }
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn add_minion_warning(&mut self, minion_key: impl Into<String>, message: impl Into<String>) {
        self.child_warnings
            .entry(minion_key.into())
            .or_default()
            .push(message.into());
    }

    /// At least one valid host suppresses the "all hosts taken" problem
    /// (§4.2).
    pub fn has_any_valid_host(&self) -> bool {
        self.valid_hosts.values().any(|v| *v)
    }

    /// §4.1: ingress equality additionally compares `validHosts` and the
    /// ordered list of minion metadata-with-annotations.
    pub fn equals(&self, other: &Self) -> bool {
        self.is_master == other.is_master
            && ingress_spec_equals(&self.ingress, &other.ingress)
            && self.valid_hosts == other.valid_hosts
            && self.minions.len() == other.minions.len()
            && self
                .minions
                .iter()
                .zip(other.minions.iter())
                .all(|(a, b)| ingress_spec_equals(&a.ingress, &b.ingress))
    }
}
