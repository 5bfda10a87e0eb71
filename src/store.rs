//! Store Facade (§2, §4.6): the public surface. A single `RwLock` guards
//! every mutable field; a writer rebuilds all derived state before
//! returning, so no partial state is ever observable (§5).

use std::collections::BTreeMap;
use std::sync::RwLock;

use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;

use crate::change_engine::{self, ResourceChange};
use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::host_arbiter::{self, HostArbiterInputs};
use crate::listener_arbiter;
use crate::meta::resource_key;
use crate::problem_tracker::{ConfigurationProblem, ProblemTracker};
use crate::reference_checkers::{
    AppProtectDosProtectedReferenceChecker, AppProtectLogConfReferenceChecker, AppProtectPolicyReferenceChecker,
    PolicyReferenceChecker, ReferenceChecker, SecretReferenceChecker, ServiceReferenceChecker,
    ingress_has_ratelimit_scaling,
};
use crate::resources::global_configuration::GlobalConfiguration;
use crate::resources::transport_server::{TransportServer, TransportServerProtocol};
use crate::resources::virtual_server::{VirtualServer, VirtualServerRoute};
use crate::resources::{IngressConfiguration, ResourceRef};
use crate::validation::{AllowAllIngressClassFilter, IngressClassFilter, NoopValidator, Validator};

/// Boxed per-kind validators supplied at construction (§4.10, §9).
pub struct Validators {
    pub ingress: Box<dyn Validator<Ingress> + Send + Sync>,
    pub virtual_server: Box<dyn Validator<VirtualServer> + Send + Sync>,
    pub virtual_server_route: Box<dyn Validator<VirtualServerRoute> + Send + Sync>,
    pub transport_server: Box<dyn Validator<TransportServer> + Send + Sync>,
    pub global_configuration: Box<dyn Validator<GlobalConfiguration> + Send + Sync>,
}

impl Default for Validators {
    fn default() -> Self {
        Self {
            ingress: Box::new(NoopValidator),
            virtual_server: Box::new(NoopValidator),
            virtual_server_route: Box::new(NoopValidator),
            transport_server: Box::new(NoopValidator),
            global_configuration: Box::new(NoopValidator),
        }
    }
}

/// Boxed per-kind ingress-class predicates (§6). An object the matching
/// filter rejects is evicted from the store as if deleted.
pub struct IngressClassFilters {
    pub ingress: Box<dyn IngressClassFilter<Ingress> + Send + Sync>,
    pub virtual_server: Box<dyn IngressClassFilter<VirtualServer> + Send + Sync>,
    pub virtual_server_route: Box<dyn IngressClassFilter<VirtualServerRoute> + Send + Sync>,
    pub transport_server: Box<dyn IngressClassFilter<TransportServer> + Send + Sync>,
}

impl Default for IngressClassFilters {
    fn default() -> Self {
        Self {
            ingress: Box::new(AllowAllIngressClassFilter),
            virtual_server: Box::new(AllowAllIngressClassFilter),
            virtual_server_route: Box::new(AllowAllIngressClassFilter),
            transport_server: Box::new(AllowAllIngressClassFilter),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ResourceFilter {
    pub ingresses: bool,
    pub virtual_servers: bool,
    pub transport_servers: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TransportServerMetrics {
    pub total_tls_passthrough: usize,
    pub total_tcp: usize,
    pub total_udp: usize,
}

/// Scratch + derived state rebuilt wholesale by every mutator (§9: "mutable
/// aggregates... model them as owned values within the rebuild scratch
/// space, committed to the store at the end of each mutator").
struct State {
    ingresses: BTreeMap<String, Ingress>,
    virtual_servers: BTreeMap<String, VirtualServer>,
    virtual_server_routes: BTreeMap<String, VirtualServerRoute>,
    transport_servers: BTreeMap<String, TransportServer>,
    global_configuration: Option<GlobalConfiguration>,

    resources: BTreeMap<String, ResourceRef>,
    hosts: BTreeMap<String, String>,
    listener_hosts: BTreeMap<String, String>,
    host_problems: ProblemTracker,
    listener_problems: ProblemTracker,
}

impl State {
    fn new() -> Self {
        Self {
            ingresses: BTreeMap::new(),
            virtual_servers: BTreeMap::new(),
            virtual_server_routes: BTreeMap::new(),
            transport_servers: BTreeMap::new(),
            global_configuration: None,
            resources: BTreeMap::new(),
            hosts: BTreeMap::new(),
            listener_hosts: BTreeMap::new(),
            host_problems: ProblemTracker::new(),
            listener_problems: ProblemTracker::new(),
        }
    }

    /// Rebuilds `resources`, `hosts` and `listener_hosts` from scratch and
    /// returns the change list plus every newly surfaced problem (§4.2,
    /// §4.3, §4.4, §4.5). `validation_errors` carries this call's rejected
    /// resource, if any, keyed by `"Kind/ns/name"` (§4.4 error attachment).
    fn rebuild(&mut self, config: &StoreConfig, validation_errors: &BTreeMap<String, String>) -> (Vec<ResourceChange>, Vec<ConfigurationProblem>) {
        let old_resources = self.resources.clone();
        let old_hosts = self.hosts.clone();
        let old_listener_hosts = self.listener_hosts.clone();

        let mut resources = BTreeMap::new();
        let listener_output = listener_arbiter::rebuild(&self.transport_servers, self.global_configuration.as_ref(), &mut resources);

        let inputs = HostArbiterInputs {
            ingresses: &self.ingresses,
            virtual_servers: &self.virtual_servers,
            virtual_server_routes: &self.virtual_server_routes,
            transport_servers: &self.transport_servers,
            global_configuration: self.global_configuration.as_ref(),
            config,
        };
        let host_output = host_arbiter::rebuild(inputs, &mut resources);

        let change_output = change_engine::diff(
            &old_hosts,
            &host_output.hosts,
            &old_listener_hosts,
            &listener_output.listener_hosts,
            &old_resources,
            &resources,
            validation_errors,
        );

        self.resources = resources;
        self.hosts = host_output.hosts;
        self.listener_hosts = listener_output.listener_hosts;

        let mut host_problem_map: BTreeMap<String, ConfigurationProblem> =
            host_output.problems.into_iter().map(|p| (p.object_key.clone(), p)).collect();
        for problem in &change_output.problems {
            host_problem_map.entry(problem.object_key.clone()).or_insert_with(|| problem.clone());
        }
        let listener_problem_map: BTreeMap<String, ConfigurationProblem> =
            listener_output.problems.into_iter().map(|p| (p.object_key.clone(), p)).collect();

        let mut problems = self.host_problems.update_host_problems(host_problem_map);
        problems.extend(self.listener_problems.update_listener_problems(listener_problem_map));

        (change_output.changes, problems)
    }
}

/// The single-writer, many-reader configuration reconciliation store (§2,
/// §5). Cloning is not supported; share a `Store` behind an `Arc`.
pub struct Store {
    config: StoreConfig,
    validators: Validators,
    class_filters: IngressClassFilters,
    state: RwLock<State>,
}

impl Store {
    pub fn new(config: StoreConfig, validators: Validators, class_filters: IngressClassFilters) -> Self {
        Self { config, validators, class_filters, state: RwLock::new(State::new()) }
    }

    #[tracing::instrument(skip(self, ingress), fields(namespace = ingress.namespace(), name = ingress.name_any()))]
    pub fn add_or_update_ingress(&self, ingress: Ingress) -> (Vec<ResourceChange>, Vec<ConfigurationProblem>) {
        let namespace = ingress.namespace().unwrap_or_default();
        let name = ingress.name_any();
        let key = resource_key("Ingress", &namespace, &name);

        let mut state = self.state.write().expect("store lock poisoned");
        let mut errors = BTreeMap::new();

        if !self.class_filters.ingress.matches(&ingress) {
            state.ingresses.remove(&key);
        } else if let Err(message) = self.validators.ingress.validate(&ingress) {
            tracing::warn!(%key, %message, "ingress rejected by validator");
            state.ingresses.remove(&key);
            errors.insert(key, message);
        } else {
            state.ingresses.insert(key, ingress);
        }

        state.rebuild(&self.config, &errors)
    }

    pub fn delete_ingress(&self, namespace: &str, name: &str) -> (Vec<ResourceChange>, Vec<ConfigurationProblem>) {
        let key = resource_key("Ingress", namespace, name);
        let mut state = self.state.write().expect("store lock poisoned");
        if state.ingresses.remove(&key).is_none() {
            return (Vec::new(), Vec::new());
        }
        state.rebuild(&self.config, &BTreeMap::new())
    }

    #[tracing::instrument(skip(self, vs), fields(namespace = vs.metadata.namespace.clone().unwrap_or_default(), name = vs.metadata.name.clone().unwrap_or_default()))]
    pub fn add_or_update_virtual_server(&self, vs: VirtualServer) -> (Vec<ResourceChange>, Vec<ConfigurationProblem>) {
        let namespace = vs.metadata.namespace.clone().unwrap_or_default();
        let name = vs.metadata.name.clone().unwrap_or_default();
        let key = resource_key("VirtualServer", &namespace, &name);

        let mut state = self.state.write().expect("store lock poisoned");
        let mut errors = BTreeMap::new();

        if !self.class_filters.virtual_server.matches(&vs) {
            state.virtual_servers.remove(&key);
        } else if let Err(message) = self.validators.virtual_server.validate(&vs) {
            tracing::warn!(%key, %message, "virtual server rejected by validator");
            state.virtual_servers.remove(&key);
            errors.insert(key, message);
        } else {
            state.virtual_servers.insert(key, vs);
        }

        state.rebuild(&self.config, &errors)
    }

    pub fn delete_virtual_server(&self, namespace: &str, name: &str) -> (Vec<ResourceChange>, Vec<ConfigurationProblem>) {
        let key = resource_key("VirtualServer", namespace, name);
        let mut state = self.state.write().expect("store lock poisoned");
        if state.virtual_servers.remove(&key).is_none() {
            return (Vec::new(), Vec::new());
        }
        state.rebuild(&self.config, &BTreeMap::new())
    }

    pub fn add_or_update_virtual_server_route(&self, vsr: VirtualServerRoute) -> (Vec<ResourceChange>, Vec<ConfigurationProblem>) {
        let namespace = vsr.metadata.namespace.clone().unwrap_or_default();
        let name = vsr.metadata.name.clone().unwrap_or_default();
        let key = resource_key("VirtualServerRoute", &namespace, &name);

        let mut state = self.state.write().expect("store lock poisoned");
        let mut errors = BTreeMap::new();

        if !self.class_filters.virtual_server_route.matches(&vsr) {
            state.virtual_server_routes.remove(&key);
        } else if let Err(message) = self.validators.virtual_server_route.validate(&vsr) {
            tracing::warn!(%key, %message, "virtual server route rejected by validator");
            state.virtual_server_routes.remove(&key);
            errors.insert(key, message);
        } else {
            state.virtual_server_routes.insert(key, vsr);
        }

        state.rebuild(&self.config, &errors)
    }

    pub fn delete_virtual_server_route(&self, namespace: &str, name: &str) -> (Vec<ResourceChange>, Vec<ConfigurationProblem>) {
        let key = resource_key("VirtualServerRoute", namespace, name);
        let mut state = self.state.write().expect("store lock poisoned");
        if state.virtual_server_routes.remove(&key).is_none() {
            return (Vec::new(), Vec::new());
        }
        state.rebuild(&self.config, &BTreeMap::new())
    }

    pub fn add_or_update_transport_server(&self, ts: TransportServer) -> (Vec<ResourceChange>, Vec<ConfigurationProblem>) {
        let namespace = ts.metadata.namespace.clone().unwrap_or_default();
        let name = ts.metadata.name.clone().unwrap_or_default();
        let key = resource_key("TransportServer", &namespace, &name);

        let mut state = self.state.write().expect("store lock poisoned");
        let mut errors = BTreeMap::new();

        if !self.class_filters.transport_server.matches(&ts) {
            state.transport_servers.remove(&key);
        } else if let Err(message) = self.validators.transport_server.validate(&ts) {
            tracing::warn!(%key, %message, "transport server rejected by validator");
            state.transport_servers.remove(&key);
            errors.insert(key, message);
        } else {
            state.transport_servers.insert(key, ts);
        }

        state.rebuild(&self.config, &errors)
    }

    pub fn delete_transport_server(&self, namespace: &str, name: &str) -> (Vec<ResourceChange>, Vec<ConfigurationProblem>) {
        let key = resource_key("TransportServer", namespace, name);
        let mut state = self.state.write().expect("store lock poisoned");
        if state.transport_servers.remove(&key).is_none() {
            return (Vec::new(), Vec::new());
        }
        state.rebuild(&self.config, &BTreeMap::new())
    }

    /// Performs both the listener rebuild and the host rebuild, since VS
    /// listener resolution depends on the global configuration (§4.6).
    pub fn add_or_update_global_configuration(&self, gc: GlobalConfiguration) -> (Vec<ResourceChange>, Vec<ConfigurationProblem>, Option<String>) {
        let mut state = self.state.write().expect("store lock poisoned");
        if let Err(message) = self.validators.global_configuration.validate(&gc) {
            tracing::warn!(%message, "global configuration rejected by validator");
            return (Vec::new(), Vec::new(), Some(message));
        }
        state.global_configuration = Some(gc);
        let (changes, problems) = state.rebuild(&self.config, &BTreeMap::new());
        (changes, problems, None)
    }

    pub fn delete_global_configuration(&self) -> (Vec<ResourceChange>, Vec<ConfigurationProblem>) {
        let mut state = self.state.write().expect("store lock poisoned");
        if state.global_configuration.take().is_none() {
            return (Vec::new(), Vec::new());
        }
        state.rebuild(&self.config, &BTreeMap::new())
    }

    pub fn get_global_configuration(&self) -> Option<GlobalConfiguration> {
        self.state.read().expect("store lock poisoned").global_configuration.clone()
    }

    /// Active resources matching `filter`, sorted and deduplicated by
    /// identity key (§4.6).
    pub fn get_resources(&self, filter: ResourceFilter) -> Vec<ResourceRef> {
        let state = self.state.read().expect("store lock poisoned");
        let mut seen = std::collections::BTreeSet::new();
        let mut out = Vec::new();

        for resource in state.resources.values() {
            let include = match resource {
                ResourceRef::Ingress(_) => filter.ingresses,
                ResourceRef::VirtualServer(_) => filter.virtual_servers,
                ResourceRef::TransportServer(_) => filter.transport_servers,
            };
            if include && seen.insert(resource.key()) {
                out.push(resource.clone());
            }
        }
        out.sort_by_key(|r| r.key());
        out
    }

    /// Rejects with [`CoreError::EmptyReverseLookupKey`] rather than silently
    /// returning no matches; an empty namespace/name pair is always a caller
    /// bug, never a legitimate lookup (§4.7).
    fn find_resources(&self, checker: &dyn ReferenceChecker, namespace: &str, name: &str) -> CoreResult<Vec<ResourceRef>> {
        if namespace.is_empty() || name.is_empty() {
            return Err(CoreError::EmptyReverseLookupKey(namespace.to_string(), name.to_string()));
        }
        let state = self.state.read().expect("store lock poisoned");
        Ok(state.resources.values().filter(|r| checker.references(r, namespace, name)).cloned().collect())
    }

    pub fn find_resources_for_service(&self, namespace: &str, name: &str) -> CoreResult<Vec<ResourceRef>> {
        self.find_resources(&ServiceReferenceChecker, namespace, name)
    }

    /// Endpoint changes affect exactly the resources that reference the
    /// owning Service (§1: endpoint resolution is an out-of-scope
    /// collaborator, so this is the same predicate as the Service checker).
    pub fn find_resources_for_endpoints(&self, namespace: &str, name: &str) -> CoreResult<Vec<ResourceRef>> {
        self.find_resources(&ServiceReferenceChecker, namespace, name)
    }

    pub fn find_resources_for_secret(&self, namespace: &str, name: &str) -> CoreResult<Vec<ResourceRef>> {
        self.find_resources(&SecretReferenceChecker, namespace, name)
    }

    pub fn find_resources_for_policy(&self, namespace: &str, name: &str) -> CoreResult<Vec<ResourceRef>> {
        self.find_resources(&PolicyReferenceChecker, namespace, name)
    }

    pub fn find_resources_for_app_protect_policy_annotation(&self, namespace: &str, name: &str) -> CoreResult<Vec<ResourceRef>> {
        self.find_resources(&AppProtectPolicyReferenceChecker, namespace, name)
    }

    pub fn find_resources_for_app_protect_log_conf_annotation(&self, namespace: &str, name: &str) -> CoreResult<Vec<ResourceRef>> {
        self.find_resources(&AppProtectLogConfReferenceChecker, namespace, name)
    }

    pub fn find_resources_for_app_protect_dos_protected(&self, namespace: &str, name: &str) -> CoreResult<Vec<ResourceRef>> {
        self.find_resources(&AppProtectDosProtectedReferenceChecker, namespace, name)
    }

    pub fn find_ingresses_with_ratelimit_scaling(&self) -> Vec<IngressConfiguration> {
        let state = self.state.read().expect("store lock poisoned");
        state
            .resources
            .values()
            .filter_map(|r| match r {
                ResourceRef::Ingress(cfg) if ingress_has_ratelimit_scaling(&cfg.ingress) => Some(cfg.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn get_transport_server_metrics(&self) -> TransportServerMetrics {
        let state = self.state.read().expect("store lock poisoned");
        let mut metrics = TransportServerMetrics::default();
        for ts in state.transport_servers.values() {
            if ts.is_tls_passthrough() {
                metrics.total_tls_passthrough += 1;
            } else {
                match ts.spec.protocol {
                    TransportServerProtocol::Tcp => metrics.total_tcp += 1,
                    TransportServerProtocol::Udp => metrics.total_udp += 1,
                    TransportServerProtocol::TlsPassthrough => metrics.total_tls_passthrough += 1,
                }
            }
        }
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change_engine::ChangeOp;
    use crate::test_support::*;

    fn store() -> Store {
        Store::new(StoreConfig::new(), Validators::default(), IngressClassFilters::default())
    }

    #[test]
    fn host_collision_older_ingress_wins() {
        let store = store();
        let ingress = build_ingress_at("a", "a", &[("x.io", "/", "svc")], "a-uid", 1);
        let vs = build_vs("b", "b", "x.io", "b-uid", 2);

        store.add_or_update_ingress(ingress);
        let (changes, problems) = store.add_or_update_virtual_server(vs);

        // The ingress already owned "x.io" before and after this mutation, so
        // there is no ownership change to report; the losing VS never became
        // an owner and so never enters the change list, only the problem set.
        assert!(changes.is_empty());
        assert!(problems.iter().any(|p| p.object_key == resource_key("VirtualServer", "b", "b")));
    }

    #[test]
    fn add_then_delete_round_trips_to_empty_store() {
        let store = store();
        let ingress = build_ingress("a", "a", &[("x.io", "/", "svc")]);
        store.add_or_update_ingress(ingress);
        let (changes, _) = store.delete_ingress("a", "a");

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].op, ChangeOp::Delete);
        assert!(store.get_resources(ResourceFilter { ingresses: true, virtual_servers: true, transport_servers: true }).is_empty());
    }

    #[test]
    fn delete_of_unknown_key_is_a_no_op() {
        let store = store();
        let (changes, problems) = store.delete_ingress("missing", "missing");
        assert!(changes.is_empty());
        assert!(problems.is_empty());
    }

    #[test]
    fn reapplying_same_mutation_is_idempotent() {
        let store = store();
        let ingress = build_ingress("a", "a", &[("x.io", "/", "svc")]);
        let (first_changes, first_problems) = store.add_or_update_ingress(ingress.clone());
        assert_eq!(first_changes.len(), 1);
        assert!(first_problems.is_empty());

        let (second_changes, second_problems) = store.add_or_update_ingress(ingress);
        assert!(second_changes.is_empty());
        assert!(second_problems.is_empty());
    }

    #[test]
    fn orphan_minion_then_master_clears_the_problem() {
        let store = store();
        let minion = build_minion_ingress("a", "minion", "api.example", "/foo", "svc", "minion-uid", 2);
        let (_, problems) = store.add_or_update_ingress(minion);
        assert!(problems.iter().any(|p| p.reason == crate::problem_tracker::ProblemReason::NoIngressMasterFound));

        let master = build_master_ingress("a", "master", "api.example", "master-uid", 1);
        let (_, problems) = store.add_or_update_ingress(master);
        assert!(!problems.iter().any(|p| p.reason == crate::problem_tracker::ProblemReason::NoIngressMasterFound));

        let ResourceRef::Ingress(cfg) = store
            .get_resources(ResourceFilter { ingresses: true, virtual_servers: false, transport_servers: false })
            .into_iter()
            .find(|r| r.key() == resource_key("Ingress", "a", "master"))
            .unwrap()
        else {
            panic!("expected ingress");
        };
        assert_eq!(cfg.minions.len(), 1);
    }

    #[test]
    fn find_resources_for_service_rejects_empty_key() {
        let store = store();
        let err = store.find_resources_for_service("", "svc").unwrap_err();
        assert!(matches!(err, crate::error::CoreError::EmptyReverseLookupKey(_, _)));
        let err = store.find_resources_for_service("ns", "").unwrap_err();
        assert!(matches!(err, crate::error::CoreError::EmptyReverseLookupKey(_, _)));
    }

    #[test]
    fn global_configuration_removal_clears_vs_listener_ports() {
        let store = store();
        let mut vs = build_vs("default", "site", "foo.com", "vs-uid", 1);
        vs.spec.listener = Some(crate::resources::virtual_server::VirtualServerListenerNames {
            http: Some("http-80".to_string()),
            https: None,
        });
        let gc = build_global_configuration(vec![http_listener("http-80", 80, false)]);

        store.add_or_update_global_configuration(gc);
        store.add_or_update_virtual_server(vs);

        let (changes, _) = store.delete_global_configuration();
        assert_eq!(changes.len(), 1);
        let ResourceRef::VirtualServer(cfg) = &changes[0].resource else {
            panic!("expected virtual server");
        };
        assert_eq!(cfg.http_port, None);
        assert!(cfg.warnings.iter().any(|w| w.contains("no GlobalConfiguration is deployed")));
    }
}
