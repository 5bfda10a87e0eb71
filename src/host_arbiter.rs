//! Host Arbiter (§2, §4.2): builds the `host -> owning resource` map from
//! ingresses, virtual servers and (when enabled) TLS-passthrough transport
//! servers, in three deterministic, lexicographically-sorted passes.

use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::api::networking::v1::Ingress;

use crate::challenge;
use crate::config::StoreConfig;
use crate::master_minion;
use crate::meta::resource_key;
use crate::problem_tracker::{ConfigurationProblem, ProblemReason};
use crate::resources::global_configuration::{GlobalConfiguration, ListenerProtocol};
use crate::resources::ingress::{is_master, is_minion, hosts as ingress_hosts};
use crate::resources::transport_server::TransportServer;
use crate::resources::virtual_server::{RouteEntry, RouteSource, Upstream, VirtualServer, VirtualServerRoute};
use crate::resources::{IngressConfiguration, ResourceRef, TransportServerConfiguration, VirtualServerConfiguration};

pub struct HostArbiterInputs<'a> {
    pub ingresses: &'a BTreeMap<String, Ingress>,
    pub virtual_servers: &'a BTreeMap<String, VirtualServer>,
    pub virtual_server_routes: &'a BTreeMap<String, VirtualServerRoute>,
    pub transport_servers: &'a BTreeMap<String, TransportServer>,
    pub global_configuration: Option<&'a GlobalConfiguration>,
    pub config: &'a StoreConfig,
}

pub struct HostArbiterOutput {
    pub hosts: BTreeMap<String, String>,
    pub problems: Vec<ConfigurationProblem>,
}

/// Claims `host` for `key`, resolving a collision with `wins` (§4.1). The
/// loser's resource (already present in `resources`) gets a warning; a
/// problem is pushed immediately except for ingresses, whose "all hosts
/// taken" problem is decided once every rule host has been claimed.
fn claim_host(
    resources: &mut BTreeMap<String, ResourceRef>,
    hosts: &mut BTreeMap<String, String>,
    problems: &mut Vec<ConfigurationProblem>,
    host: &str,
    key: &str,
) {
    let Some(holder_key) = hosts.get(host).cloned() else {
        hosts.insert(host.to_string(), key.to_string());
        return;
    };
    if holder_key == key {
        return;
    }

    let candidate_wins = {
        let candidate = resources.get(key).expect("candidate registered before claiming a host");
        let holder = resources.get(&holder_key).expect("current holder is tracked in resources");
        candidate.wins(holder)
    };

    let loser_key = if candidate_wins {
        hosts.insert(host.to_string(), key.to_string());
        holder_key
    } else {
        key.to_string()
    };

    let loser_is_ingress = resources.get(&loser_key).map(|r| r.kind()) == Some("Ingress");
    if let Some(loser) = resources.get_mut(&loser_key) {
        loser.add_warning(format!("host {host} is taken by another resource"));
    }
    if !loser_is_ingress {
        problems.push(ConfigurationProblem {
            object_key: loser_key,
            is_error: false,
            reason: ProblemReason::Rejected,
            message: "Host is taken by another resource".to_string(),
        });
    }
}

/// A VSR subroute is only ingested if its path falls under the path the VS
/// delegated to it (§4.2 step 2): equal to the binding's path, or nested
/// beneath it. A binding of `"/"` delegates everything.
fn path_is_delegated(binding_path: &str, subroute_path: &str) -> bool {
    binding_path == "/" || subroute_path == binding_path || subroute_path.starts_with(&format!("{binding_path}/"))
}

/// Resolves a VS listener name against the global configuration: only
/// HTTP-protocol listeners with the expected `ssl` flag are valid (§3
/// invariant 8).
fn resolve_listener(
    gc: Option<&GlobalConfiguration>,
    name: &str,
    expect_ssl: bool,
) -> (Option<i32>, Option<String>, Option<String>, Option<String>) {
    let Some(gc) = gc else {
        return (
            None,
            None,
            None,
            Some("Listeners defined, but no GlobalConfiguration is deployed".to_string()),
        );
    };
    match gc.listener(name) {
        Some(listener) if listener.protocol == ListenerProtocol::Http && listener.ssl == expect_ssl => {
            (Some(listener.port), Some(listener.ipv4.clone()), Some(listener.ipv6.clone()), None)
        }
        _ => (None, None, None, Some(format!("Listener {name} doesn't exist"))),
    }
}

pub fn rebuild(inputs: HostArbiterInputs, resources: &mut BTreeMap<String, ResourceRef>) -> HostArbiterOutput {
    let mut hosts: BTreeMap<String, String> = BTreeMap::new();
    let mut problems: Vec<ConfigurationProblem> = Vec::new();
    let mut master_keys: BTreeSet<String> = BTreeSet::new();
    let mut deferred: BTreeMap<String, Vec<(RouteEntry, Upstream)>> = BTreeMap::new();
    let mut consumed_vsrs: BTreeSet<String> = BTreeSet::new();

    let vs_hosts: BTreeSet<&str> = inputs.virtual_servers.values().map(|vs| vs.spec.host.as_str()).collect();
    let minions: BTreeMap<String, Ingress> = inputs
        .ingresses
        .iter()
        .filter(|(_, ingress)| is_minion(ingress))
        .map(|(key, ingress)| (key.clone(), ingress.clone()))
        .collect();

    // Pass 1: ingresses.
    for (key, ingress) in inputs.ingresses {
        if is_minion(ingress) {
            continue;
        }

        if inputs.config.is_cert_manager_enabled {
            if let Some(host) = ingress_hosts(ingress).into_iter().next() {
                if vs_hosts.contains(host.as_str()) {
                    if let Some((route, upstream)) = challenge::synthesize(&host, ingress) {
                        deferred.entry(host).or_default().push((route, upstream));
                        continue;
                    }
                }
            }
        }

        let cfg = if is_master(ingress) {
            master_keys.insert(key.clone());
            IngressConfiguration::master(ingress.clone())
        } else {
            IngressConfiguration::regular(ingress.clone())
        };
        resources.insert(key.clone(), ResourceRef::Ingress(cfg));

        for host in ingress_hosts(ingress) {
            claim_host(resources, &mut hosts, &mut problems, &host, key);
        }
    }

    // Pass 2: virtual servers.
    for (vs_key, vs) in inputs.virtual_servers {
        let mut cfg = VirtualServerConfiguration::new(vs.clone());

        for binding in &vs.spec.routes {
            let Some((ns, name)) = binding.route.split_once('/') else {
                continue;
            };
            let vsr_key = resource_key("VirtualServerRoute", ns, name);
            let Some(vsr) = inputs.virtual_server_routes.get(&vsr_key) else {
                continue;
            };
            if vsr.spec.host != vs.spec.host {
                cfg.add_warning(format!(
                    "VirtualServerRoute {ns}/{name} host {} does not match VirtualServer host {}",
                    vsr.spec.host, vs.spec.host
                ));
                continue;
            }
            consumed_vsrs.insert(vsr_key);
            cfg.upstreams.extend(vsr.spec.upstreams.iter().cloned());
            for subroute in &vsr.spec.subroutes {
                if !path_is_delegated(&binding.path, &subroute.path) {
                    cfg.add_warning(format!(
                        "VirtualServerRoute {ns}/{name} path {} is not delegated under VirtualServer path {}",
                        subroute.path, binding.path
                    ));
                    continue;
                }
                cfg.routes.push(RouteEntry {
                    path: subroute.path.clone(),
                    action: subroute.action.clone(),
                    source: RouteSource::Vsr { namespace: ns.to_string(), name: name.to_string() },
                });
            }
        }

        if let Some(challenge_routes) = deferred.remove(&vs.spec.host) {
            for (route, upstream) in challenge_routes {
                cfg.routes.push(route);
                cfg.upstreams.push(upstream);
            }
        }

        if let Some(listener_names) = &vs.spec.listener {
            if let Some(http_name) = &listener_names.http {
                let (port, ipv4, ipv6, warning) = resolve_listener(inputs.global_configuration, http_name, false);
                cfg.http_port = port;
                cfg.http_ipv4 = ipv4;
                cfg.http_ipv6 = ipv6;
                if let Some(w) = warning {
                    cfg.add_warning(w);
                }
            }
            if let Some(https_name) = &listener_names.https {
                let (port, ipv4, ipv6, warning) = resolve_listener(inputs.global_configuration, https_name, true);
                cfg.https_port = port;
                cfg.https_ipv4 = ipv4;
                cfg.https_ipv6 = ipv6;
                if let Some(w) = warning {
                    cfg.add_warning(w);
                }
            }
        }

        resources.insert(vs_key.clone(), ResourceRef::VirtualServer(cfg));
        if !vs.spec.host.is_empty() {
            claim_host(resources, &mut hosts, &mut problems, &vs.spec.host, vs_key);
        }
    }

    // Orphan/ignored VSRs (§3 invariant 6, §9 open question on the literal message).
    for (vsr_key, vsr) in inputs.virtual_server_routes {
        if consumed_vsrs.contains(vsr_key) {
            continue;
        }
        let vs_exists_for_host = inputs.virtual_servers.values().any(|vs| vs.spec.host == vsr.spec.host);
        problems.push(ConfigurationProblem {
            object_key: vsr_key.clone(),
            is_error: false,
            reason: if vs_exists_for_host { ProblemReason::Ignored } else { ProblemReason::NoVirtualServerFound },
            message: "VirtualServer is invalid or doesn't exist".to_string(),
        });
    }

    // Pass 3: TLS-passthrough transport servers.
    if inputs.config.tls_passthrough_enabled {
        for (ts_key, ts) in inputs.transport_servers {
            if !ts.is_tls_passthrough() {
                continue;
            }
            let cfg = TransportServerConfiguration::new(ts.clone());
            resources.insert(ts_key.clone(), ResourceRef::TransportServer(cfg));
            if !ts.spec.host.is_empty() {
                claim_host(resources, &mut hosts, &mut problems, &ts.spec.host, ts_key);
            }
        }
    }

    // Finalise validHosts now that the hosts map can no longer change, and
    // emit the ingress "all hosts taken" problem where no rule host won.
    let ingress_keys: Vec<String> = resources
        .iter()
        .filter(|(_, r)| matches!(r, ResourceRef::Ingress(_)))
        .map(|(key, _)| key.clone())
        .collect();
    for key in ingress_keys {
        let rule_hosts = match resources.get(&key) {
            Some(ResourceRef::Ingress(cfg)) => ingress_hosts(&cfg.ingress),
            _ => continue,
        };
        let valid_hosts: BTreeMap<String, bool> =
            rule_hosts.into_iter().map(|host| { let won = hosts.get(&host) == Some(&key); (host, won) }).collect();
        let has_valid_host = !valid_hosts.is_empty() && valid_hosts.values().any(|v| *v);
        let should_reject = !valid_hosts.is_empty() && !has_valid_host;
        if let Some(ResourceRef::Ingress(cfg)) = resources.get_mut(&key) {
            cfg.valid_hosts = valid_hosts;
        }
        if should_reject {
            problems.push(ConfigurationProblem {
                object_key: key,
                is_error: false,
                reason: ProblemReason::Rejected,
                message: "Host is taken by another resource".to_string(),
            });
        }
    }

    problems.extend(master_minion::compose(resources, &master_keys, &hosts, &minions));

    HostArbiterOutput { hosts, problems }
}
