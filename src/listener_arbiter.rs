//! Listener Arbiter (§2, §4.3): builds the `(listener, host) -> transport
//! server` map for TCP/UDP listeners declared by the global configuration.
//! TLS-passthrough transport servers never reach this pass (§4.2 handles
//! them as host owners instead).

use std::collections::BTreeMap;

use crate::problem_tracker::{ConfigurationProblem, ProblemReason};
use crate::resources::global_configuration::{GlobalConfiguration, ListenerProtocol};
use crate::resources::transport_server::{TransportServer, TransportServerProtocol};
use crate::resources::{ResourceRef, TransportServerConfiguration};

pub struct ListenerArbiterOutput {
    pub listener_hosts: BTreeMap<String, String>,
    pub problems: Vec<ConfigurationProblem>,
}

fn protocol_matches(ts: TransportServerProtocol, listener: ListenerProtocol) -> bool {
    matches!(
        (ts, listener),
        (TransportServerProtocol::Tcp, ListenerProtocol::Tcp) | (TransportServerProtocol::Udp, ListenerProtocol::Udp)
    )
}

fn claim_listener_host(
    resources: &mut BTreeMap<String, ResourceRef>,
    listener_hosts: &mut BTreeMap<String, String>,
    problems: &mut Vec<ConfigurationProblem>,
    listener_name: &str,
    host: &str,
    lh_key: &str,
    key: &str,
) {
    let Some(holder_key) = listener_hosts.get(lh_key).cloned() else {
        listener_hosts.insert(lh_key.to_string(), key.to_string());
        return;
    };
    if holder_key == key {
        return;
    }

    let candidate_wins = {
        let candidate = resources.get(key).expect("candidate registered before claiming a listener/host");
        let holder = resources.get(&holder_key).expect("current holder is tracked in resources");
        candidate.wins(holder)
    };

    let loser_key = if candidate_wins {
        listener_hosts.insert(lh_key.to_string(), key.to_string());
        holder_key
    } else {
        key.to_string()
    };

    if let Some(loser) = resources.get_mut(&loser_key) {
        loser.add_warning(format!("listener {listener_name} and host {host} are taken by another resource"));
    }
    problems.push(ConfigurationProblem {
        object_key: loser_key,
        is_error: false,
        reason: ProblemReason::Rejected,
        message: format!("Listener {listener_name} with host {host} is taken by another resource"),
    });
}

/// Rebuilds the `(listener, host)` ownership map and inserts a
/// `TransportServerConfiguration` into `resources` for every non-passthrough
/// TS, whether or not its listener resolved.
pub fn rebuild(
    transport_servers: &BTreeMap<String, TransportServer>,
    global_configuration: Option<&GlobalConfiguration>,
    resources: &mut BTreeMap<String, ResourceRef>,
) -> ListenerArbiterOutput {
    let mut listener_hosts = BTreeMap::new();
    let mut problems = Vec::new();

    for (key, ts) in transport_servers {
        if ts.is_tls_passthrough() {
            continue;
        }

        let mut cfg = TransportServerConfiguration::new(ts.clone());
        let listener_name = ts.spec.listener.name.clone();

        let listener = global_configuration.and_then(|gc| gc.listener(&listener_name));
        let Some(listener) = listener else {
            problems.push(ConfigurationProblem {
                object_key: key.clone(),
                is_error: false,
                reason: ProblemReason::Rejected,
                message: format!("Listener {listener_name} doesn't exist"),
            });
            resources.insert(key.clone(), ResourceRef::TransportServer(cfg));
            continue;
        };

        // §9 open question: a protocol mismatch silently drops the TS from
        // the listener-host map rather than producing a problem.
        if !protocol_matches(ts.spec.protocol, listener.protocol) {
            resources.insert(key.clone(), ResourceRef::TransportServer(cfg));
            continue;
        }

        cfg.listener_port = Some(listener.port);
        cfg.ipv4 = Some(listener.ipv4.clone());
        cfg.ipv6 = Some(listener.ipv6.clone());
        resources.insert(key.clone(), ResourceRef::TransportServer(cfg));

        let lh_key = format!("{listener_name}/{}", ts.spec.host);
        claim_listener_host(resources, &mut listener_hosts, &mut problems, &listener_name, &ts.spec.host, &lh_key, key);
    }

    ListenerArbiterOutput { listener_hosts, problems }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::resource_key;
    use crate::resources::transport_server::TransportServerProtocol;
    use crate::test_support::*;

    #[test]
    fn listener_claim_tie_breaks_on_greater_uid() {
        let ts_a = build_ts("a", "a", "tcp-9000", TransportServerProtocol::Tcp, "", "uid-a", 100);
        let ts_b = build_ts("b", "b", "tcp-9000", TransportServerProtocol::Tcp, "", "uid-b", 100);
        let gc = build_global_configuration(vec![tcp_listener("tcp-9000", 9000)]);

        let mut transport_servers = BTreeMap::new();
        transport_servers.insert(resource_key("TransportServer", "a", "a"), ts_a);
        transport_servers.insert(resource_key("TransportServer", "b", "b"), ts_b);

        let mut resources = BTreeMap::new();
        let output = rebuild(&transport_servers, Some(&gc), &mut resources);

        let winner_key = resource_key("TransportServer", "b", "b");
        let loser_key = resource_key("TransportServer", "a", "a");
        assert_eq!(output.listener_hosts.get("tcp-9000/"), Some(&winner_key));
        assert!(output.problems.iter().any(|p| p.object_key == loser_key));

        let ResourceRef::TransportServer(loser_cfg) = resources.get(&loser_key).unwrap() else {
            panic!("expected transport server");
        };
        assert!(loser_cfg.warnings.iter().any(|w| w.contains("taken by another resource")));
    }

    #[test]
    fn missing_listener_is_rejected() {
        let ts = build_ts("a", "a", "tcp-9000", TransportServerProtocol::Tcp, "", "uid-a", 1);
        let mut transport_servers = BTreeMap::new();
        let key = resource_key("TransportServer", "a", "a");
        transport_servers.insert(key.clone(), ts);

        let mut resources = BTreeMap::new();
        let output = rebuild(&transport_servers, None, &mut resources);

        assert!(output
            .problems
            .iter()
            .any(|p| p.object_key == key && p.message == "Listener tcp-9000 doesn't exist"));
    }

    #[test]
    fn protocol_mismatch_is_silently_dropped() {
        let ts = build_ts("a", "a", "tcp-9000", TransportServerProtocol::Udp, "", "uid-a", 1);
        let gc = build_global_configuration(vec![tcp_listener("tcp-9000", 9000)]);
        let mut transport_servers = BTreeMap::new();
        let key = resource_key("TransportServer", "a", "a");
        transport_servers.insert(key.clone(), ts);

        let mut resources = BTreeMap::new();
        let output = rebuild(&transport_servers, Some(&gc), &mut resources);

        assert!(output.problems.is_empty());
        assert!(output.listener_hosts.is_empty());
        assert!(resources.contains_key(&key));
    }
}
