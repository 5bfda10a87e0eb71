//! Fixture builders shared by the unit tests across the crate (§4.11).
//! Colocated here instead of duplicated per module, the way the teacher
//! centralizes route construction in `RouteInputInfo`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

use crate::resources::global_configuration::{GlobalConfiguration, Listener, ListenerProtocol};
use crate::resources::ingress::{ACME_HTTP01_SOLVER_LABEL, MERGEABLE_TYPE_ANNOTATION};
use crate::resources::transport_server::{
    TransportServer, TransportServerListenerRef, TransportServerProtocol, TransportServerSpec,
};
use crate::resources::virtual_server::{
    SubRoute, Upstream, VirtualServer, VirtualServerRoute, VirtualServerRouteSpec,
    VirtualServerSpec,
};

pub fn ts(secs: i64) -> Time {
    Time(DateTime::<Utc>::from_timestamp(secs, 0).unwrap())
}

pub fn object_meta(ns: &str, name: &str, uid: &str, created_secs: i64) -> ObjectMeta {
    ObjectMeta {
        namespace: Some(ns.to_string()),
        name: Some(name.to_string()),
        uid: Some(uid.to_string()),
        creation_timestamp: Some(ts(created_secs)),
        generation: Some(1),
        ..Default::default()
    }
}

pub fn with_annotation(mut ingress: Ingress, key: &str, value: &str) -> Ingress {
    ingress
        .metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(key.to_string(), value.to_string());
    ingress
}

pub fn with_label(mut ingress: Ingress, key: &str, value: &str) -> Ingress {
    ingress
        .metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .insert(key.to_string(), value.to_string());
    ingress
}

fn ingress_rule(host: &str, path: &str, service: &str) -> IngressRule {
    IngressRule {
        host: Some(host.to_string()),
        http: Some(HTTPIngressRuleValue {
            paths: vec![HTTPIngressPath {
                path: Some(path.to_string()),
                path_type: "Prefix".to_string(),
                backend: IngressBackend {
                    service: Some(IngressServiceBackend {
                        name: service.to_string(),
                        port: Some(ServiceBackendPort {
                            number: Some(80),
                            name: None,
                        }),
                    }),
                    resource: None,
                },
            }],
        }),
    }
}

/// A regular ingress: `uid = "<name>-uid"`, created at `t=1`.
pub fn build_ingress(ns: &str, name: &str, rules: &[(&str, &str, &str)]) -> Ingress {
    build_ingress_at(ns, name, rules, &format!("{name}-uid"), 1)
}

pub fn build_ingress_at(
    ns: &str,
    name: &str,
    rules: &[(&str, &str, &str)],
    uid: &str,
    created_secs: i64,
) -> Ingress {
    Ingress {
        metadata: object_meta(ns, name, uid, created_secs),
        spec: Some(IngressSpec {
            rules: Some(rules.iter().map(|(h, p, s)| ingress_rule(h, p, s)).collect()),
            ..Default::default()
        }),
        status: None,
    }
}

/// A master ingress: single host, zero paths (§6).
pub fn build_master_ingress(ns: &str, name: &str, host: &str, uid: &str, created_secs: i64) -> Ingress {
    let ingress = Ingress {
        metadata: object_meta(ns, name, uid, created_secs),
        spec: Some(IngressSpec {
            rules: Some(vec![IngressRule {
                host: Some(host.to_string()),
                http: None,
            }]),
            ..Default::default()
        }),
        status: None,
    };
    with_annotation(ingress, MERGEABLE_TYPE_ANNOTATION, "master")
}

pub fn build_minion_ingress(
    ns: &str,
    name: &str,
    host: &str,
    path: &str,
    service: &str,
    uid: &str,
    created_secs: i64,
) -> Ingress {
    let ingress = build_ingress_at(ns, name, &[(host, path, service)], uid, created_secs);
    with_annotation(ingress, MERGEABLE_TYPE_ANNOTATION, "minion")
}

pub fn build_challenge_ingress(
    ns: &str,
    name: &str,
    host: &str,
    path: &str,
    service: &str,
    uid: &str,
    created_secs: i64,
) -> Ingress {
    let ingress = build_ingress_at(ns, name, &[(host, path, service)], uid, created_secs);
    with_label(ingress, ACME_HTTP01_SOLVER_LABEL, "true")
}

pub fn build_vs(ns: &str, name: &str, host: &str, uid: &str, created_secs: i64) -> VirtualServer {
    VirtualServer {
        metadata: object_meta(ns, name, uid, created_secs),
        spec: VirtualServerSpec {
            host: host.to_string(),
            ..Default::default()
        },
    }
}

pub fn build_vsr(
    ns: &str,
    name: &str,
    host: &str,
    subroutes: Vec<SubRoute>,
    upstreams: Vec<Upstream>,
    uid: &str,
    created_secs: i64,
) -> VirtualServerRoute {
    VirtualServerRoute {
        metadata: object_meta(ns, name, uid, created_secs),
        spec: VirtualServerRouteSpec {
            host: host.to_string(),
            upstreams,
            subroutes,
            policies: Vec::new(),
        },
    }
}

pub fn build_ts(
    ns: &str,
    name: &str,
    listener: &str,
    protocol: TransportServerProtocol,
    host: &str,
    uid: &str,
    created_secs: i64,
) -> TransportServer {
    TransportServer {
        metadata: object_meta(ns, name, uid, created_secs),
        spec: TransportServerSpec {
            listener: TransportServerListenerRef {
                name: listener.to_string(),
            },
            protocol,
            host: host.to_string(),
            upstream_service: String::new(),
        },
    }
}

pub fn build_global_configuration(listeners: Vec<Listener>) -> GlobalConfiguration {
    GlobalConfiguration { listeners }
}

pub fn http_listener(name: &str, port: i32, ssl: bool) -> Listener {
    Listener {
        name: name.to_string(),
        port,
        protocol: ListenerProtocol::Http,
        ssl,
        ipv4: "0.0.0.0".to_string(),
        ipv6: "::".to_string(),
    }
}

pub fn tcp_listener(name: &str, port: i32) -> Listener {
    Listener {
        name: name.to_string(),
        port,
        protocol: ListenerProtocol::Tcp,
        ssl: false,
        ipv4: "0.0.0.0".to_string(),
        ipv6: "::".to_string(),
    }
}
