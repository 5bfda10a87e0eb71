//! `TransportServer` input type and its derived configuration (§3, §4.3).

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

/// Sentinel listener name that marks a TS as TLS-passthrough rather than
/// bound to a named TCP/UDP listener from the global configuration (§4.2
/// step 3, §9 open question).
pub const TLS_PASSTHROUGH_LISTENER_NAME: &str = "tls-passthrough";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportServerProtocol {
    TlsPassthrough,
    Tcp,
    Udp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportServerListenerRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportServerSpec {
    pub listener: TransportServerListenerRef,
    pub protocol: TransportServerProtocol,
    /// Empty for a TCP/UDP TS that does not discriminate by host.
    #[serde(default)]
    pub host: String,
    /// Service name this TS proxies to; used by `FindResourcesForService`.
    #[serde(default)]
    pub upstream_service: String,
}

/// Either TLS-passthrough (host-owning, like a VS) or bound to a named
/// TCP/UDP listener (owns `(listener, host)`) (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportServer {
    pub metadata: ObjectMeta,
    pub spec: TransportServerSpec,
}

impl TransportServer {
    pub fn is_tls_passthrough(&self) -> bool {
        self.spec.protocol == TransportServerProtocol::TlsPassthrough
            && self.spec.listener.name == TLS_PASSTHROUGH_LISTENER_NAME
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportServerConfiguration {
    pub ts: TransportServer,
    pub listener_port: Option<i32>,
    pub ipv4: Option<String>,
    pub ipv6: Option<String>,
    pub warnings: Vec<String>,
}

impl TransportServerConfiguration {
    pub fn new(ts: TransportServer) -> Self {
        Self {
            ts,
            listener_port: None,
            ipv4: None,
            ipv6: None,
            warnings: Vec::new(),
        }
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}
