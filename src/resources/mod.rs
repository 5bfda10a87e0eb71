//! Uniform polymorphic view over the host-owning resource kinds (§4.1, §9).

pub mod global_configuration;
pub mod ingress;
pub mod transport_server;
pub mod virtual_server;

pub use global_configuration::{GlobalConfiguration, Listener, ListenerProtocol};
pub use ingress::IngressConfiguration;
pub use transport_server::TransportServerConfiguration;
pub use virtual_server::VirtualServerConfiguration;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;

use crate::meta::{resource_key, wins};

/// One of the kinds that can claim a host or `(listener, host)` pair.
///
/// Modeled as a tagged variant rather than a trait object hierarchy (§9):
/// the set of kinds is closed and known at compile time, and a `match` on
/// this enum is how every arbiter resolves collisions between different
/// kinds.
#[derive(Debug, Clone)]
pub enum ResourceRef {
    Ingress(IngressConfiguration),
    VirtualServer(VirtualServerConfiguration),
    TransportServer(TransportServerConfiguration),
}

impl ResourceRef {
    pub fn kind(&self) -> &'static str {
        match self {
            ResourceRef::Ingress(_) => "Ingress",
            ResourceRef::VirtualServer(_) => "VirtualServer",
            ResourceRef::TransportServer(_) => "TransportServer",
        }
    }

    pub fn namespace(&self) -> String {
        match self {
            ResourceRef::Ingress(c) => c.ingress.namespace().unwrap_or_default(),
            ResourceRef::VirtualServer(c) => c.vs.metadata.namespace.clone().unwrap_or_default(),
            ResourceRef::TransportServer(c) => c.ts.metadata.namespace.clone().unwrap_or_default(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            ResourceRef::Ingress(c) => c.ingress.name_any(),
            ResourceRef::VirtualServer(c) => c.vs.metadata.name.clone().unwrap_or_default(),
            ResourceRef::TransportServer(c) => c.ts.metadata.name.clone().unwrap_or_default(),
        }
    }

    /// `"Kind/namespace/name"` identity (§4.1).
    pub fn key(&self) -> String {
        resource_key(self.kind(), &self.namespace(), &self.name())
    }

    fn created(&self) -> Option<Time> {
        match self {
            ResourceRef::Ingress(c) => c.ingress.metadata.creation_timestamp.clone(),
            ResourceRef::VirtualServer(c) => c.vs.metadata.creation_timestamp.clone(),
            ResourceRef::TransportServer(c) => c.ts.metadata.creation_timestamp.clone(),
        }
    }

    fn uid(&self) -> String {
        match self {
            ResourceRef::Ingress(c) => c.ingress.uid().unwrap_or_default(),
            ResourceRef::VirtualServer(c) => c.vs.metadata.uid.clone().unwrap_or_default(),
            ResourceRef::TransportServer(c) => c.ts.metadata.uid.clone().unwrap_or_default(),
        }
    }

    /// Total ordering over (creationTimestamp, uid), independent of kind
    /// (§4.1, §8): two resources of different kinds can compete for the
    /// same host.
    pub fn wins(&self, other: &ResourceRef) -> bool {
        wins(
            self.created().as_ref(),
            &self.uid(),
            other.created().as_ref(),
            &other.uid(),
        )
    }

    /// Kind-specific structural compare (§4.1). Resources of different
    /// kinds are never equal, which is exactly what the change engine
    /// needs to detect an ownership hand-off between kinds.
    pub fn equals(&self, other: &ResourceRef) -> bool {
        match (self, other) {
            (ResourceRef::Ingress(a), ResourceRef::Ingress(b)) => a.equals(b),
            (ResourceRef::VirtualServer(a), ResourceRef::VirtualServer(b)) => {
                a.vs.metadata.namespace == b.vs.metadata.namespace
                    && a.vs.metadata.name == b.vs.metadata.name
                    && a.vs.metadata.generation == b.vs.metadata.generation
            }
            (ResourceRef::TransportServer(a), ResourceRef::TransportServer(b)) => {
                a.ts.metadata.namespace == b.ts.metadata.namespace
                    && a.ts.metadata.name == b.ts.metadata.name
                    && a.ts.metadata.generation == b.ts.metadata.generation
            }
            _ => false,
        }
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        match self {
            ResourceRef::Ingress(c) => c.add_warning(message),
            ResourceRef::VirtualServer(c) => c.add_warning(message),
            ResourceRef::TransportServer(c) => c.add_warning(message),
        }
    }
}
