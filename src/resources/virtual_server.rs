//! `VirtualServer` / `VirtualServerRoute` input types and the derived
//! `VirtualServerConfiguration` the host arbiter builds (§3, §4.2).

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

/// A backend the rendered configuration will proxy to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upstream {
    pub name: String,
    pub service: String,
    pub port: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteAction {
    Pass { upstream: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubRoute {
    pub path: String,
    pub action: RouteAction,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VirtualServerListenerNames {
    pub http: Option<String>,
    pub https: Option<String>,
}

/// Binds one of the VS's paths to a `VirtualServerRoute` by `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualServerRouteBinding {
    pub path: String,
    /// `"namespace/name"` of the referenced `VirtualServerRoute`.
    pub route: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VirtualServerSpec {
    pub host: String,
    #[serde(default)]
    pub listener: Option<VirtualServerListenerNames>,
    #[serde(default)]
    pub routes: Vec<VirtualServerRouteBinding>,
    /// `"namespace/name"` (or bare `name`, resolved against the VS's own
    /// namespace) of referenced Policy CRDs.
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub tls_secret: Option<String>,
}

/// One host, owned exactly like an ingress (§3 invariant 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualServer {
    pub metadata: ObjectMeta,
    pub spec: VirtualServerSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VirtualServerRouteSpec {
    pub host: String,
    #[serde(default)]
    pub upstreams: Vec<Upstream>,
    #[serde(default)]
    pub subroutes: Vec<SubRoute>,
    #[serde(default)]
    pub policies: Vec<String>,
}

/// Owns a host (must match its parent VS) and a subset of paths; never a
/// top-level host owner (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualServerRoute {
    pub metadata: ObjectMeta,
    pub spec: VirtualServerRouteSpec,
}

/// Where a [`RouteEntry`] in a [`VirtualServerConfiguration`] came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteSource {
    Vsr { namespace: String, name: String },
    /// Synthesised by the challenge bridge (§4.2 step 1, §9).
    Challenge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub path: String,
    pub action: RouteAction,
    pub source: RouteSource,
}

/// Derived resource object the host arbiter builds for each active VS
/// (§3). `routes` is the flattened, already-validated set of subroutes
/// contributed by child VSRs and any synthesised challenge route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualServerConfiguration {
    pub vs: VirtualServer,
    pub routes: Vec<RouteEntry>,
    /// Upstreams contributed by child VSRs and the challenge bridge,
    /// flattened alongside `routes` so reverse-lookups (`FindResourcesForService`)
    /// don't need to walk back into VSRs that may no longer be active.
    pub upstreams: Vec<Upstream>,
    pub warnings: Vec<String>,
    pub http_port: Option<i32>,
    pub https_port: Option<i32>,
    pub http_ipv4: Option<String>,
    pub http_ipv6: Option<String>,
    pub https_ipv4: Option<String>,
    pub https_ipv6: Option<String>,
}

impl VirtualServerConfiguration {
    pub fn new(vs: VirtualServer) -> Self {
        Self {
            vs,
            routes: Vec::new(),
            upstreams: Vec::new(),
            warnings: Vec::new(),
            http_port: None,
            https_port: None,
            http_ipv4: None,
            http_ipv6: None,
            https_ipv4: None,
            https_ipv6: None,
        }
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}
