//! The singleton `GlobalConfiguration` and its named listeners (§3).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListenerProtocol {
    Http,
    Tcp,
    Udp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listener {
    pub name: String,
    pub port: i32,
    pub protocol: ListenerProtocol,
    pub ssl: bool,
    pub ipv4: String,
    pub ipv6: String,
}

/// `networking.k8s.io`-adjacent CRD; not part of `k8s-openapi`, so this is
/// our own plain struct embedding `ObjectMeta`, the way `VirtualServer` and
/// `TransportServer` do (§6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfiguration {
    #[serde(default)]
    pub listeners: Vec<Listener>,
}

impl GlobalConfiguration {
    pub fn listener(&self, name: &str) -> Option<&Listener> {
        self.listeners.iter().find(|l| l.name == name)
    }

    /// Listeners by name, for the arbiters' O(1) lookups.
    pub fn by_name(&self) -> BTreeMap<&str, &Listener> {
        self.listeners.iter().map(|l| (l.name.as_str(), l)).collect()
    }
}
