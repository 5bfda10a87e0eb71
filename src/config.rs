/// Construction-time flags for a [`crate::store::Store`].
///
/// These mirror the CLI flags the teacher parses in `args.rs`, but the core
/// is a library: callers build this struct programmatically instead of
/// through `clap`. The demo binary under `demos/` is the thing that
/// actually parses flags, and converts them into a `StoreConfig`.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Enables commercial-edition code paths in reference checkers.
    pub is_plus: bool,
    /// Tightens ingress validation to allow AppProtect annotations.
    pub app_protect_enabled: bool,
    /// Tightens ingress validation to allow AppProtect-DOS annotations.
    pub app_protect_dos_enabled: bool,
    /// Permits internal-route spec fields.
    pub internal_routes_enabled: bool,
    /// TransportServers with a TLS-passthrough listener participate in host arbitration.
    pub tls_passthrough_enabled: bool,
    /// Ingress validator accepts snippet annotations.
    pub snippets_enabled: bool,
    /// Enables challenge-ingress synthesis into VirtualServerRoutes.
    pub is_cert_manager_enabled: bool,
    /// Downstream hint only; the core carries it but does not act on it.
    pub is_ipv6_disabled: bool,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_is_plus(mut self, value: bool) -> Self {
        self.is_plus = value;
        self
    }

    pub fn with_app_protect_enabled(mut self, value: bool) -> Self {
        self.app_protect_enabled = value;
        self
    }

    pub fn with_app_protect_dos_enabled(mut self, value: bool) -> Self {
        self.app_protect_dos_enabled = value;
        self
    }

    pub fn with_internal_routes_enabled(mut self, value: bool) -> Self {
        self.internal_routes_enabled = value;
        self
    }

    pub fn with_tls_passthrough_enabled(mut self, value: bool) -> Self {
        self.tls_passthrough_enabled = value;
        self
    }

    pub fn with_snippets_enabled(mut self, value: bool) -> Self {
        self.snippets_enabled = value;
        self
    }

    pub fn with_cert_manager_enabled(mut self, value: bool) -> Self {
        self.is_cert_manager_enabled = value;
        self
    }

    pub fn with_ipv6_disabled(mut self, value: bool) -> Self {
        self.is_ipv6_disabled = value;
        self
    }
}
