//! Demo binary exercising the `Store` API end to end: loads JSON fixture
//! files for each resource kind, feeds them through the store one mutation
//! at a time, and logs the resulting changes and problems. This is the
//! thin, out-of-scope "watch loop" the core library assumes a caller
//! supplies (§1, §4.8).

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use k8s_openapi::api::networking::v1::Ingress;

use ingress_config_core::resources::global_configuration::GlobalConfiguration;
use ingress_config_core::resources::transport_server::TransportServer;
use ingress_config_core::resources::virtual_server::{VirtualServer, VirtualServerRoute};
use ingress_config_core::{IngressClassFilters, ResourceFilter, Store, StoreConfig, Validators};

/// CLI flags mirroring `StoreConfig`'s construction-time flags (§4.8), with
/// the teacher's `I2G_` environment prefix replaced by `NIC_`.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
/// Demo runner for the NGINX Ingress Controller configuration reconciliation core.
struct DemoArgs {
    /// Enables commercial-edition reference-checker behavior.
    #[arg(long, env = "NIC_IS_PLUS", default_value_t = false)]
    is_plus: bool,

    /// Tightens ingress validation to allow AppProtect annotations.
    #[arg(long, env = "NIC_APP_PROTECT_ENABLED", default_value_t = false)]
    app_protect_enabled: bool,

    /// Tightens ingress validation to allow AppProtect-DOS annotations.
    #[arg(long, env = "NIC_APP_PROTECT_DOS_ENABLED", default_value_t = false)]
    app_protect_dos_enabled: bool,

    /// Permits internal-route spec fields.
    #[arg(long, env = "NIC_INTERNAL_ROUTES_ENABLED", default_value_t = false)]
    internal_routes_enabled: bool,

    /// TransportServers with a TLS-passthrough listener participate in host arbitration.
    #[arg(long, env = "NIC_TLS_PASSTHROUGH_ENABLED", default_value_t = false)]
    tls_passthrough_enabled: bool,

    /// Ingress validator accepts snippet annotations.
    #[arg(long, env = "NIC_SNIPPETS_ENABLED", default_value_t = false)]
    snippets_enabled: bool,

    /// Enables challenge-ingress synthesis into VirtualServerRoutes.
    #[arg(long, env = "NIC_IS_CERT_MANAGER_ENABLED", default_value_t = false)]
    is_cert_manager_enabled: bool,

    /// Downstream hint only; the core carries it but does not act on it.
    #[arg(long, env = "NIC_IS_IPV6_DISABLED", default_value_t = false)]
    is_ipv6_disabled: bool,

    /// Log level for the demo run.
    #[arg(long, env = "NIC_LOG_LEVEL", default_value_t = tracing::level_filters::LevelFilter::INFO)]
    log_level: tracing::level_filters::LevelFilter,

    /// JSON array of Ingress objects.
    #[arg(long, env = "NIC_INGRESSES_FILE")]
    ingresses_file: Option<PathBuf>,

    /// JSON array of VirtualServer objects.
    #[arg(long, env = "NIC_VIRTUAL_SERVERS_FILE")]
    virtual_servers_file: Option<PathBuf>,

    /// JSON array of VirtualServerRoute objects.
    #[arg(long, env = "NIC_VIRTUAL_SERVER_ROUTES_FILE")]
    virtual_server_routes_file: Option<PathBuf>,

    /// JSON array of TransportServer objects.
    #[arg(long, env = "NIC_TRANSPORT_SERVERS_FILE")]
    transport_servers_file: Option<PathBuf>,

    /// JSON object for the single cluster-wide GlobalConfiguration.
    #[arg(long, env = "NIC_GLOBAL_CONFIGURATION_FILE")]
    global_configuration_file: Option<PathBuf>,
}

impl From<&DemoArgs> for StoreConfig {
    fn from(args: &DemoArgs) -> Self {
        StoreConfig::new()
            .with_is_plus(args.is_plus)
            .with_app_protect_enabled(args.app_protect_enabled)
            .with_app_protect_dos_enabled(args.app_protect_dos_enabled)
            .with_internal_routes_enabled(args.internal_routes_enabled)
            .with_tls_passthrough_enabled(args.tls_passthrough_enabled)
            .with_snippets_enabled(args.snippets_enabled)
            .with_cert_manager_enabled(args.is_cert_manager_enabled)
            .with_ipv6_disabled(args.is_ipv6_disabled)
    }
}

fn load<T: serde::de::DeserializeOwned>(path: &PathBuf) -> anyhow::Result<Vec<T>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = DemoArgs::parse();

    tracing_subscriber::fmt().with_max_level(args.log_level).init();
    tracing::info!("starting configuration reconciliation core demo");
    tracing::info!("CLI argument: {:?}", args);

    let store = Store::new((&args).into(), Validators::default(), IngressClassFilters::default());

    if let Some(path) = &args.global_configuration_file {
        let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let gc: GlobalConfiguration = serde_json::from_str(&raw)?;
        let (changes, problems, rejection) = store.add_or_update_global_configuration(gc);
        if let Some(message) = rejection {
            tracing::warn!(%message, "global configuration rejected by validator");
        }
        report("GlobalConfiguration", changes.len(), problems.len());
    }

    if let Some(path) = &args.ingresses_file {
        for ingress in load::<Ingress>(path)? {
            let (changes, problems) = store.add_or_update_ingress(ingress);
            report("Ingress", changes.len(), problems.len());
        }
    }

    if let Some(path) = &args.virtual_servers_file {
        for vs in load::<VirtualServer>(path)? {
            let (changes, problems) = store.add_or_update_virtual_server(vs);
            report("VirtualServer", changes.len(), problems.len());
        }
    }

    if let Some(path) = &args.virtual_server_routes_file {
        for vsr in load::<VirtualServerRoute>(path)? {
            let (changes, problems) = store.add_or_update_virtual_server_route(vsr);
            report("VirtualServerRoute", changes.len(), problems.len());
        }
    }

    if let Some(path) = &args.transport_servers_file {
        for ts in load::<TransportServer>(path)? {
            let (changes, problems) = store.add_or_update_transport_server(ts);
            report("TransportServer", changes.len(), problems.len());
        }
    }

    let resources = store.get_resources(ResourceFilter { ingresses: true, virtual_servers: true, transport_servers: true });
    tracing::info!(total = resources.len(), "final reconciled resource count");

    Ok(())
}

fn report(kind: &str, changes: usize, problems: usize) {
    tracing::info!(kind, changes, problems, "mutation applied");
}
