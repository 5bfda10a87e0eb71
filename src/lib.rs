//! Configuration Reconciliation Core: turns Ingress/VirtualServer/
//! VirtualServerRoute/TransportServer/GlobalConfiguration objects into a
//! deterministic `host -> owner` and `(listener, host) -> owner` assignment,
//! and reports the minimal ordered set of changes and problems needed to
//! keep a downstream renderer (out of scope, §1) converged.

pub mod challenge;
pub mod change_engine;
pub mod config;
pub mod error;
pub mod host_arbiter;
pub mod listener_arbiter;
pub mod master_minion;
pub mod meta;
pub mod problem_tracker;
pub mod reference_checkers;
pub mod resources;
pub mod store;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use change_engine::{ChangeOp, ResourceChange};
pub use config::StoreConfig;
pub use error::{CoreError, CoreResult};
pub use problem_tracker::{ConfigurationProblem, ProblemReason};
pub use resources::ResourceRef;
pub use store::{IngressClassFilters, ResourceFilter, Store, TransportServerMetrics, Validators};
pub use validation::{AllowAllIngressClassFilter, IngressClassFilter, NoopValidator, Validator};
