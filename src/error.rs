pub type CoreResult<T> = Result<T, CoreError>;

/// Errors surfaced by misuse of the store's API, never by a resource
/// failing validation (that is reported as a
/// [`crate::problem_tracker::ConfigurationProblem`] instead, see
/// `problem_tracker.rs`).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("resource key must be of the form 'namespace/name', got: {0}")]
    MalformedKey(String),
    #[error("global configuration listener {0} is referenced but not declared")]
    UnknownListener(String),
    #[error("reverse lookup key must not be empty, got: {0:?}/{1:?}")]
    EmptyReverseLookupKey(String, String),
    #[error("{0}")]
    General(String),
    #[error("failed to (de)serialize resource for logging: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error(transparent)]
    AnyhowError(#[from] anyhow::Error),
}
