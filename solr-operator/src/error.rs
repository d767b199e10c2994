//! Error types for the Solr Kubernetes operator.

use thiserror::Error;

/// Errors that can occur during operator operations.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// Kubernetes API error.
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// Watch stream error.
    #[error("Watch error: {0}")]
    Watch(#[from] kube::runtime::watcher::Error),

    /// The requested size class is not part of the sizing table.
    #[error("Unknown size class: {0:?}")]
    UnknownSizeClass(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource not found.
    #[error("Resource not found: {kind}/{name} in namespace {namespace}")]
    NotFound {
        /// Resource kind.
        kind: String,
        /// Resource name.
        name: String,
        /// Resource namespace.
        namespace: String,
    },

    /// The discovery ConfigMap named by a Solr resource does not exist.
    #[error("Discovery ConfigMap {namespace}/{name} does not exist")]
    DiscoveryTargetMissing {
        /// ConfigMap namespace.
        namespace: String,
        /// ConfigMap name.
        name: String,
    },

    /// A store call did not complete within the per-call bound.
    #[error("Timed out during {operation} of {kind}/{name}")]
    Timeout {
        /// Store operation (create, get, replace, patch, delete, list).
        operation: &'static str,
        /// Resource kind.
        kind: String,
        /// Resource name.
        name: String,
    },

    /// The store is reachable but could not serve the request yet.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type for operator operations.
pub type OperatorResult<T> = Result<T, OperatorError>;

impl OperatorError {
    /// Whether the next event or resync is expected to heal this error.
    pub fn is_transient(&self) -> bool {
        match self {
            OperatorError::KubeError(_)
            | OperatorError::Watch(_)
            | OperatorError::Timeout { .. }
            | OperatorError::Unavailable(_) => true,
            OperatorError::UnknownSizeClass(_)
            | OperatorError::InvalidConfig(_)
            | OperatorError::NotFound { .. }
            | OperatorError::DiscoveryTargetMissing { .. }
            | OperatorError::SerializationError(_) => false,
        }
    }
}

impl From<serde_json::Error> for OperatorError {
    fn from(err: serde_json::Error) -> Self {
        OperatorError::SerializationError(err.to_string())
    }
}

/// Whether a create call was rejected because the object already exists.
pub fn is_already_exists(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 409 && resp.reason == "AlreadyExists")
}

/// Whether a call was rejected because the object does not exist.
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}
