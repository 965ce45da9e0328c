//! Error types for the CLI

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Kubernetes, discovery, or lock-record failure
    #[error(transparent)]
    Common(#[from] etcdadm_common::Error),

    /// Logging could not be set up
    #[error("telemetry error: {0}")]
    Telemetry(#[from] etcdadm_common::telemetry::TelemetryError),

    /// `status --json` output could not be rendered
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// `lock` finished without the machine holding the lock
    #[error("lock for cluster {namespace}/{cluster} is not held by {machine}")]
    NotAcquired {
        namespace: String,
        cluster: String,
        machine: String,
    },

    /// `unlock` left a lock record in place
    #[error("failed to release lock for cluster {namespace}/{cluster}")]
    UnlockFailed { namespace: String, cluster: String },
}
