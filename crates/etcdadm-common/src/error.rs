//! Error types for the etcdadm bootstrap provider
//!
//! Errors are structured with fields to aid debugging in production. The lock
//! path converts nearly all of them into a boolean outcome, so the context
//! carried here mostly ends up in log lines.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for provider operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The payload or resource kind being (de)serialized, if known
        kind: Option<String>,
    },

    /// An object of the wrong kind was handed to a typed conversion
    #[error("expected a {expected} but got a {actual}")]
    UnexpectedKind {
        /// Kind the caller asked for
        expected: String,
        /// Kind actually present on the object
        actual: String,
    },

    /// Invalid input (missing names, empty identities)
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "metadata.namespace")
        field: Option<String>,
    },

    /// The caller cancelled an in-flight operation
    #[error("{operation} cancelled for cluster {cluster}")]
    Cancelled {
        /// Operation that was interrupted (lock, unlock, inspect)
        operation: String,
        /// Cluster the operation targeted
        cluster: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "store", "oracle")
        context: String,
    },
}

impl Error {
    /// Create a serialization error naming the payload kind
    pub fn serialization_for(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an unexpected-kind error
    pub fn unexpected_kind(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::UnexpectedKind {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error for a specific field path
    pub fn validation_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(operation: impl Into<String>, cluster: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
            cluster: cluster.into(),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Whether the caller cancelled the operation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
