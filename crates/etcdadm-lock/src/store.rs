//! Store capability the mutex is built on
//!
//! All mutual exclusion comes from the store: `create` must be atomic
//! create-if-absent, and outcomes must be reported as typed variants rather
//! than generic failures so the mutex can tell absence and contention apart
//! from real errors.

use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use etcdadm_common::Error;

use crate::record::LockRecord;

/// Outcome of a store operation that did not succeed
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record with this key exists
    #[error("lock record {namespace}/{name} not found")]
    NotFound {
        /// Record namespace
        namespace: String,
        /// Record name
        name: String,
    },

    /// Create lost to an existing record
    #[error("lock record {namespace}/{name} already exists")]
    AlreadyExists {
        /// Record namespace
        namespace: String,
        /// Record name
        name: String,
    },

    /// A conditional delete found a different incarnation of the record
    #[error("lock record {namespace}/{name} was replaced since it was read")]
    Conflict {
        /// Record namespace
        namespace: String,
        /// Record name
        name: String,
    },

    /// Transport, serialization, or any other failure
    #[error(transparent)]
    Other(#[from] Error),
}

impl StoreError {
    /// NotFound for a key
    pub fn not_found(namespace: &str, name: &str) -> Self {
        Self::NotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// AlreadyExists for a key
    pub fn already_exists(namespace: &str, name: &str) -> Self {
        Self::AlreadyExists {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Conflict for a key
    pub fn conflict(namespace: &str, name: &str) -> Self {
        Self::Conflict {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Other(inner) => inner,
            other => Error::internal_with_context("store", other.to_string()),
        }
    }
}

/// Atomic Get / Create / Delete over lock records keyed by (namespace, name)
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Fetch a record, including its store-assigned uid
    async fn get(&self, namespace: &str, name: &str) -> Result<LockRecord, StoreError>;

    /// Create a record if no record with the same key exists
    ///
    /// Must fail with [`StoreError::AlreadyExists`] when another create won.
    async fn create(&self, record: &LockRecord) -> Result<(), StoreError>;

    /// Delete a record
    ///
    /// With `expected_uid`, only the incarnation carrying that uid is deleted;
    /// a record with a different uid yields [`StoreError::Conflict`].
    async fn delete(
        &self,
        namespace: &str,
        name: &str,
        expected_uid: Option<String>,
    ) -> Result<(), StoreError>;
}
