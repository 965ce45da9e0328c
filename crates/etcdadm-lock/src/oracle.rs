//! Liveness capability used to decide whether a lock may be reclaimed

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use etcdadm_common::Error;

/// Answers whether the holder recorded in a lock still exists
///
/// Only `Ok(false)` is proof of absence. Implementations must surface lookup
/// failures as `Err` so they are never mistaken for a dead holder.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HolderOracle: Send + Sync {
    /// Whether `holder` exists in `namespace`
    async fn exists(&self, namespace: &str, holder: &str) -> Result<bool, Error>;
}
