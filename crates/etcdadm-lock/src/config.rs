//! Lock naming and holder lookup configuration

use etcdadm_common::{DEFAULT_HOLDER_NAMESPACE, FIELD_MANAGER, LOCK_NAME_SUFFIX};

use crate::identity::ClusterRef;

/// Configuration for [`EtcdInitMutex`](crate::EtcdInitMutex) and its adapters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockConfig {
    /// Namespace in which holder Machines are looked up.
    ///
    /// `None` looks holders up in the cluster's own namespace.
    pub holder_namespace: Option<String>,
    /// Suffix appended to the cluster name to form the lock record name
    pub lock_name_suffix: String,
    /// Field manager recorded on created lock records
    pub field_manager: String,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            holder_namespace: Some(DEFAULT_HOLDER_NAMESPACE.to_string()),
            lock_name_suffix: LOCK_NAME_SUFFIX.to_string(),
            field_manager: FIELD_MANAGER.to_string(),
        }
    }
}

impl LockConfig {
    /// Look holders up in a fixed namespace
    pub fn with_holder_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.holder_namespace = Some(namespace.into());
        self
    }

    /// Look holders up in each cluster's own namespace
    pub fn with_cluster_scoped_holders(mut self) -> Self {
        self.holder_namespace = None;
        self
    }

    /// Override the lock name suffix
    pub fn with_lock_name_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.lock_name_suffix = suffix.into();
        self
    }

    /// Name of the lock record guarding `cluster_name`
    pub fn lock_name(&self, cluster_name: &str) -> String {
        format!("{}{}", cluster_name, self.lock_name_suffix)
    }

    /// Namespace in which the holder of `cluster`'s lock is looked up
    pub fn holder_namespace_for<'a>(&'a self, cluster: &'a ClusterRef) -> &'a str {
        self.holder_namespace
            .as_deref()
            .unwrap_or(cluster.namespace.as_str())
    }
}
