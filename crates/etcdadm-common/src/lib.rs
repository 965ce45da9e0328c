//! Common types for the etcdadm bootstrap provider: errors, constants, and
//! Kubernetes utilities shared by the lock and CLI crates.

#![deny(missing_docs)]

pub mod error;
pub mod kube_utils;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Default Configuration Constants
// =============================================================================
// Label keys, payload keys, and namespaces used by the lock record and its
// Kubernetes adapters. Keep them here so tests and the CLI agree with the
// operator on the wire format.

/// Namespace in which holder Machines are looked up by default
pub const DEFAULT_HOLDER_NAMESPACE: &str = "eksa-system";

/// Suffix appended to the cluster name to form the lock record name
pub const LOCK_NAME_SUFFIX: &str = "-etcd-lock";

/// Data key of the lock record holding the serialized holder information
pub const LOCK_INFORMATION_KEY: &str = "lock-information";

/// CAPI label carrying the owning cluster's name
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// CAPI core API group
pub const CAPI_GROUP: &str = "cluster.x-k8s.io";

/// Served API version for CAPI core resources
pub const CAPI_API_VERSION: &str = "cluster.x-k8s.io/v1beta2";

/// Field manager recorded on objects created by the provider
pub const FIELD_MANAGER: &str = "etcdadm-bootstrap-provider";
