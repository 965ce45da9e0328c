//! Cluster-initialization mutex for etcd nodes
//!
//! Exactly one Machine per cluster may run `etcdadm init`. The mutex elects it
//! using nothing but a store with atomic create-if-absent and delete: the first
//! candidate whose create succeeds holds the lock until the record is deleted,
//! either explicitly through [`EtcdInitMutex::unlock`] or by reclaim once the
//! recorded holder is confirmed gone.
//!
//! # Modules
//!
//! - [`record`] - Lock record and holder information (the persisted semaphore)
//! - [`store`] - `LockStore` capability and its existence-typed errors
//! - [`oracle`] - `HolderOracle` capability answering "does this holder exist"
//! - [`mutex`] - The acquire/contend/reclaim/release protocol
//! - [`k8s`] - ConfigMap store and CAPI Machine oracle on a live cluster
//! - [`memory`] - In-memory store and oracle for tests and local tooling
//! - [`identity`] - Typed cluster reference
//! - [`config`] - Lock naming and holder lookup configuration

#![deny(missing_docs)]

pub mod config;
pub mod identity;
pub mod k8s;
pub mod memory;
pub mod mutex;
pub mod oracle;
pub mod record;
pub mod store;

pub use config::LockConfig;
pub use identity::ClusterRef;
pub use mutex::{Cancelled, EtcdInitMutex, LockState};
pub use oracle::HolderOracle;
pub use record::{HolderInfo, LockRecord};
pub use store::{LockStore, StoreError};
