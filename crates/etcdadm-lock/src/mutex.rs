//! Cluster-initialization mutex
//!
//! # Protocol
//!
//! `lock` reads the cluster's lock record. If there is none it tries to create
//! one naming the candidate; the store's atomic create-if-absent picks exactly
//! one winner among racing candidates. If a record exists, the candidate holds
//! the lock only if the record names it. A record naming someone else is left
//! alone while that holder exists, and deleted once the holder is confirmed
//! gone (reclaim). Reclaim never acquires in the same call: the cluster goes
//! back to unlocked and the next `lock` pass competes for it like any other.
//!
//! # Failure policy
//!
//! Every store or oracle failure is logged and turned into `false`. Only a
//! definite "holder does not exist" answer allows a reclaim; a malformed record
//! or an oracle error leaves the record in place. There is no retry loop here:
//! the reconciler calling `lock` owns the retry cadence.
//!
//! # Cancellation
//!
//! `try_lock`/`try_unlock` race every store and oracle call against a
//! [`CancellationToken`]. A cancelled call returns `Err(Cancelled)`, which is
//! never confused with "not the holder".

use std::future::Future;
use std::sync::Arc;

use kube::Client;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use etcdadm_common::Error;

use crate::config::LockConfig;
use crate::identity::ClusterRef;
use crate::k8s::{ConfigMapLockStore, MachineHolderOracle};
use crate::oracle::HolderOracle;
use crate::record::{HolderInfo, LockRecord};
use crate::store::{LockStore, StoreError};

const OP_LOCK: &str = "lock";
const OP_UNLOCK: &str = "unlock";

/// A lock or unlock call was cancelled by the caller before it completed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} cancelled for cluster {namespace}/{cluster}")]
pub struct Cancelled {
    /// Operation that was interrupted
    pub operation: &'static str,
    /// Cluster namespace
    pub namespace: String,
    /// Cluster name
    pub cluster: String,
}

impl Cancelled {
    fn new(operation: &'static str, cluster: &ClusterRef) -> Self {
        Self {
            operation,
            namespace: cluster.namespace.clone(),
            cluster: cluster.name.clone(),
        }
    }
}

impl From<Cancelled> for Error {
    fn from(c: Cancelled) -> Self {
        Error::cancelled(c.operation, format!("{}/{}", c.namespace, c.cluster))
    }
}

/// Observed state of a cluster's lock, for inspection tooling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    /// No lock record exists
    Unlocked,
    /// A well-formed record names this holder
    Held(HolderInfo),
    /// A record exists but its payload cannot be decoded
    Malformed(String),
}

/// Mutex electing the single machine that initializes a cluster's etcd
#[derive(Clone)]
pub struct EtcdInitMutex {
    store: Arc<dyn LockStore>,
    oracle: Arc<dyn HolderOracle>,
    config: LockConfig,
}

impl EtcdInitMutex {
    /// Create a mutex over the given store and oracle with default config
    pub fn new(store: Arc<dyn LockStore>, oracle: Arc<dyn HolderOracle>) -> Self {
        Self {
            store,
            oracle,
            config: LockConfig::default(),
        }
    }

    /// Create a mutex on a live cluster: ConfigMap records, CAPI Machine holders
    pub fn for_cluster_api(client: Client, config: LockConfig) -> Self {
        let store = ConfigMapLockStore::new(client.clone(), &config);
        Self {
            store: Arc::new(store),
            oracle: Arc::new(MachineHolderOracle::new(client)),
            config,
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: LockConfig) -> Self {
        self.config = config;
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Try to make `machine` the machine that initializes `cluster`
    ///
    /// Returns `true` if `machine` holds the lock when the call returns, and
    /// `false` otherwise, including on any error.
    pub async fn lock(&self, cluster: &ClusterRef, machine: &str) -> bool {
        self.try_lock(&CancellationToken::new(), cluster, machine)
            .await
            .unwrap_or(false)
    }

    /// [`lock`](Self::lock), abandoning the call if `cancel` fires
    pub async fn try_lock(
        &self,
        cancel: &CancellationToken,
        cluster: &ClusterRef,
        machine: &str,
    ) -> Result<bool, Cancelled> {
        let lock_name = self.config.lock_name(&cluster.name);
        let span = info_span!(
            "etcd_init_lock",
            namespace = %cluster.namespace,
            cluster = %cluster.name,
            lock = %lock_name,
            machine = %machine,
        );
        self.acquire(cancel, cluster, &lock_name, machine)
            .instrument(span)
            .await
    }

    /// Release the lock for `cluster`
    ///
    /// Returns `true` if no lock record remains, including when there was
    /// none to begin with.
    pub async fn unlock(&self, cluster: &ClusterRef) -> bool {
        self.try_unlock(&CancellationToken::new(), cluster)
            .await
            .unwrap_or(false)
    }

    /// [`unlock`](Self::unlock), abandoning the call if `cancel` fires
    pub async fn try_unlock(
        &self,
        cancel: &CancellationToken,
        cluster: &ClusterRef,
    ) -> Result<bool, Cancelled> {
        let lock_name = self.config.lock_name(&cluster.name);
        let span = info_span!(
            "etcd_init_unlock",
            namespace = %cluster.namespace,
            cluster = %cluster.name,
            lock = %lock_name,
        );
        self.release(cancel, cluster, &lock_name)
            .instrument(span)
            .await
    }

    /// Read the lock without changing it
    pub async fn inspect(&self, cluster: &ClusterRef) -> Result<LockState, Error> {
        let lock_name = self.config.lock_name(&cluster.name);
        match self.store.get(&cluster.namespace, &lock_name).await {
            Ok(record) => Ok(match record.holder() {
                Ok(holder) => LockState::Held(holder),
                Err(e) => LockState::Malformed(e.to_string()),
            }),
            Err(StoreError::NotFound { .. }) => Ok(LockState::Unlocked),
            Err(e) => Err(e.into()),
        }
    }

    async fn acquire(
        &self,
        cancel: &CancellationToken,
        cluster: &ClusterRef,
        lock_name: &str,
        machine: &str,
    ) -> Result<bool, Cancelled> {
        if machine.is_empty() {
            error!("Refusing to acquire the lock for a machine without a name");
            return Ok(false);
        }

        let read = self.store.get(&cluster.namespace, lock_name);
        match guarded(cancel, OP_LOCK, cluster, read).await? {
            Ok(existing) => return self.evaluate(cancel, cluster, machine, existing).await,
            Err(StoreError::NotFound { .. }) => {}
            Err(e) => {
                error!(error = %e, "Failed to acquire lock");
                return Ok(false);
            }
        }

        let record = match LockRecord::new(cluster, lock_name, &HolderInfo::new(machine)) {
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, "Failed to acquire lock while setting semaphore information");
                return Ok(false);
            }
        };

        info!("Attempting to acquire the lock");
        match guarded(cancel, OP_LOCK, cluster, self.store.create(&record)).await? {
            Ok(()) => {
                info!("Lock acquired");
                Ok(true)
            }
            Err(StoreError::AlreadyExists { .. }) => {
                info!("Lost the race to create the lock, checking the winner");
                let reread = self.store.get(&cluster.namespace, lock_name);
                match guarded(cancel, OP_LOCK, cluster, reread).await? {
                    Ok(winner) => self.evaluate(cancel, cluster, machine, winner).await,
                    Err(StoreError::NotFound { .. }) => {
                        debug!("Winning lock was released before it could be read");
                        Ok(false)
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to read the lock after losing the create race");
                        Ok(false)
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Error acquiring the lock");
                Ok(false)
            }
        }
    }

    /// Decide the outcome for `machine` against an existing record
    async fn evaluate(
        &self,
        cancel: &CancellationToken,
        cluster: &ClusterRef,
        machine: &str,
        record: LockRecord,
    ) -> Result<bool, Cancelled> {
        let holder = match record.holder() {
            Ok(holder) => holder,
            Err(e) => {
                error!(error = %e, "Failed to get information about the existing lock");
                return Ok(false);
            }
        };

        if holder.machine_name == machine {
            debug!("Machine already holds the lock");
            return Ok(true);
        }

        let holder_namespace = self.config.holder_namespace_for(cluster);
        let liveness = self.oracle.exists(holder_namespace, &holder.machine_name);
        match guarded(cancel, OP_LOCK, cluster, liveness).await? {
            Ok(true) => {
                info!(holder = %holder.machine_name, "Waiting on another machine to initialize");
                Ok(false)
            }
            Ok(false) => {
                info!(
                    holder = %holder.machine_name,
                    holder_namespace,
                    "Machine that acquired the lock not found, releasing the lock"
                );
                if !self.delete_record(cancel, OP_LOCK, cluster, &record).await? {
                    warn!(holder = %holder.machine_name, "Stale lock was not released");
                }
                Ok(false)
            }
            Err(e) => {
                error!(
                    holder = %holder.machine_name,
                    holder_namespace,
                    error = %e,
                    "Failed to check whether the lock holder exists"
                );
                Ok(false)
            }
        }
    }

    async fn release(
        &self,
        cancel: &CancellationToken,
        cluster: &ClusterRef,
        lock_name: &str,
    ) -> Result<bool, Cancelled> {
        debug!("Checking for lock");
        let read = self.store.get(&cluster.namespace, lock_name);
        match guarded(cancel, OP_UNLOCK, cluster, read).await? {
            Ok(record) => self.delete_record(cancel, OP_UNLOCK, cluster, &record).await,
            Err(StoreError::NotFound { .. }) => {
                info!("Lock not found, it may have been released already");
                Ok(true)
            }
            Err(e) => {
                error!(error = %e, "Error unlocking the etcd init lock");
                Ok(false)
            }
        }
    }

    /// Delete exactly the incarnation of the record that was read
    async fn delete_record(
        &self,
        cancel: &CancellationToken,
        operation: &'static str,
        cluster: &ClusterRef,
        record: &LockRecord,
    ) -> Result<bool, Cancelled> {
        let delete = self
            .store
            .delete(&record.namespace, &record.name, record.uid.clone());
        match guarded(cancel, operation, cluster, delete).await? {
            Ok(()) => {
                info!("Lock released");
                Ok(true)
            }
            Err(StoreError::NotFound { .. }) => {
                debug!("Lock was already deleted by another caller");
                Ok(true)
            }
            Err(StoreError::Conflict { .. }) => {
                warn!("Lock was replaced by a new holder before it could be deleted");
                Ok(false)
            }
            Err(e) => {
                error!(error = %e, "Error deleting the lock record");
                Ok(false)
            }
        }
    }
}

/// Run `fut` unless `cancel` fires first
async fn guarded<F>(
    cancel: &CancellationToken,
    operation: &'static str,
    cluster: &ClusterRef,
    fut: F,
) -> Result<F::Output, Cancelled>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            warn!(operation, "Lock operation cancelled");
            Err(Cancelled::new(operation, cluster))
        }
        out = fut => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryLockStore, StaticHolderOracle};
    use crate::oracle::MockHolderOracle;
    use crate::store::MockLockStore;
    use etcdadm_common::{DEFAULT_HOLDER_NAMESPACE, LOCK_INFORMATION_KEY};

    const LOCK: &str = "prod-etcd-lock";

    fn cluster() -> ClusterRef {
        ClusterRef::new("team-a", "prod").with_uid("cluster-uid")
    }

    fn held_by(machine: &str) -> LockRecord {
        LockRecord::new(&cluster(), LOCK, &HolderInfo::new(machine)).expect("record should build")
    }

    fn malformed() -> LockRecord {
        let mut record = held_by("ignored");
        record
            .data
            .insert(LOCK_INFORMATION_KEY.to_string(), "{not json".to_string());
        record
    }

    /// Mutex over a shared memory store with the given live machines
    fn memory_mutex(alive: &[&str]) -> (EtcdInitMutex, Arc<MemoryLockStore>, Arc<StaticHolderOracle>) {
        let store = Arc::new(MemoryLockStore::new());
        let oracle = Arc::new(StaticHolderOracle::with_alive(
            DEFAULT_HOLDER_NAMESPACE,
            alive.iter().copied(),
        ));
        let mutex = EtcdInitMutex::new(store.clone(), oracle.clone());
        (mutex, store, oracle)
    }

    fn holder_of(store: &MemoryLockStore) -> Option<String> {
        store
            .record("team-a", LOCK)
            .map(|r| r.holder().expect("stored holder decodes").machine_name)
    }

    // ==========================================================================
    // Acquire
    // ==========================================================================

    #[tokio::test]
    async fn first_candidate_acquires_unlocked_cluster() {
        let (mutex, store, _) = memory_mutex(&[]);

        assert!(mutex.lock(&cluster(), "etcd-0").await);
        assert_eq!(holder_of(&store).as_deref(), Some("etcd-0"));
        assert_eq!(store.creates(), 1);
    }

    #[tokio::test]
    async fn holder_relocks_without_touching_the_record() {
        let (mutex, store, _) = memory_mutex(&[]);
        assert!(mutex.lock(&cluster(), "etcd-0").await);
        let before = store.record("team-a", LOCK);

        for _ in 0..3 {
            assert!(mutex.lock(&cluster(), "etcd-0").await);
        }

        assert_eq!(store.record("team-a", LOCK), before);
        assert_eq!(store.creates(), 1);
        assert_eq!(store.deletes(), 0);
    }

    #[tokio::test]
    async fn live_holder_blocks_other_candidates() {
        let (mutex, store, _) = memory_mutex(&["etcd-0"]);
        assert!(mutex.lock(&cluster(), "etcd-0").await);

        assert!(!mutex.lock(&cluster(), "etcd-1").await);
        assert_eq!(holder_of(&store).as_deref(), Some("etcd-0"));
        assert_eq!(store.deletes(), 0);
    }

    #[tokio::test]
    async fn empty_machine_name_never_acquires() {
        let (mutex, store, _) = memory_mutex(&[]);
        assert!(!mutex.lock(&cluster(), "").await);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn lock_record_is_named_after_the_cluster() {
        let (mutex, store, _) = memory_mutex(&[]);
        let mutex = mutex.with_config(LockConfig::default().with_lock_name_suffix("-init"));

        assert!(mutex.lock(&cluster(), "etcd-0").await);
        assert!(store.record("team-a", "prod-init").is_some());
        assert!(store.record("team-a", LOCK).is_none());
    }

    // ==========================================================================
    // Reclaim
    // ==========================================================================

    #[tokio::test]
    async fn dead_holder_is_reclaimed_then_acquired_on_next_pass() {
        let (mutex, store, oracle) = memory_mutex(&["etcd-0"]);
        assert!(mutex.lock(&cluster(), "etcd-0").await);
        oracle.remove(DEFAULT_HOLDER_NAMESPACE, "etcd-0");

        // Reclaim pass leaves the cluster unlocked but does not acquire
        assert!(!mutex.lock(&cluster(), "etcd-1").await);
        assert!(store.is_empty());

        assert!(mutex.lock(&cluster(), "etcd-1").await);
        assert_eq!(holder_of(&store).as_deref(), Some("etcd-1"));
    }

    #[tokio::test]
    async fn holders_are_looked_up_in_the_configured_namespace() {
        let (mutex, store, oracle) = memory_mutex(&[]);
        let mutex = mutex.with_config(LockConfig::default().with_cluster_scoped_holders());
        oracle.add("team-a", "etcd-0");
        assert!(mutex.lock(&cluster(), "etcd-0").await);

        assert!(!mutex.lock(&cluster(), "etcd-1").await);
        assert_eq!(holder_of(&store).as_deref(), Some("etcd-0"));
    }

    #[tokio::test]
    async fn oracle_error_never_reclaims() {
        let store = Arc::new(MemoryLockStore::new());
        store.insert(held_by("etcd-0"));

        let mut oracle = MockHolderOracle::new();
        oracle
            .expect_exists()
            .times(1)
            .returning(|_, _| Err(Error::internal("apiserver unavailable")));

        let mutex = EtcdInitMutex::new(store.clone(), Arc::new(oracle));
        assert!(!mutex.lock(&cluster(), "etcd-1").await);
        assert_eq!(holder_of(&store).as_deref(), Some("etcd-0"));
        assert_eq!(store.deletes(), 0);
    }

    #[tokio::test]
    async fn reclaim_reports_false_even_when_delete_fails() {
        let mut store = MockLockStore::new();
        store.expect_get().returning(|_, _| Ok(held_by("etcd-0")));
        store
            .expect_delete()
            .times(1)
            .returning(|_, _, _| Err(StoreError::Other(Error::internal("etcd timeout"))));
        store.expect_create().never();

        let mutex = EtcdInitMutex::new(Arc::new(store), Arc::new(StaticHolderOracle::new()));
        assert!(!mutex.lock(&cluster(), "etcd-1").await);
    }

    #[tokio::test]
    async fn reclaim_deletes_only_the_record_that_named_the_dead_holder() {
        let mut record = held_by("etcd-0");
        record.uid = Some("uid-stale".to_string());

        let mut store = MockLockStore::new();
        store.expect_get().returning(move |_, _| Ok(record.clone()));
        store
            .expect_delete()
            .withf(|ns, name, uid| {
                ns == "team-a" && name == LOCK && uid.as_deref() == Some("uid-stale")
            })
            .times(1)
            .returning(|ns, name, _| Err(StoreError::conflict(ns, name)));

        let mutex = EtcdInitMutex::new(Arc::new(store), Arc::new(StaticHolderOracle::new()));
        assert!(!mutex.lock(&cluster(), "etcd-1").await);
    }

    // ==========================================================================
    // Malformed records
    // ==========================================================================

    #[tokio::test]
    async fn malformed_record_is_neither_acquired_nor_reclaimed() {
        let (mutex, store, _) = memory_mutex(&[]);
        store.insert(malformed());

        for candidate in ["etcd-0", "etcd-1", "ignored"] {
            assert!(!mutex.lock(&cluster(), candidate).await);
        }
        assert_eq!(store.len(), 1);
        assert_eq!(store.deletes(), 0);
    }

    #[tokio::test]
    async fn malformed_record_is_cleared_by_explicit_unlock() {
        let (mutex, store, _) = memory_mutex(&[]);
        store.insert(malformed());

        assert!(mutex.unlock(&cluster()).await);
        assert!(mutex.lock(&cluster(), "etcd-0").await);
        assert_eq!(holder_of(&store).as_deref(), Some("etcd-0"));
    }

    // ==========================================================================
    // Create race
    // ==========================================================================

    #[tokio::test]
    async fn lost_create_race_evaluates_the_winner() {
        let mut store = MockLockStore::new();
        let mut seq = mockall::Sequence::new();
        store
            .expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|ns, name| Err(StoreError::not_found(ns, name)));
        store
            .expect_create()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|r| Err(StoreError::already_exists(&r.namespace, &r.name)));
        store
            .expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(held_by("etcd-0")));
        store.expect_delete().never();

        let oracle = StaticHolderOracle::with_alive(DEFAULT_HOLDER_NAMESPACE, ["etcd-0"]);
        let mutex = EtcdInitMutex::new(Arc::new(store), Arc::new(oracle));
        assert!(!mutex.lock(&cluster(), "etcd-1").await);
    }

    #[tokio::test]
    async fn lost_create_race_to_self_is_acquired() {
        // Another process acting for the same machine won the create
        let mut store = MockLockStore::new();
        let mut seq = mockall::Sequence::new();
        store
            .expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|ns, name| Err(StoreError::not_found(ns, name)));
        store
            .expect_create()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|r| Err(StoreError::already_exists(&r.namespace, &r.name)));
        store
            .expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(held_by("etcd-0")));

        let mutex = EtcdInitMutex::new(Arc::new(store), Arc::new(StaticHolderOracle::new()));
        assert!(mutex.lock(&cluster(), "etcd-0").await);
    }

    #[tokio::test]
    async fn winner_vanishing_before_reread_is_not_acquired() {
        let mut store = MockLockStore::new();
        store
            .expect_get()
            .times(2)
            .returning(|ns, name| Err(StoreError::not_found(ns, name)));
        store
            .expect_create()
            .times(1)
            .returning(|r| Err(StoreError::already_exists(&r.namespace, &r.name)));

        let mutex = EtcdInitMutex::new(Arc::new(store), Arc::new(StaticHolderOracle::new()));
        assert!(!mutex.lock(&cluster(), "etcd-1").await);
    }

    // ==========================================================================
    // Store failures fail closed
    // ==========================================================================

    #[tokio::test]
    async fn read_error_fails_closed_without_writing() {
        let mut store = MockLockStore::new();
        store
            .expect_get()
            .returning(|_, _| Err(StoreError::Other(Error::internal("connection reset"))));
        store.expect_create().never();
        store.expect_delete().never();

        let mutex = EtcdInitMutex::new(Arc::new(store), Arc::new(StaticHolderOracle::new()));
        assert!(!mutex.lock(&cluster(), "etcd-0").await);
        assert!(!mutex.unlock(&cluster()).await);
    }

    #[tokio::test]
    async fn create_error_fails_closed() {
        let mut store = MockLockStore::new();
        store
            .expect_get()
            .times(1)
            .returning(|ns, name| Err(StoreError::not_found(ns, name)));
        store
            .expect_create()
            .withf(|r| {
                r.name == LOCK
                    && r.holder().map(|h| h.machine_name == "etcd-0").unwrap_or(false)
            })
            .times(1)
            .returning(|_| Err(StoreError::Other(Error::internal("admission denied"))));

        let mutex = EtcdInitMutex::new(Arc::new(store), Arc::new(StaticHolderOracle::new()));
        assert!(!mutex.lock(&cluster(), "etcd-0").await);
    }

    // ==========================================================================
    // Unlock
    // ==========================================================================

    #[tokio::test]
    async fn unlock_is_idempotent() {
        let (mutex, store, _) = memory_mutex(&[]);
        assert!(mutex.unlock(&cluster()).await);

        assert!(mutex.lock(&cluster(), "etcd-0").await);
        assert!(mutex.unlock(&cluster()).await);
        assert!(mutex.unlock(&cluster()).await);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unlock_treats_concurrent_delete_as_success() {
        let mut store = MockLockStore::new();
        store.expect_get().returning(|_, _| Ok(held_by("etcd-0")));
        store
            .expect_delete()
            .returning(|ns, name, _| Err(StoreError::not_found(ns, name)));

        let mutex = EtcdInitMutex::new(Arc::new(store), Arc::new(StaticHolderOracle::new()));
        assert!(mutex.unlock(&cluster()).await);
    }

    #[tokio::test]
    async fn unlock_reports_delete_failures() {
        let mut store = MockLockStore::new();
        store.expect_get().returning(|_, _| Ok(held_by("etcd-0")));
        store
            .expect_delete()
            .returning(|_, _, _| Err(StoreError::Other(Error::internal("forbidden"))));

        let mutex = EtcdInitMutex::new(Arc::new(store), Arc::new(StaticHolderOracle::new()));
        assert!(!mutex.unlock(&cluster()).await);
    }

    #[tokio::test]
    async fn unlock_does_not_check_ownership() {
        let (mutex, store, _) = memory_mutex(&["etcd-0"]);
        assert!(mutex.lock(&cluster(), "etcd-0").await);

        // Any caller reaching unlock may release
        assert!(mutex.unlock(&cluster()).await);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn round_trip_hands_the_lock_over() {
        let (mutex, _, _) = memory_mutex(&["m1", "m2"]);

        assert!(mutex.lock(&cluster(), "m1").await);
        assert!(!mutex.lock(&cluster(), "m2").await);
        assert!(mutex.unlock(&cluster()).await);
        assert!(mutex.lock(&cluster(), "m2").await);
    }

    // ==========================================================================
    // Cancellation
    // ==========================================================================

    #[tokio::test]
    async fn cancelled_lock_is_distinct_from_not_acquired() {
        let (mutex, store, _) = memory_mutex(&[]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = mutex
            .try_lock(&cancel, &cluster(), "etcd-0")
            .await
            .expect_err("cancelled call must not report a boolean");
        assert_eq!(err.operation, "lock");
        assert_eq!(err.cluster, "prod");
        assert!(store.is_empty());

        let err = mutex
            .try_unlock(&cancel, &cluster())
            .await
            .expect_err("cancelled unlock must not report a boolean");
        assert_eq!(err.operation, "unlock");
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_hung_oracle() {
        let store = Arc::new(MemoryLockStore::new());
        store.insert(held_by("etcd-0"));
        let mutex = EtcdInitMutex::new(store.clone(), Arc::new(HangingOracle));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = mutex.try_lock(&cancel, &cluster(), "etcd-1").await;
        assert!(result.is_err());
        assert_eq!(store.len(), 1);
    }

    struct HangingOracle;

    #[async_trait::async_trait]
    impl HolderOracle for HangingOracle {
        async fn exists(&self, _namespace: &str, _holder: &str) -> Result<bool, Error> {
            std::future::pending::<()>().await;
            Ok(false)
        }
    }

    #[tokio::test]
    async fn uncancelled_try_lock_matches_lock() {
        let (mutex, _, _) = memory_mutex(&[]);
        let cancel = CancellationToken::new();
        assert_eq!(mutex.try_lock(&cancel, &cluster(), "etcd-0").await, Ok(true));
        assert_eq!(mutex.try_lock(&cancel, &cluster(), "etcd-1").await, Ok(false));
        assert_eq!(mutex.try_unlock(&cancel, &cluster()).await, Ok(true));
    }

    #[test]
    fn cancelled_converts_to_common_error() {
        let err: Error = Cancelled::new("lock", &cluster()).into();
        assert!(err.is_cancelled());
        assert!(err.to_string().contains("team-a/prod"));
    }

    // ==========================================================================
    // Inspect
    // ==========================================================================

    #[tokio::test]
    async fn inspect_reports_each_state() {
        let (mutex, store, _) = memory_mutex(&[]);
        assert_eq!(mutex.inspect(&cluster()).await.expect("inspect"), LockState::Unlocked);

        assert!(mutex.lock(&cluster(), "etcd-0").await);
        assert_eq!(
            mutex.inspect(&cluster()).await.expect("inspect"),
            LockState::Held(HolderInfo::new("etcd-0"))
        );

        assert!(mutex.unlock(&cluster()).await);
        store.insert(malformed());
        assert!(matches!(
            mutex.inspect(&cluster()).await.expect("inspect"),
            LockState::Malformed(_)
        ));
    }

    #[tokio::test]
    async fn inspect_surfaces_store_errors() {
        let mut store = MockLockStore::new();
        store
            .expect_get()
            .returning(|_, _| Err(StoreError::Other(Error::internal("timeout"))));
        let mutex = EtcdInitMutex::new(Arc::new(store), Arc::new(StaticHolderOracle::new()));
        assert!(mutex.inspect(&cluster()).await.is_err());
    }
}
