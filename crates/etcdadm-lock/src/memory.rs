//! In-memory implementations of the store and oracle capabilities
//!
//! `MemoryLockStore` has the same atomicity as the API server for the three
//! operations the mutex uses: create checks and inserts under one lock, and
//! deletes honour the uid precondition. Share one instance between several
//! [`EtcdInitMutex`](crate::EtcdInitMutex) values to model independent
//! processes racing on the same cluster.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use etcdadm_common::Error;

use crate::oracle::HolderOracle;
use crate::record::LockRecord;
use crate::store::{LockStore, StoreError};

type Key = (String, String);

/// Lock store backed by a map
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    records: Mutex<BTreeMap<Key, LockRecord>>,
    next_uid: AtomicU64,
    creates: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryLockStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a record directly, bypassing create semantics
    ///
    /// Used to seed state such as records written by other tools. Returns the
    /// uid assigned to the stored record.
    pub fn insert(&self, mut record: LockRecord) -> String {
        let uid = self.assign_uid();
        record.uid = Some(uid.clone());
        self.records
            .lock()
            .insert((record.namespace.clone(), record.name.clone()), record);
        uid
    }

    /// Current record for a key
    pub fn record(&self, namespace: &str, name: &str) -> Option<LockRecord> {
        self.records
            .lock()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Number of records stored
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Successful creates so far
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Successful deletes so far
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn assign_uid(&self) -> String {
        format!("mem-{}", self.next_uid.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<LockRecord, StoreError> {
        self.record(namespace, name)
            .ok_or_else(|| StoreError::not_found(namespace, name))
    }

    async fn create(&self, record: &LockRecord) -> Result<(), StoreError> {
        if record.namespace.is_empty() || record.name.is_empty() {
            return Err(Error::validation("lock record needs a namespace and a name").into());
        }

        let key = (record.namespace.clone(), record.name.clone());
        let mut records = self.records.lock();
        if records.contains_key(&key) {
            return Err(StoreError::already_exists(&record.namespace, &record.name));
        }
        let mut stored = record.clone();
        stored.uid = Some(self.assign_uid());
        records.insert(key, stored);
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(
        &self,
        namespace: &str,
        name: &str,
        expected_uid: Option<String>,
    ) -> Result<(), StoreError> {
        let key = (namespace.to_string(), name.to_string());
        let mut records = self.records.lock();
        let current = records
            .get(&key)
            .ok_or_else(|| StoreError::not_found(namespace, name))?;
        if let Some(expected) = expected_uid {
            if current.uid.as_deref() != Some(expected.as_str()) {
                return Err(StoreError::conflict(namespace, name));
            }
        }
        records.remove(&key);
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Oracle answering from a fixed set of live holders
#[derive(Debug, Default)]
pub struct StaticHolderOracle {
    alive: Mutex<BTreeSet<Key>>,
}

impl StaticHolderOracle {
    /// Oracle where nobody exists
    pub fn new() -> Self {
        Self::default()
    }

    /// Oracle where the given holders exist in `namespace`
    pub fn with_alive<I, S>(namespace: &str, holders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let oracle = Self::new();
        for holder in holders {
            oracle.add(namespace, holder);
        }
        oracle
    }

    /// Mark a holder as existing
    pub fn add(&self, namespace: &str, holder: impl Into<String>) {
        self.alive.lock().insert((namespace.to_string(), holder.into()));
    }

    /// Mark a holder as gone
    pub fn remove(&self, namespace: &str, holder: &str) {
        self.alive
            .lock()
            .remove(&(namespace.to_string(), holder.to_string()));
    }
}

#[async_trait]
impl HolderOracle for StaticHolderOracle {
    async fn exists(&self, namespace: &str, holder: &str) -> Result<bool, Error> {
        Ok(self
            .alive
            .lock()
            .contains(&(namespace.to_string(), holder.to_string())))
    }
}
