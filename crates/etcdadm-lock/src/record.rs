//! The lock record: the persisted semaphore for one cluster
//!
//! A record is written once by the candidate whose create wins and is never
//! updated in place. Its only payload is the holder information, serialized
//! as JSON under [`LOCK_INFORMATION_KEY`].

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use serde::{Deserialize, Serialize};

use etcdadm_common::{Error, CLUSTER_NAME_LABEL, LOCK_INFORMATION_KEY};

use crate::identity::ClusterRef;

/// Identity of the machine that holds the lock
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderInfo {
    /// Name of the holder Machine
    #[serde(rename = "machineName")]
    pub machine_name: String,
}

impl HolderInfo {
    /// Holder information for a machine
    pub fn new(machine_name: impl Into<String>) -> Self {
        Self {
            machine_name: machine_name.into(),
        }
    }
}

/// A lock record as stored
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LockRecord {
    /// Namespace of the record (the cluster's namespace)
    pub namespace: String,
    /// Record name, `<cluster><suffix>`
    pub name: String,
    /// Store-assigned identity of this incarnation; `None` until persisted
    pub uid: Option<String>,
    /// Labels attached for selection and garbage collection
    pub labels: BTreeMap<String, String>,
    /// Back-reference to the owning cluster
    pub owner: Option<OwnerReference>,
    /// Raw payload
    pub data: BTreeMap<String, String>,
}

impl LockRecord {
    /// Build the record `holder` would create to lock `cluster`
    pub fn new(
        cluster: &ClusterRef,
        name: impl Into<String>,
        holder: &HolderInfo,
    ) -> Result<Self, Error> {
        let payload = serde_json::to_string(holder).map_err(|e| {
            Error::serialization_for(
                "HolderInfo",
                format!("failed to marshal lock information: {}", e),
            )
        })?;

        let mut labels = BTreeMap::new();
        labels.insert(CLUSTER_NAME_LABEL.to_string(), cluster.name.clone());

        let mut data = BTreeMap::new();
        data.insert(LOCK_INFORMATION_KEY.to_string(), payload);

        Ok(Self {
            namespace: cluster.namespace.clone(),
            name: name.into(),
            uid: None,
            labels,
            owner: cluster.owner_reference(),
            data,
        })
    }

    /// Decode the holder information
    ///
    /// Fails for a missing payload, invalid JSON, or an empty machine name. A
    /// record that fails here says nothing about whether a real holder exists.
    pub fn holder(&self) -> Result<HolderInfo, Error> {
        let raw = self.data.get(LOCK_INFORMATION_KEY).ok_or_else(|| {
            Error::serialization_for(
                "HolderInfo",
                format!("lock record {} has no {} entry", self.name, LOCK_INFORMATION_KEY),
            )
        })?;

        let info: HolderInfo = serde_json::from_str(raw).map_err(|e| {
            Error::serialization_for(
                "HolderInfo",
                format!("failed to unmarshal lock information: {}", e),
            )
        })?;

        if info.machine_name.is_empty() {
            return Err(Error::serialization_for(
                "HolderInfo",
                format!("lock record {} names no machine", self.name),
            ));
        }
        Ok(info)
    }
}
