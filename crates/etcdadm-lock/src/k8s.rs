//! Kubernetes-backed store and oracle
//!
//! Lock records are ConfigMaps in the cluster's namespace; holders are CAPI
//! Machines. The API server provides the atomicity: `create` fails with
//! `AlreadyExists` for an existing name, and deletes with a uid precondition
//! fail with `Conflict` when the object was recreated.
//!
//! A 404 for a Machine only counts as "holder gone" while discovery shows the
//! Machine kind is served. The API server answers 404 for unserved resource
//! paths too, and that must not look like a dead holder.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, DynamicObject, PostParams, Preconditions};
use kube::discovery::ApiResource;
use kube::Client;
use parking_lot::Mutex;
use tracing::debug;

use etcdadm_common::kube_utils::{
    build_api_resource_with_discovery, is_already_exists, is_not_found,
};
use etcdadm_common::{Error, CAPI_GROUP};

use crate::config::LockConfig;
use crate::oracle::HolderOracle;
use crate::record::LockRecord;
use crate::store::{LockStore, StoreError};

/// Kind of the CAPI objects that hold locks
pub const MACHINE_KIND: &str = "Machine";

/// Lock store persisting records as ConfigMaps
#[derive(Clone)]
pub struct ConfigMapLockStore {
    client: Client,
    field_manager: String,
}

impl ConfigMapLockStore {
    /// Create a store using the configured field manager
    pub fn new(client: Client, config: &LockConfig) -> Self {
        Self {
            client,
            field_manager: config.field_manager.clone(),
        }
    }

    fn api(&self, namespace: &str) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl LockStore for ConfigMapLockStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<LockRecord, StoreError> {
        match self.api(namespace).get(name).await {
            Ok(cm) => Ok(record_from_config_map(namespace, name, cm)),
            Err(e) if is_not_found(&e) => Err(StoreError::not_found(namespace, name)),
            Err(e) => Err(StoreError::Other(e.into())),
        }
    }

    async fn create(&self, record: &LockRecord) -> Result<(), StoreError> {
        let params = PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        };
        match self
            .api(&record.namespace)
            .create(&params, &config_map_from_record(record))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_already_exists(&e) => Err(StoreError::already_exists(
                &record.namespace,
                &record.name,
            )),
            Err(e) => Err(StoreError::Other(e.into())),
        }
    }

    async fn delete(
        &self,
        namespace: &str,
        name: &str,
        expected_uid: Option<String>,
    ) -> Result<(), StoreError> {
        let conditional = expected_uid.is_some();
        let params = DeleteParams {
            preconditions: expected_uid.map(|uid| Preconditions {
                uid: Some(uid),
                resource_version: None,
            }),
            ..Default::default()
        };
        match self.api(namespace).delete(name, &params).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Err(StoreError::not_found(namespace, name)),
            Err(kube::Error::Api(ae)) if conditional && ae.code == 409 => {
                debug!(namespace, name, reason = %ae.reason, "Delete precondition failed");
                Err(StoreError::conflict(namespace, name))
            }
            Err(e) => Err(StoreError::Other(e.into())),
        }
    }
}

/// Holder oracle that looks up CAPI Machines by name
///
/// The Machine `ApiResource` is resolved through discovery and cached; every
/// 404 re-runs discovery before the holder is reported absent.
#[derive(Clone)]
pub struct MachineHolderOracle {
    client: Client,
    resource: Arc<Mutex<Option<ApiResource>>>,
}

impl MachineHolderOracle {
    /// Create an oracle
    pub fn new(client: Client) -> Self {
        Self {
            client,
            resource: Arc::new(Mutex::new(None)),
        }
    }

    async fn machine_resource(&self, refresh: bool) -> Result<ApiResource, Error> {
        if !refresh {
            if let Some(ar) = self.resource.lock().clone() {
                return Ok(ar);
            }
        }
        match build_api_resource_with_discovery(&self.client, CAPI_GROUP, MACHINE_KIND).await {
            Ok(ar) => {
                *self.resource.lock() = Some(ar.clone());
                Ok(ar)
            }
            Err(e) => {
                *self.resource.lock() = None;
                Err(e)
            }
        }
    }

    async fn get_machine(
        &self,
        ar: &ApiResource,
        namespace: &str,
        holder: &str,
    ) -> Result<bool, kube::Error> {
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, ar);
        match api.get(holder).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl HolderOracle for MachineHolderOracle {
    async fn exists(&self, namespace: &str, holder: &str) -> Result<bool, Error> {
        let ar = self.machine_resource(false).await?;
        if self.get_machine(&ar, namespace, holder).await? {
            return Ok(true);
        }

        // Confirm the 404 came from a served Machine type
        let current = self.machine_resource(true).await?;
        if current.api_version == ar.api_version {
            debug!(namespace, holder, "Machine not found");
            return Ok(false);
        }
        debug!(
            namespace,
            holder,
            api_version = %current.api_version,
            "Machine version changed, retrying lookup"
        );
        Ok(self.get_machine(&current, namespace, holder).await?)
    }
}

/// Render a lock record as the ConfigMap stored on the cluster
pub fn config_map_from_record(record: &LockRecord) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(record.name.clone()),
            namespace: Some(record.namespace.clone()),
            labels: (!record.labels.is_empty()).then(|| record.labels.clone()),
            owner_references: record.owner.clone().map(|owner| vec![owner]),
            ..Default::default()
        },
        data: Some(record.data.clone()),
        ..Default::default()
    }
}

/// Read a lock record out of a stored ConfigMap
///
/// `namespace` and `name` are the key it was fetched by; they fill in for
/// metadata the server always returns but the type leaves optional.
pub fn record_from_config_map(namespace: &str, name: &str, cm: ConfigMap) -> LockRecord {
    let ConfigMap { metadata, data, .. } = cm;
    LockRecord {
        namespace: metadata.namespace.unwrap_or_else(|| namespace.to_string()),
        name: metadata.name.unwrap_or_else(|| name.to_string()),
        uid: metadata.uid,
        labels: metadata.labels.unwrap_or_default(),
        owner: metadata
            .owner_references
            .and_then(|refs| refs.into_iter().next()),
        data: data.unwrap_or_else(BTreeMap::new),
    }
}
