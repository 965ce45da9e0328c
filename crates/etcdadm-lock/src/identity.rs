//! Typed reference to the CAPI Cluster a lock guards

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::DynamicObject;

use etcdadm_common::{Error, CAPI_API_VERSION};

/// Kind of the CAPI object that owns lock records
pub const CLUSTER_KIND: &str = "Cluster";

/// Identity of the cluster whose etcd initialization is being guarded
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterRef {
    /// Cluster namespace; lock records live here
    pub namespace: String,
    /// Cluster name
    pub name: String,
    /// Cluster UID, required for the owner reference on the lock record
    pub uid: Option<String>,
    /// apiVersion of the Cluster object
    pub api_version: String,
    /// Kind of the Cluster object
    pub kind: String,
}

impl ClusterRef {
    /// Reference a CAPI Cluster by namespace and name
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            uid: None,
            api_version: CAPI_API_VERSION.to_string(),
            kind: CLUSTER_KIND.to_string(),
        }
    }

    /// Attach the Cluster's UID
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Owner reference pointing at this cluster
    ///
    /// `None` without a UID: the API server rejects owner references with an
    /// empty UID, so such records are simply not garbage collected.
    pub fn owner_reference(&self) -> Option<OwnerReference> {
        let uid = self.uid.as_ref()?;
        Some(OwnerReference {
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
            name: self.name.clone(),
            uid: uid.clone(),
            ..Default::default()
        })
    }
}

impl TryFrom<&DynamicObject> for ClusterRef {
    type Error = Error;

    fn try_from(obj: &DynamicObject) -> Result<Self, Self::Error> {
        let types = obj
            .types
            .as_ref()
            .ok_or_else(|| Error::unexpected_kind(CLUSTER_KIND, "object without type metadata"))?;
        if types.kind != CLUSTER_KIND {
            return Err(Error::unexpected_kind(CLUSTER_KIND, types.kind.clone()));
        }

        let name = obj
            .metadata
            .name
            .clone()
            .ok_or_else(|| Error::validation_for_field("metadata.name", "Cluster has no name"))?;
        let namespace = obj.metadata.namespace.clone().ok_or_else(|| {
            Error::validation_for_field("metadata.namespace", "Cluster has no namespace")
        })?;

        Ok(Self {
            namespace,
            name,
            uid: obj.metadata.uid.clone(),
            api_version: types.api_version.clone(),
            kind: types.kind.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::TypeMeta;

    fn dynamic(kind: &str, name: Option<&str>, namespace: Option<&str>) -> DynamicObject {
        let mut obj: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "cluster.x-k8s.io/v1beta1",
            "kind": kind,
            "metadata": {}
        }))
        .expect("dynamic object should deserialize");
        obj.metadata.name = name.map(str::to_string);
        obj.metadata.namespace = namespace.map(str::to_string);
        obj.metadata.uid = Some("uid-1234".to_string());
        obj
    }

    #[test]
    fn cluster_object_converts_with_its_served_version() {
        let obj = dynamic("Cluster", Some("prod"), Some("team-a"));
        let cluster = ClusterRef::try_from(&obj).expect("Cluster should convert");

        assert_eq!(cluster.name, "prod");
        assert_eq!(cluster.namespace, "team-a");
        assert_eq!(cluster.uid.as_deref(), Some("uid-1234"));
        assert_eq!(cluster.api_version, "cluster.x-k8s.io/v1beta1");
    }

    #[test]
    fn machine_object_is_rejected_as_unexpected_kind() {
        let obj = dynamic("Machine", Some("prod-etcd-0"), Some("team-a"));
        match ClusterRef::try_from(&obj) {
            Err(Error::UnexpectedKind { expected, actual }) => {
                assert_eq!(expected, "Cluster");
                assert_eq!(actual, "Machine");
            }
            other => panic!("Expected UnexpectedKind, got {:?}", other),
        }
    }

    #[test]
    fn untyped_object_is_rejected() {
        let mut obj = dynamic("Cluster", Some("prod"), Some("team-a"));
        obj.types = None;
        assert!(matches!(
            ClusterRef::try_from(&obj),
            Err(Error::UnexpectedKind { .. })
        ));
    }

    #[test]
    fn missing_namespace_is_a_validation_error() {
        let obj = dynamic("Cluster", Some("prod"), None);
        match ClusterRef::try_from(&obj) {
            Err(Error::Validation { field, .. }) => {
                assert_eq!(field.as_deref(), Some("metadata.namespace"))
            }
            other => panic!("Expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn owner_reference_requires_uid() {
        let cluster = ClusterRef::new("team-a", "prod");
        assert!(cluster.owner_reference().is_none());

        let owner = cluster
            .with_uid("abc-123")
            .owner_reference()
            .expect("owner reference with uid");
        assert_eq!(owner.kind, "Cluster");
        assert_eq!(owner.name, "prod");
        assert_eq!(owner.uid, "abc-123");
        assert_eq!(owner.api_version, CAPI_API_VERSION);
        assert_eq!(owner.controller, None);
    }

    #[test]
    fn type_meta_kind_comparison_is_exact() {
        let mut obj = dynamic("Cluster", Some("prod"), Some("team-a"));
        obj.types = Some(TypeMeta {
            api_version: "cluster.x-k8s.io/v1beta2".to_string(),
            kind: "ClusterClass".to_string(),
        });
        assert!(ClusterRef::try_from(&obj).is_err());
    }
}
