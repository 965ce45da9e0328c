//! Shared Kubernetes utilities using kube-rs
//!
//! Status-code classification for API errors, discovery-backed `ApiResource`
//! resolution for CAPI types that have no generated bindings, and client
//! creation.

use std::path::Path;
use std::time::Duration;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::{ApiResource, Discovery};
use kube::{Client, Config};
use tracing::{debug, warn};

use crate::Error;

// =============================================================================
// API Error Classification
// =============================================================================

/// Whether a kube error is an API 404
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

/// Whether a kube error is a create conflict on an existing object
///
/// A 409 is also returned for resourceVersion conflicts on update; only the
/// `AlreadyExists` reason means a create lost to an existing object.
pub fn is_already_exists(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists")
}

// =============================================================================
// API Discovery
// =============================================================================

/// Resolve the served `ApiResource` for a kind through API discovery.
///
/// Searches every served version of `group`, preferring the most stable one,
/// so installs that only serve an older version still resolve. Returns an
/// error when the group or kind is not served at all; callers must not treat
/// that like a missing object.
pub async fn build_api_resource_with_discovery(
    client: &Client,
    group: &str,
    kind: &str,
) -> Result<ApiResource, Error> {
    let discovery = Discovery::new(client.clone())
        .filter(&[group])
        .run()
        .await
        .map_err(|e| {
            Error::internal_with_context(
                "build_api_resource_with_discovery",
                format!("API discovery failed: {}", e),
            )
        })?;

    for api_group in discovery.groups() {
        if api_group.name() != group {
            continue;
        }
        for (ar, _caps) in api_group.resources_by_stability() {
            if ar.kind == kind {
                debug!(
                    group = %group,
                    kind = %kind,
                    api_version = %ar.api_version,
                    "discovered resource version"
                );
                return Ok(ar);
            }
        }
    }

    warn!(group = %group, kind = %kind, "Resource not found in API discovery");
    Err(Error::internal_with_context(
        "build_api_resource_with_discovery",
        format!("resource {}/{} is not served by the API server", group, kind),
    ))
}

// =============================================================================
// Client Creation
// =============================================================================

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a kube client from optional kubeconfig path with default timeouts
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client, Error> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::internal_with_context(
                    "create_client",
                    format!("failed to read kubeconfig {}: {}", path.display(), e),
                )
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    Error::internal_with_context(
                        "create_client",
                        format!("failed to load kubeconfig: {}", e),
                    )
                })?
        }
        None => Config::infer().await.map_err(|e| {
            Error::internal_with_context("create_client", format!("failed to infer config: {}", e))
        })?,
    };
    config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
    config.read_timeout = Some(DEFAULT_READ_TIMEOUT);
    debug!(cluster_url = %config.cluster_url, "Creating kube client");
    Client::try_from(config).map_err(|e| {
        Error::internal_with_context("create_client", format!("failed to create client: {}", e))
    })
}
