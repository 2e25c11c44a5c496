//! Gateway client: the trait the workflow talks to, and the kube-rs
//! implementation used in production.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use k8s_openapi::api::authorization::v1::{
    ResourceAttributes, SelfSubjectAccessReview, SelfSubjectAccessReviewSpec,
};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::ApiResource;
use kube::{Client, Config};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use cutover_common::poll::poll_until;
use cutover_common::Error;

use crate::config::GatewayConfig;
use crate::{GATEWAY_GROUP, GATEWAY_KIND, GATEWAY_PLURAL, GATEWAY_VERSION};

/// Operations the cutover performs against the gateway.
///
/// Implemented by [`KubeGatewayClient`] in production; tests substitute a
/// mock so the workflow can be driven without a cluster.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Ask the API server whether the caller may `verb` the resource
    async fn check_permissions(
        &self,
        verb: &str,
        resource: &str,
        group: &str,
        namespace: &str,
    ) -> Result<bool, Error>;

    /// Fetch the gateway resource, rendered as YAML
    async fn get_gateway_yaml(&self, namespace: &str, name: &str) -> Result<Vec<u8>, Error>;

    /// Check the gateway YAML against the migration's gateway config
    fn validate_gateway(&self, yaml: &[u8], config: &GatewayConfig) -> Result<(), Error>;

    /// Apply an RFC 6902 patch to the gateway in a single request
    async fn patch_gateway(
        &self,
        namespace: &str,
        name: &str,
        patch: &json_patch::Patch,
    ) -> Result<(), Error>;

    /// Wait until the gateway's pods satisfy `wait`
    async fn wait_for_gateway_pods(
        &self,
        namespace: &str,
        name: &str,
        wait: PodWait,
        poll_interval: Duration,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), Error>;
}

/// What [`GatewayClient::wait_for_gateway_pods`] waits for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PodWait {
    /// Every pod was created after the wait began, and is ready.
    /// Used right after a patch that rolls the pods.
    Recycled,
    /// Every pod is ready and not terminating, however old it is.
    /// Used when resuming after the rollout may already have happened.
    Ready,
}

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a kube client from an optional kubeconfig path.
///
/// Without a path the usual inference applies (in-cluster service account,
/// then `KUBECONFIG` / `~/.kube/config`).
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
    Client::try_from(config).map_err(|e| {
        Error::internal_with_context("create_client", format!("failed to create client: {}", e))
    })
}

fn gateway_api_resource() -> ApiResource {
    ApiResource {
        group: GATEWAY_GROUP.to_string(),
        version: GATEWAY_VERSION.to_string(),
        api_version: format!("{GATEWAY_GROUP}/{GATEWAY_VERSION}"),
        kind: GATEWAY_KIND.to_string(),
        plural: GATEWAY_PLURAL.to_string(),
    }
}

/// [`GatewayClient`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeGatewayClient {
    client: Client,
}

impl KubeGatewayClient {
    /// Wrap an existing kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from an optional kubeconfig path
    pub async fn from_kubeconfig(path: Option<&Path>) -> Result<Self, Error> {
        Ok(Self::new(create_client(path).await?))
    }

    fn gateways(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &gateway_api_resource())
    }
}

#[async_trait]
impl GatewayClient for KubeGatewayClient {
    async fn check_permissions(
        &self,
        verb: &str,
        resource: &str,
        group: &str,
        namespace: &str,
    ) -> Result<bool, Error> {
        let review = SelfSubjectAccessReview {
            spec: SelfSubjectAccessReviewSpec {
                resource_attributes: Some(ResourceAttributes {
                    verb: Some(verb.to_string()),
                    resource: Some(resource.to_string()),
                    group: Some(group.to_string()),
                    namespace: Some(namespace.to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        };

        let api: Api<SelfSubjectAccessReview> = Api::all(self.client.clone());
        let response = api.create(&PostParams::default(), &review).await?;
        let allowed = response.status.map(|s| s.allowed).unwrap_or(false);

        debug!(verb, resource, group, namespace, allowed, "access review");
        Ok(allowed)
    }

    async fn get_gateway_yaml(&self, namespace: &str, name: &str) -> Result<Vec<u8>, Error> {
        let gateway = self.gateways(namespace).get(name).await?;
        let yaml = serde_yaml::to_string(&gateway)
            .map_err(|e| Error::serialization(format!("failed to render gateway {name}: {e}")))?;
        Ok(yaml.into_bytes())
    }

    fn validate_gateway(&self, yaml: &[u8], config: &GatewayConfig) -> Result<(), Error> {
        crate::validate::validate_gateway(yaml, config)
    }

    async fn patch_gateway(
        &self,
        namespace: &str,
        name: &str,
        patch: &json_patch::Patch,
    ) -> Result<(), Error> {
        self.gateways(namespace)
            .patch(name, &PatchParams::default(), &Patch::Json::<()>(patch.clone()))
            .await?;
        info!(gateway = %name, namespace, ops = patch.0.len(), "patched gateway");
        Ok(())
    }

    async fn wait_for_gateway_pods(
        &self,
        namespace: &str,
        name: &str,
        wait: PodWait,
        poll_interval: Duration,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(&format!("app={name}"));
        // API server timestamps have second precision
        let since = match wait {
            PodWait::Recycled => Some(Utc::now().trunc_subsecs(0)),
            PodWait::Ready => None,
        };
        let operation = match wait {
            PodWait::Recycled => format!("waiting for gateway {name} pods to recycle"),
            PodWait::Ready => format!("waiting for gateway {name} pods to be ready"),
        };

        poll_until(cancel, timeout, poll_interval, &operation, || {
            let pods = pods.clone();
            let params = params.clone();
            async move {
                let list = pods.list(&params).await?;
                let settled = pods_settled(&list.items, since);
                debug!(pods = list.items.len(), settled, ?wait, "gateway pod check");
                Ok(settled)
            }
        })
        .await?;

        info!(gateway = %name, namespace, ?wait, "gateway pods settled");
        Ok(())
    }
}

/// True when there is at least one pod and every pod is not terminating and
/// reports `Ready=True`. With `since`, every pod must also have been created
/// at or after it.
pub fn pods_settled(pods: &[Pod], since: Option<DateTime<Utc>>) -> bool {
    !pods.is_empty()
        && pods.iter().all(|pod| {
            let fresh = match since {
                Some(since) => creation_time(pod).is_some_and(|created| created >= since),
                None => true,
            };
            let terminating = pod.metadata.deletion_timestamp.is_some();
            fresh && !terminating && is_pod_ready(pod)
        })
}

fn is_pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conds| {
            conds
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}

// Goes through the RFC 3339 wire form so this doesn't depend on which time
// library k8s-openapi wraps.
fn creation_time(pod: &Pod) -> Option<DateTime<Utc>> {
    let ts = pod.metadata.creation_timestamp.as_ref()?;
    let value = serde_json::to_value(ts).ok()?;
    DateTime::parse_from_rfc3339(value.as_str()?)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
