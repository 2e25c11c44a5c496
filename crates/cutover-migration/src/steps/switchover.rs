//! Leaving `promoted`: repoint the gateway at the destination.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use cutover_common::poll::ensure_not_cancelled;
use cutover_common::Error;
use cutover_gateway::{plan_switchover, GatewayClient, GatewayConfig, PodWait, SwitchoverPlan};

/// Applies the switchover patch and waits for the gateway to roll
#[derive(Clone, Debug)]
pub struct GatewaySwitchover {
    /// Time between pod checks
    pub pod_poll_interval: Duration,
    /// How long the pods get to recycle
    pub pod_timeout: Duration,
}

impl Default for GatewaySwitchover {
    fn default() -> Self {
        Self {
            pod_poll_interval: Duration::from_secs(5),
            pod_timeout: Duration::from_secs(5 * 60),
        }
    }
}

impl GatewaySwitchover {
    /// Patch the gateway (unless a previous attempt already did) and wait
    /// for its pods.
    ///
    /// After a fresh patch every pod must be recycled. When the patch was
    /// already in place the rollout may have finished before this attempt
    /// began, so ready pods are enough.
    pub async fn run(
        &self,
        gateway: &dyn GatewayClient,
        config: &GatewayConfig,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        ensure_not_cancelled(cancel, "switching gateway")?;
        let namespace = config.namespace.as_str();
        let name = config.crd_name.as_str();

        let yaml = gateway.get_gateway_yaml(namespace, name).await?;
        let wait = match plan_switchover(&yaml, config)? {
            SwitchoverPlan::AlreadyApplied => {
                info!(gateway = %name, "switchover patch already applied, waiting for pods");
                PodWait::Ready
            }
            SwitchoverPlan::Apply { route_index, patch } => {
                info!(
                    gateway = %name,
                    route = %config.source_route_name,
                    route_index,
                    domain = %config.switchover_domain_name(),
                    "applying switchover patch"
                );
                gateway.patch_gateway(namespace, name, &patch).await?;
                PodWait::Recycled
            }
        };

        gateway
            .wait_for_gateway_pods(
                namespace,
                name,
                wait,
                self.pod_poll_interval,
                self.pod_timeout,
                cancel,
            )
            .await?;

        info!(gateway = %name, "gateway switched over");
        Ok(())
    }
}
