//! Leaving `lags_ok`: stop producers writing to the source cluster.
//!
//! Promotion can't be undone, so the gateway is re-validated first and a
//! gateway that was edited since initialization is caught here rather than
//! at switchover. The fence itself marks the source route read-only.

use tokio_util::sync::CancellationToken;
use tracing::info;

use cutover_common::poll::ensure_not_cancelled;
use cutover_common::Error;
use cutover_gateway::{plan_fence, FencePlan, GatewayClient, GatewayConfig};

/// Re-validate the gateway, then make the source route read-only unless a
/// previous attempt already did.
pub async fn fence_gateway(
    gateway: &dyn GatewayClient,
    config: &GatewayConfig,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    ensure_not_cancelled(cancel, "fencing gateway")?;
    let namespace = config.namespace.as_str();
    let name = config.crd_name.as_str();

    let yaml = gateway.get_gateway_yaml(namespace, name).await?;
    gateway.validate_gateway(&yaml, config)?;

    match plan_fence(&yaml, config)? {
        FencePlan::AlreadyFenced => {
            info!(gateway = %name, route = %config.source_route_name, "source route already read-only");
        }
        FencePlan::Apply { route_index, patch } => {
            info!(
                gateway = %name,
                route = %config.source_route_name,
                route_index,
                "marking source route read-only"
            );
            gateway.patch_gateway(namespace, name, &patch).await?;
        }
    }

    info!(gateway = %name, namespace, "gateway fenced");
    Ok(())
}
