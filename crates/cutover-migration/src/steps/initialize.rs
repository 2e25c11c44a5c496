//! Leaving `uninitialized`: check everything before touching anything.

use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use cutover_common::poll::ensure_not_cancelled;
use cutover_common::Error;
use cutover_gateway::{GatewayClient, GatewayConfig, GATEWAY_GROUP, GATEWAY_PLURAL};
use cutover_link::{restrict_to, split_by_activity, ClusterLinkClient, ClusterLinkConfig};

const OPERATION: &str = "initializing migration";

/// What initialization learned; written onto the record only on success
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitSnapshot {
    /// Topics taking part in the migration
    pub topics: Vec<String>,
    /// Every mirror topic on the link
    pub cluster_link_topics: Vec<String>,
    /// Link configuration
    pub cluster_link_configs: BTreeMap<String, String>,
    /// Gateway resource before any change
    pub initial_gateway_yaml: String,
}

/// Validate permissions, the gateway and the cluster link.
///
/// Every check is fatal. Nothing is mutated on either side.
pub async fn initialize(
    gateway: &dyn GatewayClient,
    link: &dyn ClusterLinkClient,
    gateway_config: &GatewayConfig,
    link_config: &ClusterLinkConfig,
    cancel: &CancellationToken,
) -> Result<InitSnapshot, Error> {
    ensure_not_cancelled(cancel, OPERATION)?;
    let namespace = gateway_config.namespace.as_str();

    let allowed = gateway
        .check_permissions("update", GATEWAY_PLURAL, GATEWAY_GROUP, namespace)
        .await?;
    if !allowed {
        return Err(Error::permission_denied(
            "update",
            format!("{GATEWAY_PLURAL}.{GATEWAY_GROUP}"),
            namespace,
        ));
    }

    let yaml = gateway
        .get_gateway_yaml(namespace, &gateway_config.crd_name)
        .await?;
    gateway.validate_gateway(&yaml, gateway_config)?;
    debug!(gateway = %gateway_config.crd_name, "gateway validated");

    ensure_not_cancelled(cancel, OPERATION)?;
    let mirrors = link.list_mirror_topics(link_config).await?;
    let available: Vec<String> = mirrors.iter().map(|t| t.name.clone()).collect();
    let (active, inactive) = split_by_activity(&mirrors);
    debug!(
        active = active.len(),
        inactive = inactive.len(),
        "mirror topics on link"
    );

    let topics = if link_config.topics.is_empty() {
        info!(count = available.len(), "no topic list given, migrating every mirror topic");
        available.clone()
    } else {
        link.validate_topics(&link_config.topics, &available)?;
        link_config.topics.clone()
    };

    let not_active: Vec<String> = restrict_to(&mirrors, &topics)
        .into_iter()
        .filter(|t| !t.is_active())
        .map(|t| format!("{} ({})", t.name, t.status))
        .collect();
    if !not_active.is_empty() {
        return Err(Error::validation(format!(
            "mirror topics are not active: [{}]",
            not_active.join(", ")
        )));
    }

    let configs = link.list_configs(link_config).await?;

    info!(
        topics = topics.len(),
        link = %link_config.link_name,
        gateway = %gateway_config.crd_name,
        "initialization checks passed"
    );

    Ok(InitSnapshot {
        topics,
        cluster_link_topics: available,
        cluster_link_configs: configs,
        initial_gateway_yaml: String::from_utf8_lossy(&yaml).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{gateway_config, healthy_gateway, link_config, names, FakeLink, MockGateway};
    use cutover_link::{MirrorStatus, MirrorTopic};

    #[tokio::test]
    async fn explicit_topics_are_kept_and_link_topics_recorded() {
        let gw = healthy_gateway(1, 0, 0);
        let link = FakeLink::caught_up(&["orders", "payments"]);

        let snapshot = initialize(
            &gw,
            &link,
            &gateway_config(),
            &link_config(&["orders"]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(snapshot.topics, names(&["orders"]));
        assert_eq!(snapshot.cluster_link_topics, names(&["orders", "payments"]));
        assert_eq!(snapshot.cluster_link_configs["consumer.offset.sync.enable"], "true");
        assert!(snapshot.initial_gateway_yaml.contains("kafka-gateway"));
    }

    #[tokio::test]
    async fn empty_topic_list_adopts_every_mirror() {
        let gw = healthy_gateway(1, 0, 0);
        let link = FakeLink::caught_up(&["orders", "payments"]);

        let snapshot = initialize(
            &gw,
            &link,
            &gateway_config(),
            &link_config(&[]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(snapshot.topics, names(&["orders", "payments"]));
    }

    #[tokio::test]
    async fn topic_missing_from_link_is_named() {
        let gw = healthy_gateway(1, 0, 0);
        let link = FakeLink::caught_up(&["orders", "payments"]);

        let err = initialize(
            &gw,
            &link,
            &gateway_config(),
            &link_config(&["orders", "refunds"]),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("refunds"));
    }

    #[tokio::test]
    async fn inactive_mirrors_are_all_listed() {
        let gw = healthy_gateway(1, 0, 0);
        let link = FakeLink::new(vec![
            MirrorTopic::new("orders", MirrorStatus::Paused, &[0]),
            MirrorTopic::new("payments", MirrorStatus::Failed, &[0]),
            MirrorTopic::new("audit", MirrorStatus::Active, &[0]),
        ]);

        let err = initialize(
            &gw,
            &link,
            &gateway_config(),
            &link_config(&[]),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("orders (PAUSED)"));
        assert!(msg.contains("payments (FAILED)"));
        assert!(!msg.contains("audit"));
    }

    #[tokio::test]
    async fn permission_denied_stops_before_reading_gateway() {
        let mut gw = MockGateway::new();
        gw.expect_check_permissions()
            .withf(|verb, resource, group, ns| {
                verb == "update"
                    && resource == "gateways"
                    && group == "platform.confluent.io"
                    && ns == "kafka"
            })
            .times(1)
            .returning(|_, _, _, _| Ok(false));
        gw.expect_get_gateway_yaml().never();
        let link = FakeLink::caught_up(&["orders"]);

        let err = initialize(
            &gw,
            &link,
            &gateway_config(),
            &link_config(&["orders"]),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::PermissionDenied { .. }));
        assert_eq!(link.lists(), 0);
    }

    #[tokio::test]
    async fn invalid_gateway_stops_before_listing_topics() {
        let gw = healthy_gateway(1, 0, 0);
        let link = FakeLink::caught_up(&["orders"]);
        let mut config = gateway_config();
        config.destination_route_name = "missing-route".to_string();

        let err = initialize(
            &gw,
            &link,
            &config,
            &link_config(&["orders"]),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("missing-route"));
        assert_eq!(link.lists(), 0);
    }
}
