//! Gateway resources and configs shared by tests across the workspace.

use crate::config::{AuthMode, GatewayConfig, SwitchoverSettings};

/// A gateway with a passthrough source route and a fully declared
/// destination route.
pub const GATEWAY_YAML: &str = r#"
apiVersion: platform.confluent.io/v1beta1
kind: Gateway
metadata:
  name: kafka-gateway
  namespace: kafka
  resourceVersion: "4711"
spec:
  replicas: 3
  streamingDomains:
    - name: msk-source
      type: kafka
      kafkaCluster:
        bootstrapServers:
          - id: iam
            endpoint: b-1.msk.example.com:9098
    - name: cc-destination
      type: kafka
      kafkaCluster:
        bootstrapServers:
          - id: sasl
            endpoint: pkc-abc.us-east-1.aws.confluent.cloud:9092
            tls:
              secretRef: cc-tls
  routes:
    - name: clients
      endpoint: gateway.example.com:9092
      brokerIdentificationStrategy:
        type: host
      streamingDomain:
        name: msk-source
        bootstrapServerId: iam
      security:
        auth: passthrough
    - name: cc-route
      endpoint: gateway.example.com:9192
      streamingDomain:
        name: cc-destination
        bootstrapServerId: sasl
      security:
        auth: swap
        client:
          authentication:
            type: plain
        cluster:
          authentication:
            type: plain
"#;

/// [`GATEWAY_YAML`] after the fence: the `clients` route is read-only
pub fn fenced_gateway_yaml() -> String {
    GATEWAY_YAML.replacen(
        "      endpoint: gateway.example.com:9092\n",
        "      endpoint: gateway.example.com:9092\n      readOnly: true\n",
        1,
    )
}

/// Config matching [`GATEWAY_YAML`]
pub fn gateway_config() -> GatewayConfig {
    GatewayConfig {
        namespace: "kafka".to_string(),
        crd_name: "kafka-gateway".to_string(),
        source_name: "msk-source".to_string(),
        destination_name: "cc-destination".to_string(),
        source_route_name: "clients".to_string(),
        destination_route_name: "cc-route".to_string(),
        auth_mode: AuthMode::DestSwap,
        kube_config_path: None,
        switchover: SwitchoverSettings::default(),
    }
}
