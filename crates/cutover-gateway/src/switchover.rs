//! The switchover patch.
//!
//! A single RFC 6902 document with exactly two operations, applied in one
//! request so the gateway never serves a route that points at a domain that
//! doesn't exist yet:
//!
//! 1. `add /spec/streamingDomains/-`: the destination cluster as a new domain
//! 2. `replace /spec/routes/<i>`: the source route, now forwarding to it
//!
//! The source route must be fenced beforehand. The replacement route is
//! writable again, so producers resume against the destination.

use json_patch::{AddOperation, Patch, PatchOperation, ReplaceOperation};
use jsonptr::PointerBuf;
use tracing::{debug, info};

use cutover_common::Error;

use crate::config::GatewayConfig;
use crate::model::{
    parse_gateway, Authentication, BootstrapServer, BrokerIdentificationStrategy, DomainRef,
    GatewaySpec, KafkaCluster, NodeIdRange, Route, RouteSecurity, SecretRef, SideSecurity,
    StreamingDomain,
};
use crate::SECURITY_SWAP;

/// What the switchover has to do against the current gateway
#[derive(Debug, Clone, PartialEq)]
pub enum SwitchoverPlan {
    /// A previous attempt already applied the patch; only the pod wait is left
    AlreadyApplied,
    /// Apply this patch
    Apply {
        /// Index of the source route inside `spec.routes`
        route_index: usize,
        /// The two-operation patch
        patch: Patch,
    },
}

/// Work out the switchover patch for the gateway in `yaml`.
///
/// Fails if the source route has disappeared or was never fenced, if the
/// destination endpoint cannot be determined, or if a domain with the
/// switchover name exists but the route doesn't use it (someone else owns
/// that name).
pub fn plan_switchover(yaml: &[u8], config: &GatewayConfig) -> Result<SwitchoverPlan, Error> {
    let gateway = parse_gateway(yaml)?;
    let spec = &gateway.spec;

    let route_index = spec.route_index(&config.source_route_name).ok_or_else(|| {
        Error::validation(format!(
            "source route '{}' no longer exists in gateway; available routes: [{}]",
            config.source_route_name,
            spec.route_names().join(", ")
        ))
    })?;
    let route = &spec.routes[route_index];

    let domain_name = config.switchover_domain_name();
    if spec.domain(&domain_name).is_some() {
        if route.domain_name() == Some(domain_name.as_str()) {
            info!(
                route = %route.name,
                domain = %domain_name,
                "switchover patch already applied"
            );
            return Ok(SwitchoverPlan::AlreadyApplied);
        }
        return Err(Error::validation(format!(
            "streaming domain '{domain_name}' already exists but route '{}' forwards to '{}'",
            route.name,
            route.domain_name().unwrap_or("<none>")
        )));
    }
    if !route.is_fenced() {
        return Err(Error::validation(format!(
            "source route '{}' is not fenced; producers could still be writing to '{}'",
            route.name,
            route.domain_name().unwrap_or("<none>")
        )));
    }

    let domain = build_domain(spec, config, &domain_name)?;
    let new_route = build_route(route, config, &domain_name);

    let domain_value = serde_json::to_value(&domain)
        .map_err(|e| Error::serialization(format!("failed to encode streaming domain: {e}")))?;
    let route_value = serde_json::to_value(&new_route)
        .map_err(|e| Error::serialization(format!("failed to encode route: {e}")))?;

    let index = route_index.to_string();
    let patch = Patch(vec![
        PatchOperation::Add(AddOperation {
            path: PointerBuf::from_tokens(["spec", "streamingDomains", "-"]),
            value: domain_value,
        }),
        PatchOperation::Replace(ReplaceOperation {
            path: PointerBuf::from_tokens(["spec", "routes", index.as_str()]),
            value: route_value,
        }),
    ]);

    debug!(route_index, domain = %domain_name, "built switchover patch");
    Ok(SwitchoverPlan::Apply { route_index, patch })
}

fn build_domain(
    spec: &GatewaySpec,
    config: &GatewayConfig,
    domain_name: &str,
) -> Result<StreamingDomain, Error> {
    let settings = &config.switchover;
    let destination_bootstrap = spec
        .domain(&config.destination_name)
        .and_then(|d| d.kafka_cluster.as_ref())
        .and_then(|k| k.bootstrap_servers.first());

    let endpoint = settings
        .bootstrap_endpoint
        .clone()
        .or_else(|| destination_bootstrap.map(|b| b.endpoint.clone()))
        .ok_or_else(|| {
            Error::validation(format!(
                "no bootstrap endpoint configured and streaming domain '{}' declares none",
                config.destination_name
            ))
        })?;

    let tls = settings
        .tls_secret_ref
        .clone()
        .or_else(|| {
            destination_bootstrap
                .and_then(|b| b.tls.as_ref())
                .map(|t| t.secret_ref.clone())
        })
        .map(|secret_ref| SecretRef { secret_ref });

    Ok(StreamingDomain {
        name: domain_name.to_string(),
        type_: Some("kafka".to_string()),
        kafka_cluster: Some(KafkaCluster {
            bootstrap_servers: vec![BootstrapServer {
                id: settings.bootstrap_server_id.clone(),
                endpoint,
                tls,
            }],
            node_id_ranges: vec![NodeIdRange {
                name: settings.node_id_pool.clone(),
                start: settings.node_id_start,
                end: settings.node_id_end,
            }],
        }),
    })
}

fn build_route(current: &Route, config: &GatewayConfig, domain_name: &str) -> Route {
    let settings = &config.switchover;
    Route {
        name: current.name.clone(),
        endpoint: current.endpoint.clone(),
        broker_identification_strategy: Some(BrokerIdentificationStrategy {
            type_: "port".to_string(),
        }),
        streaming_domain: Some(DomainRef {
            name: domain_name.to_string(),
            bootstrap_server_id: Some(settings.bootstrap_server_id.clone()),
        }),
        security: Some(RouteSecurity {
            auth: Some(SECURITY_SWAP.to_string()),
            client: Some(SideSecurity {
                authentication: Some(Authentication {
                    type_: Some("none".to_string()),
                    jaas_config: None,
                }),
            }),
            cluster: Some(SideSecurity {
                authentication: Some(Authentication {
                    type_: Some("plain".to_string()),
                    jaas_config: Some(SecretRef {
                        secret_ref: settings.jaas_secret_ref.clone(),
                    }),
                }),
            }),
        }),
        read_only: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{fenced_gateway_yaml, gateway_config as config, GATEWAY_YAML};
    use serde_json::json;

    fn fenced() -> Vec<u8> {
        fenced_gateway_yaml().into_bytes()
    }

    fn patch_of(plan: SwitchoverPlan) -> serde_json::Value {
        match plan {
            SwitchoverPlan::Apply { patch, .. } => serde_json::to_value(&patch).unwrap(),
            SwitchoverPlan::AlreadyApplied => panic!("expected a patch"),
        }
    }

    #[test]
    fn patch_has_exactly_add_then_replace() {
        let plan = plan_switchover(&fenced(), &config()).unwrap();
        let ops = patch_of(plan);
        let ops = ops.as_array().unwrap();

        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0]["op"], "add");
        assert_eq!(ops[0]["path"], "/spec/streamingDomains/-");
        assert_eq!(ops[1]["op"], "replace");
        assert_eq!(ops[1]["path"], "/spec/routes/0");
    }

    #[test]
    fn new_domain_inherits_destination_endpoint_and_tls() {
        let ops = patch_of(plan_switchover(&fenced(), &config()).unwrap());
        let domain = &ops[0]["value"];

        assert_eq!(domain["name"], "cc-destination-cutover");
        assert_eq!(
            domain["kafkaCluster"]["bootstrapServers"][0],
            json!({
                "id": "cutover-bootstrap",
                "endpoint": "pkc-abc.us-east-1.aws.confluent.cloud:9092",
                "tls": { "secretRef": "cc-tls" }
            })
        );
        assert_eq!(
            domain["kafkaCluster"]["nodeIdRanges"][0],
            json!({ "name": "cutover-pool", "start": 0, "end": 99 })
        );
    }

    #[test]
    fn replaced_route_swaps_to_new_domain() {
        let ops = patch_of(plan_switchover(&fenced(), &config()).unwrap());
        let route = &ops[1]["value"];

        assert_eq!(route["name"], "clients");
        assert_eq!(route["endpoint"], "gateway.example.com:9092");
        assert_eq!(route["brokerIdentificationStrategy"]["type"], "port");
        assert_eq!(route["streamingDomain"]["name"], "cc-destination-cutover");
        assert_eq!(route["security"]["auth"], "swap");
        assert_eq!(route["security"]["client"]["authentication"]["type"], "none");
        assert!(route.get("readOnly").is_none());
        assert_eq!(
            route["security"]["cluster"]["authentication"],
            json!({ "type": "plain", "jaasConfig": { "secretRef": "cutover-cluster-jaas" } })
        );
    }

    #[test]
    fn configured_endpoint_overrides_gateway() {
        let mut cfg = config();
        cfg.switchover.bootstrap_endpoint = Some("dest.internal:9093".to_string());
        cfg.switchover.tls_secret_ref = Some("dest-tls".to_string());

        let ops = patch_of(plan_switchover(&fenced(), &cfg).unwrap());
        let server = &ops[0]["value"]["kafkaCluster"]["bootstrapServers"][0];
        assert_eq!(server["endpoint"], "dest.internal:9093");
        assert_eq!(server["tls"]["secretRef"], "dest-tls");
    }

    #[test]
    fn missing_source_route_is_fatal() {
        let mut cfg = config();
        cfg.source_route_name = "gone".to_string();
        let err = plan_switchover(&fenced(), &cfg).unwrap_err();
        assert!(err.to_string().contains("source route 'gone' no longer exists"));
    }

    #[test]
    fn applied_patch_is_detected() {
        let plan = plan_switchover(&fenced(), &config()).unwrap();
        let SwitchoverPlan::Apply { patch, .. } = plan else {
            panic!("expected a patch");
        };

        let mut doc: serde_json::Value = serde_yaml::from_slice(&fenced()).unwrap();
        json_patch::patch(&mut doc, &patch).unwrap();
        let patched = serde_yaml::to_string(&doc).unwrap();

        assert_eq!(
            plan_switchover(patched.as_bytes(), &config()).unwrap(),
            SwitchoverPlan::AlreadyApplied
        );
    }

    #[test]
    fn foreign_domain_with_switchover_name_is_rejected() {
        let mut cfg = config();
        cfg.switchover.domain_name = Some("cc-destination".to_string());
        let err = plan_switchover(&fenced(), &cfg).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn unfenced_source_route_is_refused() {
        let err = plan_switchover(GATEWAY_YAML.as_bytes(), &config()).unwrap_err();
        assert!(err.to_string().contains("source route 'clients' is not fenced"));
    }
}
