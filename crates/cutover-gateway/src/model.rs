//! Typed view of the gateway custom resource.
//!
//! Only the fields the cutover reads or writes are modelled; anything else in
//! the resource is ignored on parse and left untouched by the JSON patch.

use serde::{Deserialize, Serialize};

use cutover_common::Error;

/// The gateway resource as returned by the API server
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResource {
    /// apiVersion of the object
    #[serde(default)]
    pub api_version: String,
    /// kind of the object
    #[serde(default)]
    pub kind: String,
    /// Object metadata (name and namespace only)
    #[serde(default)]
    pub metadata: GatewayMetadata,
    /// Gateway spec
    #[serde(default)]
    pub spec: GatewaySpec,
}

/// The subset of ObjectMeta the cutover logs
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GatewayMetadata {
    /// Object name
    #[serde(default)]
    pub name: Option<String>,
    /// Object namespace
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Gateway spec: backend clusters and the routes that expose them
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySpec {
    /// Backend clusters known to the gateway
    #[serde(default)]
    pub streaming_domains: Vec<StreamingDomain>,
    /// Client-facing listeners
    #[serde(default)]
    pub routes: Vec<Route>,
}

/// A named backend cluster
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingDomain {
    /// Domain name referenced by routes
    pub name: String,
    /// Backend type (always "kafka" today)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    /// Kafka connection details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kafka_cluster: Option<KafkaCluster>,
}

/// Kafka connection details of a streaming domain
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KafkaCluster {
    /// Bootstrap servers, addressed by id from routes
    #[serde(default)]
    pub bootstrap_servers: Vec<BootstrapServer>,
    /// Broker id pools used for port-based broker identification
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub node_id_ranges: Vec<NodeIdRange>,
}

/// One bootstrap endpoint of a backend cluster
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapServer {
    /// Id routes use to pick this endpoint
    pub id: String,
    /// `host:port`
    pub endpoint: String,
    /// TLS material for the connection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<SecretRef>,
}

/// Reference to a Kubernetes secret
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    /// Secret name
    pub secret_ref: String,
}

/// A contiguous pool of broker ids
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct NodeIdRange {
    /// Pool name
    pub name: String,
    /// First id (inclusive)
    pub start: i32,
    /// Last id (inclusive)
    pub end: i32,
}

/// A client-facing listener
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Route name
    pub name: String,
    /// Advertised listener endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// How brokers behind the route are told apart
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker_identification_strategy: Option<BrokerIdentificationStrategy>,
    /// Backend the route forwards to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming_domain: Option<DomainRef>,
    /// Authentication settings on both sides of the gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<RouteSecurity>,
    /// When true the gateway rejects produce requests on this route
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

/// Broker identification strategy of a route
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct BrokerIdentificationStrategy {
    /// "port" or "host"
    #[serde(rename = "type")]
    pub type_: String,
}

/// A route's pointer into a streaming domain
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRef {
    /// Streaming domain name
    pub name: String,
    /// Bootstrap server id within that domain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_server_id: Option<String>,
}

/// Security settings of a route
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct RouteSecurity {
    /// "passthrough" or "swap"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    /// Client-facing side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<SideSecurity>,
    /// Cluster-facing side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<SideSecurity>,
}

/// One side (client or cluster) of a route's security block
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct SideSecurity {
    /// Authentication mechanism
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Authentication>,
}

/// Authentication mechanism of one side of a route
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Authentication {
    /// Mechanism name, e.g. "plain", "oauth", "none"
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    /// JAAS config source for cluster-side plain authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jaas_config: Option<SecretRef>,
}

impl GatewaySpec {
    /// Look up a streaming domain by name
    pub fn domain(&self, name: &str) -> Option<&StreamingDomain> {
        self.streaming_domains.iter().find(|d| d.name == name)
    }

    /// Look up a route by name
    pub fn route(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.name == name)
    }

    /// Array index of a route, as needed for a JSON pointer
    pub fn route_index(&self, name: &str) -> Option<usize> {
        self.routes.iter().position(|r| r.name == name)
    }

    /// Names of all streaming domains, for error messages
    pub fn domain_names(&self) -> Vec<&str> {
        self.streaming_domains.iter().map(|d| d.name.as_str()).collect()
    }

    /// Names of all routes, for error messages
    pub fn route_names(&self) -> Vec<&str> {
        self.routes.iter().map(|r| r.name.as_str()).collect()
    }
}

impl Route {
    /// Whether writes through this route are blocked
    pub fn is_fenced(&self) -> bool {
        self.read_only == Some(true)
    }

    /// Name of the streaming domain this route forwards to
    pub fn domain_name(&self) -> Option<&str> {
        self.streaming_domain.as_ref().map(|d| d.name.as_str())
    }

    /// The route's security mode ("passthrough"/"swap")
    pub fn security_mode(&self) -> Option<&str> {
        self.security.as_ref().and_then(|s| s.auth.as_deref())
    }

    /// Client-side authentication type, if declared and non-empty
    pub fn client_auth_type(&self) -> Option<&str> {
        auth_type(self.security.as_ref().and_then(|s| s.client.as_ref()))
    }

    /// Cluster-side authentication type, if declared and non-empty
    pub fn cluster_auth_type(&self) -> Option<&str> {
        auth_type(self.security.as_ref().and_then(|s| s.cluster.as_ref()))
    }
}

fn auth_type(side: Option<&SideSecurity>) -> Option<&str> {
    side.and_then(|s| s.authentication.as_ref())
        .and_then(|a| a.type_.as_deref())
        .filter(|t| !t.trim().is_empty())
}

/// Parse gateway YAML (or JSON, which is valid YAML) into the typed view
pub fn parse_gateway(yaml: &[u8]) -> Result<GatewayResource, Error> {
    serde_yaml::from_slice(yaml)
        .map_err(|e| Error::serialization(format!("failed to parse gateway resource: {e}")))
}
