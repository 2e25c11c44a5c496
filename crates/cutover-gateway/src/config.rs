//! Gateway settings for one migration.
//!
//! Persisted verbatim inside the migration record, so every field here is
//! part of the state-file format.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{SECURITY_PASSTHROUGH, SECURITY_SWAP};

/// Direction of the credential swap performed by the gateway
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Clients keep authenticating against the source; the gateway swaps
    /// credentials when talking to the destination.
    #[default]
    DestSwap,
    /// The source route already swaps credentials.
    SourceSwap,
}

impl AuthMode {
    /// Security mode the source route must have before the cutover starts
    pub fn expected_source_security(&self) -> &'static str {
        match self {
            AuthMode::DestSwap => SECURITY_PASSTHROUGH,
            AuthMode::SourceSwap => SECURITY_SWAP,
        }
    }

    /// Wire name, as written in the state file and accepted on the CLI
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::DestSwap => "dest_swap",
            AuthMode::SourceSwap => "source_swap",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "dest_swap" => Ok(AuthMode::DestSwap),
            "source_swap" => Ok(AuthMode::SourceSwap),
            other => Err(format!(
                "unknown auth mode '{other}', expected 'dest_swap' or 'source_swap'"
            )),
        }
    }
}

/// Where the gateway lives and which of its domains/routes take part
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Namespace of the gateway resource
    pub namespace: String,
    /// Name of the gateway custom resource
    pub crd_name: String,
    /// Streaming domain that points at the source cluster
    pub source_name: String,
    /// Streaming domain that points at the destination cluster
    pub destination_name: String,
    /// Route clients use today; repointed at switchover
    pub source_route_name: String,
    /// Route already serving the destination cluster
    pub destination_route_name: String,
    /// Credential swap direction
    #[serde(default)]
    pub auth_mode: AuthMode,
    /// Kubeconfig to use; kube defaults when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_config_path: Option<PathBuf>,
    /// Shape of the streaming domain and route written at switchover
    #[serde(default)]
    pub switchover: SwitchoverSettings,
}

/// Settings for the streaming domain and route written at switchover.
///
/// Unset endpoint and TLS values are taken from the destination streaming
/// domain already declared on the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchoverSettings {
    /// Name of the appended streaming domain (default `<destination>-cutover`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
    /// Destination bootstrap endpoint (`host:port`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_endpoint: Option<String>,
    /// Id of the bootstrap server entry inside the new domain
    #[serde(default = "default_bootstrap_server_id")]
    pub bootstrap_server_id: String,
    /// Secret holding TLS material for the destination endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_secret_ref: Option<String>,
    /// Pre-provisioned secret holding the JAAS config for the destination
    #[serde(default = "default_jaas_secret_ref")]
    pub jaas_secret_ref: String,
    /// Name of the broker node-id pool
    #[serde(default = "default_node_id_pool")]
    pub node_id_pool: String,
    /// First broker id in the pool
    #[serde(default)]
    pub node_id_start: i32,
    /// Last broker id in the pool
    #[serde(default = "default_node_id_end")]
    pub node_id_end: i32,
}

fn default_bootstrap_server_id() -> String {
    "cutover-bootstrap".to_string()
}

fn default_jaas_secret_ref() -> String {
    "cutover-cluster-jaas".to_string()
}

fn default_node_id_pool() -> String {
    "cutover-pool".to_string()
}

fn default_node_id_end() -> i32 {
    99
}

impl Default for SwitchoverSettings {
    fn default() -> Self {
        Self {
            domain_name: None,
            bootstrap_endpoint: None,
            bootstrap_server_id: default_bootstrap_server_id(),
            tls_secret_ref: None,
            jaas_secret_ref: default_jaas_secret_ref(),
            node_id_pool: default_node_id_pool(),
            node_id_start: 0,
            node_id_end: default_node_id_end(),
        }
    }
}

impl GatewayConfig {
    /// Name of the streaming domain the switchover appends
    pub fn switchover_domain_name(&self) -> String {
        self.switchover
            .domain_name
            .clone()
            .unwrap_or_else(|| format!("{}-cutover", self.destination_name))
    }
}
