//! Subcommands and the argument groups they share.

pub mod execute;
pub mod init;
pub mod status;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;

use cutover_gateway::{
    AuthMode, GatewayClient, GatewayConfig, KubeGatewayClient, SwitchoverSettings,
};
use cutover_link::{ClusterLinkClient, ClusterLinkConfig, RestClusterLinkClient};

/// Cluster-link REST credentials
#[derive(Args, Clone)]
pub struct CredentialArgs {
    /// Cluster-link REST API key
    #[arg(long, env = "CLUSTER_LINK_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Cluster-link REST API secret
    #[arg(long, env = "CLUSTER_LINK_API_SECRET", hide_env_values = true)]
    pub api_secret: String,
}

impl fmt::Debug for CredentialArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialArgs")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Where the gateway is and which domains and routes take part
#[derive(Args, Debug, Clone)]
pub struct GatewayArgs {
    /// Namespace of the gateway resource
    #[arg(long)]
    pub namespace: String,

    /// Name of the gateway resource
    #[arg(long)]
    pub gateway_name: String,

    /// Streaming domain of the source cluster
    #[arg(long)]
    pub source_domain: String,

    /// Streaming domain of the destination cluster
    #[arg(long)]
    pub destination_domain: String,

    /// Route clients use today
    #[arg(long)]
    pub source_route: String,

    /// Route already serving the destination cluster
    #[arg(long)]
    pub destination_route: String,

    /// Credential swap direction (dest_swap or source_swap)
    #[arg(long, default_value = "dest_swap")]
    pub auth_mode: AuthMode,

    /// Kubeconfig path; kube defaults when omitted
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Name of the streaming domain added at switchover
    #[arg(long)]
    pub switchover_domain: Option<String>,

    /// Destination bootstrap endpoint for the new domain (host:port)
    #[arg(long)]
    pub bootstrap_endpoint: Option<String>,

    /// Bootstrap server id inside the new domain
    #[arg(long, default_value = "cutover-bootstrap")]
    pub bootstrap_server_id: String,

    /// Secret with TLS material for the destination endpoint
    #[arg(long)]
    pub tls_secret_ref: Option<String>,

    /// Secret with the destination JAAS config
    #[arg(long, default_value = "cutover-cluster-jaas")]
    pub jaas_secret_ref: String,

    /// Broker node-id pool name
    #[arg(long, default_value = "cutover-pool")]
    pub node_id_pool: String,

    /// First broker id in the pool
    #[arg(long, default_value_t = 0)]
    pub node_id_start: i32,

    /// Last broker id in the pool
    #[arg(long, default_value_t = 99)]
    pub node_id_end: i32,
}

impl GatewayArgs {
    /// Build the gateway section of the migration config
    pub fn into_config(self) -> GatewayConfig {
        GatewayConfig {
            namespace: self.namespace,
            crd_name: self.gateway_name,
            source_name: self.source_domain,
            destination_name: self.destination_domain,
            source_route_name: self.source_route,
            destination_route_name: self.destination_route,
            auth_mode: self.auth_mode,
            kube_config_path: self.kubeconfig,
            switchover: SwitchoverSettings {
                domain_name: self.switchover_domain,
                bootstrap_endpoint: self.bootstrap_endpoint,
                bootstrap_server_id: self.bootstrap_server_id,
                tls_secret_ref: self.tls_secret_ref,
                jaas_secret_ref: self.jaas_secret_ref,
                node_id_pool: self.node_id_pool,
                node_id_start: self.node_id_start,
                node_id_end: self.node_id_end,
            },
        }
    }
}

/// Which cluster link carries the topics
#[derive(Args, Debug, Clone)]
pub struct LinkArgs {
    /// Destination cluster id
    #[arg(long)]
    pub cluster_id: String,

    /// Destination REST endpoint
    #[arg(long)]
    pub rest_endpoint: String,

    /// Cluster link name
    #[arg(long)]
    pub link_name: String,

    /// Topics to migrate (comma separated); every mirror topic when omitted
    #[arg(long, value_delimiter = ',')]
    pub topics: Vec<String>,
}

impl LinkArgs {
    /// Build the cluster-link section of the migration config
    pub fn into_config(self, credentials: CredentialArgs) -> ClusterLinkConfig {
        ClusterLinkConfig {
            cluster_id: self.cluster_id,
            rest_endpoint: self.rest_endpoint,
            link_name: self.link_name,
            topics: self.topics,
            api_key: credentials.api_key,
            api_secret: credentials.api_secret,
        }
    }
}

/// Production clients for the gateway and the cluster link
pub async fn clients(
    kubeconfig: Option<&Path>,
) -> anyhow::Result<(Arc<dyn GatewayClient>, Arc<dyn ClusterLinkClient>)> {
    let gateway = KubeGatewayClient::from_kubeconfig(kubeconfig).await?;
    let link = RestClusterLinkClient::new()?;
    Ok((Arc::new(gateway), Arc::new(link)))
}
