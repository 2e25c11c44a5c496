//! The persisted shape of one migration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cutover_gateway::GatewayConfig;
use cutover_link::ClusterLinkConfig;

use crate::state::MigrationPhase;

/// Everything needed to start a migration, built once per invocation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationConfig {
    /// Caller-chosen id, unique within the state file
    pub migration_id: String,
    /// Gateway side
    pub gateway: GatewayConfig,
    /// Cluster-link side, credentials included
    pub cluster_link: ClusterLinkConfig,
}

/// One migration as written to the state file.
///
/// Cluster-link credentials live on `cluster_link_config` in memory only; the
/// config type skips them on serialization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Caller-chosen id
    pub migration_id: String,
    /// Last state reached and persisted
    pub current_state: MigrationPhase,
    /// Gateway settings
    pub gateway_config: GatewayConfig,
    /// Cluster-link settings, including the migration's topic list
    pub cluster_link_config: ClusterLinkConfig,
    /// Every mirror topic found on the link at initialization
    #[serde(default)]
    pub cluster_link_topics: Vec<String>,
    /// Link configuration at initialization, kept for audit
    #[serde(default)]
    pub cluster_link_configs: BTreeMap<String, String>,
    /// Gateway resource as it was before the migration touched anything
    #[serde(default)]
    pub initial_gateway_yaml: String,
}

impl MigrationRecord {
    /// A fresh, uninitialized record
    pub fn new(config: MigrationConfig) -> Self {
        Self {
            migration_id: config.migration_id,
            current_state: MigrationPhase::Uninitialized,
            gateway_config: config.gateway,
            cluster_link_config: config.cluster_link,
            cluster_link_topics: Vec::new(),
            cluster_link_configs: BTreeMap::new(),
            initial_gateway_yaml: String::new(),
        }
    }

    /// Topics taking part in the migration
    pub fn topics(&self) -> &[String] {
        &self.cluster_link_config.topics
    }
}
