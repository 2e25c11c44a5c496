//! Cluster-link settings for one migration.

use std::fmt;

use serde::{Deserialize, Serialize};

use cutover_common::Error;

/// Where the cluster link lives and which topics take part.
///
/// The API key and secret are held in memory only: they are skipped on
/// serialization and redacted from `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterLinkConfig {
    /// Id of the destination cluster that owns the link
    pub cluster_id: String,
    /// Base URL of the REST endpoint (e.g. `https://pkc-abc.confluent.cloud:443`)
    pub rest_endpoint: String,
    /// Cluster link name
    pub link_name: String,
    /// Topics to migrate; empty means every mirror topic on the link
    #[serde(default)]
    pub topics: Vec<String>,
    /// REST API key
    #[serde(skip)]
    pub api_key: String,
    /// REST API secret
    #[serde(skip)]
    pub api_secret: String,
}

impl ClusterLinkConfig {
    /// Attach credentials supplied at execution time
    pub fn set_credentials(&mut self, api_key: impl Into<String>, api_secret: impl Into<String>) {
        self.api_key = api_key.into();
        self.api_secret = api_secret.into();
    }

    /// Fail unless both halves of the credential pair are present
    pub fn require_credentials(&self) -> Result<(), Error> {
        if self.api_key.is_empty() || self.api_secret.is_empty() {
            return Err(Error::validation(format!(
                "cluster link '{}' requires an API key and secret",
                self.link_name
            )));
        }
        Ok(())
    }

    /// Base URL of the link's REST resources
    pub fn link_url(&self) -> String {
        format!(
            "{}/kafka/v3/clusters/{}/links/{}",
            self.rest_endpoint.trim_end_matches('/'),
            self.cluster_id,
            self.link_name
        )
    }
}

impl fmt::Debug for ClusterLinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |s: &str| if s.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("ClusterLinkConfig")
            .field("cluster_id", &self.cluster_id)
            .field("rest_endpoint", &self.rest_endpoint)
            .field("link_name", &self.link_name)
            .field("topics", &self.topics)
            .field("api_key", &redact(&self.api_key))
            .field("api_secret", &redact(&self.api_secret))
            .finish()
    }
}
