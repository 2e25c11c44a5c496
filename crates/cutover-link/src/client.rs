//! Cluster-link client trait and its REST v3 implementation.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use cutover_common::retry::{retry_with_backoff_if, RetryConfig};
use cutover_common::Error;

use crate::config::ClusterLinkConfig;
use crate::types::{MirrorTopic, PromoteResponse};

/// Request timeout for every REST call
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Operations the cutover performs against the cluster link.
#[async_trait]
pub trait ClusterLinkClient: Send + Sync {
    /// All mirror topics on the link, with status and per-partition lag
    async fn list_mirror_topics(&self, config: &ClusterLinkConfig)
        -> Result<Vec<MirrorTopic>, Error>;

    /// The link's configuration as name/value pairs
    async fn list_configs(
        &self,
        config: &ClusterLinkConfig,
    ) -> Result<BTreeMap<String, String>, Error>;

    /// Check that every requested topic is a mirror topic on the link
    fn validate_topics(&self, requested: &[String], available: &[String]) -> Result<(), Error> {
        crate::topics::validate_topics(requested, available)
    }

    /// Ask the link to promote the named mirror topics
    async fn promote_mirror_topics(
        &self,
        config: &ClusterLinkConfig,
        topics: &[String],
    ) -> Result<PromoteResponse, Error>;
}

#[derive(Deserialize)]
struct DataList<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Deserialize)]
struct LinkConfigEntry {
    name: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Serialize)]
struct PromoteRequest<'a> {
    mirror_topic_names: &'a [String],
}

fn configs_from(entries: Vec<LinkConfigEntry>) -> BTreeMap<String, String> {
    entries
        .into_iter()
        .map(|e| (e.name, e.value.unwrap_or_default()))
        .collect()
}

/// [`ClusterLinkClient`] speaking the Kafka REST v3 API with basic auth
#[derive(Clone)]
pub struct RestClusterLinkClient {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl RestClusterLinkClient {
    /// Client with the default request timeout
    pub fn new() -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                Error::internal_with_context("cluster_link", format!("failed to build client: {e}"))
            })?;
        Ok(Self::with_client(client))
    }

    /// Use a pre-built HTTP client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            retry: RetryConfig::with_max_attempts(3),
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        config: &ClusterLinkConfig,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<T, Error> {
        config.require_credentials()?;

        let response = request
            .basic_auth(&config.api_key, Some(&config.api_secret))
            .send()
            .await
            .map_err(|e| Error::http(url, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::http_status(url, status.as_u16(), body));
        }

        response
            .json()
            .await
            .map_err(|e| Error::http(url, format!("invalid JSON: {e}")))
    }

    async fn get_with_retry<T: DeserializeOwned>(
        &self,
        config: &ClusterLinkConfig,
        url: String,
    ) -> Result<T, Error> {
        retry_with_backoff_if(
            &self.retry,
            &url,
            || self.send(config, self.client.get(&url), &url),
            Error::is_retryable,
        )
        .await
    }
}

#[async_trait]
impl ClusterLinkClient for RestClusterLinkClient {
    async fn list_mirror_topics(
        &self,
        config: &ClusterLinkConfig,
    ) -> Result<Vec<MirrorTopic>, Error> {
        let url = format!("{}/mirrors", config.link_url());
        let list: DataList<MirrorTopic> = self.get_with_retry(config, url).await?;
        debug!(link = %config.link_name, topics = list.data.len(), "listed mirror topics");
        Ok(list.data)
    }

    async fn list_configs(
        &self,
        config: &ClusterLinkConfig,
    ) -> Result<BTreeMap<String, String>, Error> {
        let url = format!("{}/configs", config.link_url());
        let list: DataList<LinkConfigEntry> = self.get_with_retry(config, url).await?;
        Ok(configs_from(list.data))
    }

    async fn promote_mirror_topics(
        &self,
        config: &ClusterLinkConfig,
        topics: &[String],
    ) -> Result<PromoteResponse, Error> {
        let url = format!("{}/mirrors:promote", config.link_url());
        let request = self.client.post(&url).json(&PromoteRequest {
            mirror_topic_names: topics,
        });
        let response: PromoteResponse = self.send(config, request, &url).await?;
        info!(
            link = %config.link_name,
            requested = topics.len(),
            accepted = response.results.iter().filter(|r| r.is_success()).count(),
            "promote request sent"
        );
        Ok(response)
    }
}
