//! Leaving `initialized`: wait for mirror lag to drain.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use cutover_common::poll::poll_until;
use cutover_common::Error;
use cutover_link::{restrict_to, ClusterLinkClient, ClusterLinkConfig, MirrorTopic};

const OPERATION: &str = "waiting for mirror lag";

/// A partition at or above the lag threshold
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaggingPartition<'a> {
    /// Topic name
    pub topic: &'a str,
    /// Partition number
    pub partition: i32,
    /// Current lag
    pub lag: u64,
}

/// Partitions of migration topics whose lag is `>= threshold`.
///
/// A threshold of 0 demands zero lag everywhere, the same as a threshold of 1.
pub fn lagging_partitions<'a>(
    mirrors: &'a [MirrorTopic],
    topics: &[String],
    threshold: u64,
) -> Vec<LaggingPartition<'a>> {
    let threshold = threshold.max(1);
    restrict_to(mirrors, topics)
        .into_iter()
        .flat_map(|t| {
            t.lags
                .iter()
                .filter(move |p| p.lag_units() >= threshold)
                .map(move |p| LaggingPartition {
                    topic: &t.name,
                    partition: p.partition,
                    lag: p.lag_units(),
                })
        })
        .collect()
}

/// Polls the link until every partition of every migration topic is below
/// the lag threshold.
#[derive(Clone, Debug)]
pub struct LagMonitor {
    /// Time between polls
    pub interval: Duration,
    /// Lagging partitions logged per poll
    pub max_samples: usize,
}

impl Default for LagMonitor {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_samples: 5,
        }
    }
}

impl LagMonitor {
    /// Wait until lag is below `threshold`, `max_wait` elapses, or the
    /// caller cancels.
    ///
    /// List failures are logged and retried on the next poll.
    pub async fn wait(
        &self,
        link: &dyn ClusterLinkClient,
        config: &ClusterLinkConfig,
        topics: &[String],
        threshold: u64,
        max_wait: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        if topics.is_empty() {
            info!("no migration topics, skipping lag check");
            return Ok(());
        }

        let start = Instant::now();
        let result = poll_until(cancel, max_wait, self.interval, OPERATION, || async move {
            let mirrors = link.list_mirror_topics(config).await.inspect_err(|e| {
                warn!(error = %e, "failed to list mirror topics, will retry");
            })?;

            let lagging = lagging_partitions(&mirrors, topics, threshold);
            if lagging.is_empty() {
                return Ok(true);
            }

            let elapsed = start.elapsed();
            let sample: Vec<String> = lagging
                .iter()
                .take(self.max_samples)
                .map(|p| format!("{}[{}]={}", p.topic, p.partition, p.lag))
                .collect();
            info!(
                threshold,
                lagging = lagging.len(),
                sample = ?sample,
                elapsed_secs = elapsed.as_secs(),
                remaining_secs = max_wait.saturating_sub(elapsed).as_secs(),
                "mirror lag at or above threshold"
            );
            Ok(false)
        })
        .await;

        match result {
            Ok(()) => {
                info!(
                    threshold,
                    topics = topics.len(),
                    elapsed_secs = start.elapsed().as_secs(),
                    "mirror lag below threshold"
                );
                Ok(())
            }
            Err(e) if e.is_timeout() => Err(Error::timeout(
                OPERATION,
                format!(
                    "lag still at or above threshold {threshold} after {}s (max wait {}s, 0s remaining)",
                    start.elapsed().as_secs(),
                    max_wait.as_secs()
                ),
            )),
            Err(e) => Err(e),
        }
    }
}
