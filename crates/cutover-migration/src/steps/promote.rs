//! Leaving `fenced`: promote mirror topics as they catch up.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cutover_common::poll::{ensure_not_cancelled, sleep_or_cancel};
use cutover_common::Error;
use cutover_link::{restrict_to, split_by_activity, ClusterLinkClient, ClusterLinkConfig};

const OPERATION: &str = "promoting mirror topics";

#[derive(Debug, PartialEq, Eq)]
enum Pass {
    Complete,
    Pending,
}

/// Promotes every active, fully caught-up migration topic, pass after pass,
/// until no active mirror is left.
///
/// There is no deadline: lag drains by itself once producers have moved, and
/// the caller can always cancel. Per-topic promotion errors are logged and
/// the topic is tried again on the next pass.
#[derive(Clone, Debug)]
pub struct PromotionController {
    /// Time between passes
    pub interval: Duration,
}

impl Default for PromotionController {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

impl PromotionController {
    /// Run passes until nothing is left to promote or `cancel` fires
    pub async fn run(
        &self,
        link: &dyn ClusterLinkClient,
        config: &ClusterLinkConfig,
        topics: &[String],
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let mut passes = 0u32;
        loop {
            ensure_not_cancelled(cancel, OPERATION)?;
            passes += 1;

            match self.pass(link, config, topics).await {
                Ok(Pass::Complete) => {
                    info!(passes, "no active mirror topics left, promotion requested for all");
                    return Ok(());
                }
                Ok(Pass::Pending) => {}
                Err(e) => warn!(error = %e, pass = passes, "promotion pass failed, will retry"),
            }

            sleep_or_cancel(cancel, self.interval, OPERATION).await?;
        }
    }

    async fn pass(
        &self,
        link: &dyn ClusterLinkClient,
        config: &ClusterLinkConfig,
        topics: &[String],
    ) -> Result<Pass, Error> {
        let mirrors = link.list_mirror_topics(config).await?;
        if mirrors.is_empty() {
            return Ok(Pass::Complete);
        }

        let (active, _) = split_by_activity(restrict_to(&mirrors, topics));
        if active.is_empty() {
            return Ok(Pass::Complete);
        }

        let promotable: Vec<String> = active
            .iter()
            .filter(|t| t.is_caught_up())
            .map(|t| t.name.clone())
            .collect();
        if promotable.is_empty() {
            debug!(active = active.len(), "active mirrors still lagging");
            return Ok(Pass::Pending);
        }

        info!(topics = ?promotable, "requesting promotion");
        let response = link.promote_mirror_topics(config, &promotable).await?;
        for result in &response.results {
            if result.is_success() {
                info!(topic = %result.topic, "promotion accepted");
            } else {
                warn!(
                    topic = %result.topic,
                    error_code = result.error_code,
                    error_message = result.error_message.as_deref().unwrap_or(""),
                    "promotion rejected, will retry"
                );
            }
        }
        Ok(Pass::Pending)
    }
}
