//! Leaving `promoting`: wait for promotions to finish.
//!
//! A promote request only asks the link to stop mirroring. Topics pass
//! through `PENDING_STOPPED` before they are writable, and clients must not
//! be switched over until they are. A topic that settles in any state other
//! than `STOPPED` was never promoted, and fails the step.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cutover_common::poll::poll_for;
use cutover_common::Error;
use cutover_link::{restrict_to, ClusterLinkClient, ClusterLinkConfig, MirrorStatus, MirrorTopic};

const OPERATION: &str = "waiting for promotion to complete";

/// Migration topics still `ACTIVE` or `PENDING_STOPPED`
pub fn pending_promotions<'a>(mirrors: &'a [MirrorTopic], topics: &[String]) -> Vec<&'a MirrorTopic> {
    restrict_to(mirrors, topics)
        .into_iter()
        .filter(|t| matches!(t.status, MirrorStatus::Active | MirrorStatus::PendingStopped))
        .collect()
}

/// Every migration topic that did not end up `STOPPED`, as `name (STATUS)`.
/// Topics missing from the listing are reported as `name (not listed)`.
pub fn unfinished_promotions(mirrors: &[MirrorTopic], topics: &[String]) -> Vec<String> {
    topics
        .iter()
        .filter_map(|name| match mirrors.iter().find(|t| &t.name == name) {
            Some(t) if t.status == MirrorStatus::Stopped => None,
            Some(t) => Some(format!("{} ({})", t.name, t.status)),
            None => Some(format!("{name} (not listed)")),
        })
        .collect()
}

/// Polls until no migration topic is still mirroring
#[derive(Clone, Debug)]
pub struct PromotionCompletion {
    /// Time between polls
    pub interval: Duration,
}

impl Default for PromotionCompletion {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

impl PromotionCompletion {
    /// Wait up to `max_wait` for every promotion to settle
    pub async fn wait(
        &self,
        link: &dyn ClusterLinkClient,
        config: &ClusterLinkConfig,
        topics: &[String],
        max_wait: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let mirrors = poll_for(cancel, max_wait, self.interval, OPERATION, || async move {
            let mirrors = link.list_mirror_topics(config).await.inspect_err(|e| {
                warn!(error = %e, "failed to list mirror topics, will retry");
            })?;

            let pending = pending_promotions(&mirrors, topics);
            if !pending.is_empty() {
                let sample: Vec<String> = pending
                    .iter()
                    .take(5)
                    .map(|t| format!("{} ({})", t.name, t.status))
                    .collect();
                debug!(pending = pending.len(), sample = ?sample, "promotions in flight");
                return Ok(None);
            }
            Ok(Some(mirrors))
        })
        .await?;

        let unfinished = unfinished_promotions(&mirrors, topics);
        if !unfinished.is_empty() {
            return Err(Error::validation(format!(
                "mirror topics did not finish promotion: [{}]",
                unfinished.join(", ")
            )));
        }

        info!(topics = topics.len(), "promotion complete");
        Ok(())
    }
}
