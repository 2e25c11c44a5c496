//! Mirror topic data as reported by the cluster-link REST API.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Replication state of a mirror topic
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MirrorStatus {
    /// Replicating; read-only on the destination
    Active,
    /// Replication paused by an operator
    Paused,
    /// Promotion or failover requested, not yet finished
    PendingStopped,
    /// Promoted; a regular writable topic
    Stopped,
    /// Replication failed
    Failed,
    /// Source cluster unreachable
    SourceUnavailable,
    /// Mirror being set up
    PendingMirror,
    /// Anything this version doesn't know about
    #[serde(other)]
    Unknown,
}

impl MirrorStatus {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            MirrorStatus::Active => "ACTIVE",
            MirrorStatus::Paused => "PAUSED",
            MirrorStatus::PendingStopped => "PENDING_STOPPED",
            MirrorStatus::Stopped => "STOPPED",
            MirrorStatus::Failed => "FAILED",
            MirrorStatus::SourceUnavailable => "SOURCE_UNAVAILABLE",
            MirrorStatus::PendingMirror => "PENDING_MIRROR",
            MirrorStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for MirrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replication lag of one partition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionLag {
    /// Partition number
    pub partition: i32,
    /// Messages behind the source
    pub lag: i64,
    /// Last offset fetched from the source, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_source_fetch_offset: Option<i64>,
}

impl PartitionLag {
    /// Lag as an unsigned count; a negative report is treated as caught up
    pub fn lag_units(&self) -> u64 {
        self.lag.max(0) as u64
    }
}

/// A topic mirrored over the cluster link
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorTopic {
    /// Topic name
    #[serde(rename = "mirror_topic_name")]
    pub name: String,
    /// Replication state
    #[serde(rename = "mirror_status")]
    pub status: MirrorStatus,
    /// Per-partition lag
    #[serde(rename = "mirror_lags", default)]
    pub lags: Vec<PartitionLag>,
}

impl MirrorTopic {
    /// Build a mirror topic (mostly for fakes and tests)
    pub fn new(name: impl Into<String>, status: MirrorStatus, lags: &[i64]) -> Self {
        Self {
            name: name.into(),
            status,
            lags: lags
                .iter()
                .enumerate()
                .map(|(partition, lag)| PartitionLag {
                    partition: partition as i32,
                    lag: *lag,
                    last_source_fetch_offset: None,
                })
                .collect(),
        }
    }

    /// Whether the mirror is still replicating
    pub fn is_active(&self) -> bool {
        self.status == MirrorStatus::Active
    }

    /// Whether every partition reports zero lag
    pub fn is_caught_up(&self) -> bool {
        self.lags.iter().all(|p| p.lag_units() == 0)
    }

    /// Highest partition lag
    pub fn max_lag(&self) -> u64 {
        self.lags.iter().map(PartitionLag::lag_units).max().unwrap_or(0)
    }
}

/// Outcome of a promote request
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoteResponse {
    /// Per-topic results
    #[serde(rename = "data", default)]
    pub results: Vec<PromoteResult>,
}

/// Per-topic result of a promote request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoteResult {
    /// Topic name
    #[serde(rename = "mirror_topic_name")]
    pub topic: String,
    /// 0 on success, a Kafka error code otherwise
    #[serde(default)]
    pub error_code: i32,
    /// Human-readable error
    #[serde(default)]
    pub error_message: Option<String>,
}

impl PromoteResult {
    /// Whether the link accepted the promotion for this topic
    pub fn is_success(&self) -> bool {
        self.error_code == 0
    }
}
