//! Cluster-link side of the cutover
//!
//! A cluster link replicates topics from the source cluster into read-only
//! mirror topics on the destination. Before the cutover the mirrors must be
//! active and caught up; at cutover they are promoted to regular writable
//! topics.

#![deny(missing_docs)]

pub mod client;
pub mod config;
pub mod topics;
pub mod types;

pub use client::{ClusterLinkClient, RestClusterLinkClient};
pub use config::ClusterLinkConfig;
pub use topics::{restrict_to, split_by_activity, validate_topics};
pub use types::{MirrorStatus, MirrorTopic, PartitionLag, PromoteResponse, PromoteResult};
