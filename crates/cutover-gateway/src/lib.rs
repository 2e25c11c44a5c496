//! Gateway side of the cutover
//!
//! The gateway is a Kubernetes custom resource that proxies Kafka clients to
//! one of several streaming domains (backend clusters) through named routes.
//! This crate knows its shape, checks it against the migration's
//! configuration, builds the fence patch that stops writes through the
//! source route, and builds the switchover patch that repoints that route at
//! the destination cluster.
//!
//! # Modules
//!
//! - [`config`] - Per-migration gateway settings
//! - [`model`] - Typed view of the gateway resource
//! - [`validate`] - Pre-flight checks on routes, domains and auth modes
//! - [`fence`] - The patch that makes the source route read-only
//! - [`switchover`] - The two-operation JSON patch applied at cutover
//! - [`client`] - `GatewayClient` trait and its kube-rs implementation

#![deny(missing_docs)]

pub mod client;
pub mod config;
pub mod fence;
#[cfg(any(test, feature = "test-util"))]
pub mod fixtures;
pub mod model;
pub mod switchover;
pub mod validate;

pub use client::{create_client, GatewayClient, KubeGatewayClient, PodWait};
pub use config::{AuthMode, GatewayConfig, SwitchoverSettings};
pub use fence::{plan_fence, FencePlan};
pub use model::{parse_gateway, GatewayResource};
pub use switchover::{plan_switchover, SwitchoverPlan};
pub use validate::validate_gateway;

/// API group of the gateway custom resource
pub const GATEWAY_GROUP: &str = "platform.confluent.io";

/// API version of the gateway custom resource
pub const GATEWAY_VERSION: &str = "v1beta1";

/// Kind of the gateway custom resource
pub const GATEWAY_KIND: &str = "Gateway";

/// Plural resource name used for RBAC checks and REST paths
pub const GATEWAY_PLURAL: &str = "gateways";

/// Route security mode where the gateway forwards client credentials as-is
pub const SECURITY_PASSTHROUGH: &str = "passthrough";

/// Route security mode where the gateway swaps client credentials for its own
pub const SECURITY_SWAP: &str = "swap";
