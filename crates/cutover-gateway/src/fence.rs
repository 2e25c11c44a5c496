//! The fence patch.
//!
//! Marks the source route read-only so producers stop writing to the source
//! cluster while its topics are promoted; consumers keep reading. The patch
//! tests the route name first, so a route list reordered since the gateway
//! was read makes the patch fail instead of fencing the wrong route.

use json_patch::{AddOperation, Patch, PatchOperation, TestOperation};
use jsonptr::PointerBuf;
use serde_json::Value;
use tracing::debug;

use cutover_common::Error;

use crate::config::GatewayConfig;
use crate::model::parse_gateway;

/// What fencing has to do against the current gateway
#[derive(Debug, Clone, PartialEq)]
pub enum FencePlan {
    /// The source route is already read-only
    AlreadyFenced,
    /// Apply this patch
    Apply {
        /// Index of the source route inside `spec.routes`
        route_index: usize,
        /// `test` of the route name, then `add` of `readOnly: true`
        patch: Patch,
    },
}

/// Work out the fence patch for the gateway in `yaml`
pub fn plan_fence(yaml: &[u8], config: &GatewayConfig) -> Result<FencePlan, Error> {
    let gateway = parse_gateway(yaml)?;
    let spec = &gateway.spec;

    let route_index = spec.route_index(&config.source_route_name).ok_or_else(|| {
        Error::validation(format!(
            "source route '{}' not found in gateway; available routes: [{}]",
            config.source_route_name,
            spec.route_names().join(", ")
        ))
    })?;
    if spec.routes[route_index].is_fenced() {
        return Ok(FencePlan::AlreadyFenced);
    }

    let index = route_index.to_string();
    let patch = Patch(vec![
        PatchOperation::Test(TestOperation {
            path: PointerBuf::from_tokens(["spec", "routes", index.as_str(), "name"]),
            value: Value::String(config.source_route_name.clone()),
        }),
        PatchOperation::Add(AddOperation {
            path: PointerBuf::from_tokens(["spec", "routes", index.as_str(), "readOnly"]),
            value: Value::Bool(true),
        }),
    ]);

    debug!(route_index, route = %config.source_route_name, "built fence patch");
    Ok(FencePlan::Apply { route_index, patch })
}
