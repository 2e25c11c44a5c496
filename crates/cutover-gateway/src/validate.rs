//! Pre-flight validation of the gateway against the migration config.
//!
//! Run once when the migration is initialized and again right before topics
//! are promoted, so a gateway edited in between is caught while the cutover
//! can still be abandoned.

use tracing::debug;

use cutover_common::Error;

use crate::config::GatewayConfig;
use crate::model::{parse_gateway, GatewaySpec, Route};

/// Check that the gateway YAML has everything the cutover relies on.
///
/// Errors name the offending route or domain together with what the gateway
/// actually declares.
pub fn validate_gateway(yaml: &[u8], config: &GatewayConfig) -> Result<(), Error> {
    let gateway = parse_gateway(yaml)?;
    validate_spec(&gateway.spec, config)?;

    debug!(
        gateway = %config.crd_name,
        namespace = %config.namespace,
        "gateway validated"
    );
    Ok(())
}

fn validate_spec(spec: &GatewaySpec, config: &GatewayConfig) -> Result<(), Error> {
    for (role, name) in [
        ("source", &config.source_name),
        ("destination", &config.destination_name),
    ] {
        if spec.domain(name).is_none() {
            return Err(Error::validation(format!(
                "{role} streaming domain '{name}' not found in gateway; available domains: [{}]",
                spec.domain_names().join(", ")
            )));
        }
    }

    let source_route = find_route(spec, "source", &config.source_route_name)?;
    let destination_route = find_route(spec, "destination", &config.destination_route_name)?;

    match source_route.domain_name() {
        Some(domain) if domain == config.source_name => {}
        other => {
            return Err(Error::validation(format!(
                "source route '{}' references streaming domain '{}', expected '{}'; available domains: [{}]",
                source_route.name,
                other.unwrap_or("<none>"),
                config.source_name,
                spec.domain_names().join(", ")
            )))
        }
    }

    let expected = config.auth_mode.expected_source_security();
    match source_route.security_mode() {
        Some(mode) if mode == expected => {}
        other => {
            return Err(Error::validation(format!(
                "source route '{}' has security auth '{}', expected '{}' for auth mode {}",
                source_route.name,
                other.unwrap_or("<none>"),
                expected,
                config.auth_mode
            )))
        }
    }

    if destination_route.client_auth_type().is_none() {
        return Err(Error::validation(format!(
            "destination route '{}' must declare security.client.authentication.type",
            destination_route.name
        )));
    }
    if destination_route.cluster_auth_type().is_none() {
        return Err(Error::validation(format!(
            "destination route '{}' must declare security.cluster.authentication.type",
            destination_route.name
        )));
    }

    Ok(())
}

fn find_route<'a>(spec: &'a GatewaySpec, role: &str, name: &str) -> Result<&'a Route, Error> {
    spec.route(name).ok_or_else(|| {
        Error::validation(format!(
            "{role} route '{name}' not found in gateway; available routes: [{}]",
            spec.route_names().join(", ")
        ))
    })
}
