//! Error types shared by the gateway, cluster-link and migration crates
//!
//! Errors carry enough context (operation, endpoint, resource) to be read
//! straight out of an operator's terminal without a debugger.

use thiserror::Error;

/// Main error type for cutover operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// HTTP call against the cluster-link REST API failed
    #[error("http error calling {endpoint}: {message}")]
    Http {
        /// URL or logical endpoint that was called
        endpoint: String,
        /// Description of what failed
        message: String,
        /// HTTP status code, when a response was received
        status: Option<u16>,
    },

    /// The gateway, topic set or options do not satisfy a precondition
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
    },

    /// The caller lacks a required Kubernetes permission
    #[error("permission denied: cannot {verb} {resource} in namespace {namespace}")]
    PermissionDenied {
        /// Verb that was checked (e.g. "update")
        verb: String,
        /// Resource (plural, with group) that was checked
        resource: String,
        /// Namespace the check was scoped to
        namespace: String,
    },

    /// A wait loop ran out of time
    #[error("timed out {operation}: {message}")]
    Timeout {
        /// What was being waited for
        operation: String,
        /// Threshold/elapsed details
        message: String,
    },

    /// The caller cancelled the operation
    #[error("{operation} was cancelled")]
    Cancelled {
        /// What was running when cancellation arrived
        operation: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// Internal error with context
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Where the error happened
        context: String,
        /// Description of what failed
        message: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a permission denied error
    pub fn permission_denied(
        verb: impl Into<String>,
        resource: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::PermissionDenied {
            verb: verb.into(),
            resource: resource.into(),
            namespace: namespace.into(),
        }
    }

    /// Create an HTTP error without a response status (connect/read failures)
    pub fn http(endpoint: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Http {
            endpoint: endpoint.into(),
            message: msg.into(),
            status: None,
        }
    }

    /// Create an HTTP error for a non-success response
    pub fn http_status(endpoint: impl Into<String>, status: u16, msg: impl Into<String>) -> Self {
        Self::Http {
            endpoint: endpoint.into(),
            message: msg.into(),
            status: Some(status),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
            message: msg.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            context: context.into(),
            message: msg.into(),
        }
    }

    /// Whether the operation that produced this error can be retried as-is.
    ///
    /// Validation and permission errors need operator action first; a
    /// cancellation is a deliberate stop.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Kube { .. } | Self::Timeout { .. } => true,
            Self::Http { status, .. } => match status {
                None => true,
                Some(code) => *code == 429 || *code >= 500,
            },
            _ => false,
        }
    }

    /// Whether this error is a caller cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Whether this error is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_is_rendered() {
        let err = Error::validation("route 'dest' not found; available routes: [src]");
        assert_eq!(
            err.to_string(),
            "validation error: route 'dest' not found; available routes: [src]"
        );
    }

    #[test]
    fn permission_denied_names_scope() {
        let err = Error::permission_denied("update", "gateways.platform.confluent.io", "kafka");
        let msg = err.to_string();
        assert!(msg.contains("update"));
        assert!(msg.contains("gateways.platform.confluent.io"));
        assert!(msg.contains("kafka"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn cancellation_is_distinct_from_timeout() {
        let cancelled = Error::cancelled("checking lags");
        let timeout = Error::timeout("waiting for lag", "threshold 10");

        assert!(cancelled.is_cancelled());
        assert!(!cancelled.is_timeout());
        assert!(timeout.is_timeout());
        assert!(!timeout.is_cancelled());
    }

    #[test]
    fn http_retryability_follows_status() {
        assert!(Error::http("https://link", "connection reset").is_retryable());
        assert!(Error::http_status("https://link", 503, "unavailable").is_retryable());
        assert!(Error::http_status("https://link", 429, "slow down").is_retryable());
        assert!(!Error::http_status("https://link", 401, "unauthorized").is_retryable());
        assert!(!Error::http_status("https://link", 404, "no such link").is_retryable());
    }
}
