//! # Error Handling
//!
//! Centralized error types for libprobe core.
//! Uses `thiserror` for ergonomic error definitions.

use thiserror::Error;

/// Result type alias for libprobe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the libprobe runtime
#[derive(Error, Debug)]
pub enum Error {
    /// Server failed to bind to the specified address
    #[error("Failed to bind server to {address}: {source}")]
    BindError {
        /// The address we tried to bind to
        address: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Router failed to match the requested path
    #[error("No route found for path: {path}")]
    RouteNotFound {
        /// The path that wasn't matched
        path: String,
    },

    /// The request used a method no route is registered for
    #[error("Method not allowed: {method}")]
    MethodNotAllowed {
        /// The rejected method
        method: String,
    },

    /// Invalid route pattern provided
    #[error("Invalid route pattern: {pattern}: {reason}")]
    InvalidRoutePattern {
        /// The invalid pattern
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },

    /// HTTP protocol error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// Request body could not be decoded
    #[error("Invalid JSON body: {reason}")]
    InvalidBody {
        /// Decoder message
        reason: String,
    },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Handler-level failure surfaced to the top-level error handler
    #[error("{message}")]
    Handler {
        /// Human-readable message
        message: String,
    },

    /// Request payload too large
    #[error("Payload too large: limit={limit} bytes, received={actual} bytes")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
        /// Actual size
        actual: usize,
    },
}

impl Error {
    /// Build a handler failure from any message
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_not_found_error() {
        let err = Error::RouteNotFound {
            path: "/unknown".to_string(),
        };
        assert!(err.to_string().contains("/unknown"));
    }

    #[test]
    fn test_method_not_allowed_error() {
        let err = Error::MethodNotAllowed {
            method: "OPTIONS".to_string(),
        };
        assert_eq!(err.to_string(), "Method not allowed: OPTIONS");
    }

    #[test]
    fn test_bind_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err = Error::BindError {
            address: "0.0.0.0:8000".to_string(),
            source: io_err,
        };
        assert!(err.to_string().contains("0.0.0.0:8000"));
    }

    #[test]
    fn test_handler_error_displays_message_only() {
        let err = Error::handler("custom 500 error to check auto heal");
        assert_eq!(err.to_string(), "custom 500 error to check auto heal");
    }
}
