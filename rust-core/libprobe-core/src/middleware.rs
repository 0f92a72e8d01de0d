//! # Middleware System
//!
//! Request/response interception for logging, timing and CORS.
//! Middlewares run in registration order before the handler and in
//! reverse order after it.

use crate::server::{HttpRequest, HttpResponse};
use std::sync::Arc;
use tracing::{debug, info};

/// Middleware trait for request/response interception
pub trait Middleware: Send + Sync {
    /// Called before the request handler
    ///
    /// Can return early with a response.
    fn before_request(&self, _req: &HttpRequest) -> MiddlewareResult {
        MiddlewareResult::Continue
    }

    /// Called after the request handler
    fn after_response(&self, _req: &HttpRequest, _res: &mut HttpResponse) {}

    /// Middleware name for logging
    fn name(&self) -> &'static str {
        "Unknown"
    }
}

/// Result of middleware execution
#[derive(Debug)]
pub enum MiddlewareResult {
    /// Continue to next middleware/handler
    Continue,
    /// Short-circuit with this response (skip handler)
    Respond(HttpResponse),
}

/// Middleware chain for processing requests
#[derive(Default, Clone)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Create a new empty middleware chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware to the chain
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        debug!(middleware = middleware.name(), "Middleware registered");
        self.middlewares.push(Arc::new(middleware));
    }

    /// Execute `before_request` for all middlewares
    pub fn run_before(&self, req: &HttpRequest) -> MiddlewareResult {
        for mw in &self.middlewares {
            if let MiddlewareResult::Respond(resp) = mw.before_request(req) {
                return MiddlewareResult::Respond(resp);
            }
        }
        MiddlewareResult::Continue
    }

    /// Execute `after_response` for all middlewares (in reverse order)
    pub fn run_after(&self, req: &HttpRequest, res: &mut HttpResponse) {
        for mw in self.middlewares.iter().rev() {
            mw.after_response(req, res);
        }
    }

    /// Get the number of middlewares
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Check if chain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

/// Logging middleware - structured request/response events
#[derive(Default)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    /// Create a new logging middleware
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for LoggingMiddleware {
    fn before_request(&self, req: &HttpRequest) -> MiddlewareResult {
        let request_id = req.header("x-request-id").unwrap_or("-");
        info!(
            method = %req.method,
            path = %req.path,
            request_id = %request_id,
            "Request received"
        );
        MiddlewareResult::Continue
    }

    fn after_response(&self, req: &HttpRequest, res: &mut HttpResponse) {
        let request_id = req.header("x-request-id").unwrap_or("-");
        info!(
            method = %req.method,
            path = %req.path,
            status = res.status,
            request_id = %request_id,
            "Response sent"
        );
    }

    fn name(&self) -> &'static str {
        "LoggingMiddleware"
    }
}

/// Timing middleware - reports time since the request was received
///
/// Holds no per-request state, so requests abandoned mid-flight leave
/// nothing behind.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimingMiddleware;

impl TimingMiddleware {
    /// Create a new timing middleware
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for TimingMiddleware {
    fn after_response(&self, req: &HttpRequest, res: &mut HttpResponse) {
        let duration = req.received_at().elapsed();
        res.set_header("x-response-time-ms", &duration.as_millis().to_string());
        debug!(
            method = %req.method,
            path = %req.path,
            duration_ms = %duration.as_millis(),
            "Request timing"
        );
    }

    fn name(&self) -> &'static str {
        "TimingMiddleware"
    }
}

/// CORS middleware - adds Cross-Origin Resource Sharing headers
#[derive(Clone)]
pub struct CorsMiddleware {
    allow_origin: String,
    allow_methods: String,
    allow_headers: String,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: "GET, POST, PUT, DELETE, PATCH, OPTIONS".to_string(),
            allow_headers: "Content-Type, Authorization".to_string(),
        }
    }
}

impl CorsMiddleware {
    /// Create a new CORS middleware with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set allowed origin
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allow_origin = origin.into();
        self
    }

}

impl Middleware for CorsMiddleware {
    fn after_response(&self, _req: &HttpRequest, res: &mut HttpResponse) {
        res.set_header("Access-Control-Allow-Origin", &self.allow_origin);
        res.set_header("Access-Control-Allow-Methods", &self.allow_methods);
        res.set_header("Access-Control-Allow-Headers", &self.allow_headers);
    }

    fn name(&self) -> &'static str {
        "CorsMiddleware"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Method;
    use std::collections::HashMap;
    use std::time::Duration;

    fn request(id: &str) -> HttpRequest {
        let mut headers = HashMap::new();
        headers.insert("x-request-id".to_string(), id.to_string());
        HttpRequest::new(Method::Get, "/health".to_string(), headers, None)
    }

    struct Deny;

    impl Middleware for Deny {
        fn before_request(&self, _req: &HttpRequest) -> MiddlewareResult {
            MiddlewareResult::Respond(HttpResponse::text("denied").with_status(403))
        }
    }

    #[test]
    fn test_middleware_chain_add() {
        let mut chain = MiddlewareChain::new();
        assert!(chain.is_empty());
        chain.add(LoggingMiddleware::new());
        chain.add(TimingMiddleware::new());
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_short_circuit() {
        let mut chain = MiddlewareChain::new();
        chain.add(LoggingMiddleware::new());
        chain.add(Deny);

        match chain.run_before(&request("r1")) {
            MiddlewareResult::Respond(resp) => assert_eq!(resp.status, 403),
            MiddlewareResult::Continue => panic!("expected short-circuit"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timing_measures_from_receipt() {
        let mw = TimingMiddleware::new();
        let req = request("r2");
        assert!(matches!(mw.before_request(&req), MiddlewareResult::Continue));

        tokio::time::advance(Duration::from_millis(250)).await;
        let mut res = HttpResponse::text("ok");
        mw.after_response(&req, &mut res);
        assert_eq!(res.header("x-response-time-ms"), Some("250"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timing_unaffected_by_abandoned_requests() {
        let mw = TimingMiddleware::new();
        for id in ["gone-1", "gone-2", "gone-3"] {
            mw.before_request(&request(id));
        }

        let req = request("kept");
        tokio::time::advance(Duration::from_millis(5)).await;
        let mut res = HttpResponse::text("ok");
        mw.after_response(&req, &mut res);
        assert_eq!(res.header("x-response-time-ms"), Some("5"));
    }

    #[test]
    fn test_cors_headers_applied() {
        let mw = CorsMiddleware::new().allow_origin("https://libraryconestoga.netlify.app");

        let mut res = HttpResponse::text("ok");
        mw.after_response(&request("r3"), &mut res);
        assert_eq!(
            res.header("Access-Control-Allow-Origin"),
            Some("https://libraryconestoga.netlify.app")
        );
    }

    #[test]
    fn test_cors_default_origin() {
        let mut res = HttpResponse::text("ok");
        CorsMiddleware::new().after_response(&request("r4"), &mut res);
        assert_eq!(res.header("Access-Control-Allow-Origin"), Some("*"));
    }
}
