//! # HTTP Request
//!
//! Owned request wrapper handed to handlers. The body is collected once,
//! and every request carries the cancellation token tied to its client
//! connection plus the instant it was received.

use crate::error::{Error, Result};
use crate::json::parse_json_bytes;
use crate::router::Method;
use http_body_util::BodyExt;
use hyper::body::Bytes;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// HTTP request as seen by handlers and middleware
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Request path (without query string)
    pub path: String,
    /// Path parameters filled in by the router
    pub params: HashMap<String, String>,
    /// Request headers
    headers: hyper::HeaderMap,
    /// Request body (collected)
    body: Option<Bytes>,
    /// Cancelled when the client goes away
    cancellation: CancellationToken,
    received_at: Instant,
}

impl HttpRequest {
    /// Create a request manually (tests and zero-network dispatch)
    ///
    /// Any query string on `path` is dropped.
    pub fn new(
        method: Method,
        mut path: String,
        headers_map: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Self {
        if let Some(query_start) = path.find('?') {
            path.truncate(query_start);
        }

        let mut headers = hyper::HeaderMap::new();
        for (k, v) in headers_map {
            if let (Ok(n), Ok(v)) = (
                hyper::header::HeaderName::from_bytes(k.as_bytes()),
                hyper::header::HeaderValue::from_str(&v),
            ) {
                headers.insert(n, v);
            }
        }

        Self {
            method,
            path,
            params: HashMap::new(),
            headers,
            body,
            cancellation: CancellationToken::new(),
            received_at: Instant::now(),
        }
    }

    /// Create from hyper request with body size limit
    ///
    /// # Errors
    ///
    /// `Error::MethodNotAllowed` for methods no route can use,
    /// `Error::PayloadTooLarge` when the declared or actual body exceeds
    /// `max_body_size`.
    pub async fn from_hyper_with_limit(
        req: hyper::Request<hyper::body::Incoming>,
        max_body_size: usize,
    ) -> Result<Self> {
        let received_at = Instant::now();
        let method = Method::from_hyper(req.method()).ok_or_else(|| Error::MethodNotAllowed {
            method: req.method().to_string(),
        })?;

        let path = req.uri().path().to_string();
        let headers = req.headers().clone();
        let declared_len = headers
            .get(hyper::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<usize>().ok());
        if let Some(content_len) = declared_len {
            if content_len > max_body_size {
                return Err(Error::PayloadTooLarge {
                    limit: max_body_size,
                    actual: content_len,
                });
            }
        }

        let bytes = BodyExt::collect(req.into_body()).await?.to_bytes();
        if bytes.len() > max_body_size {
            return Err(Error::PayloadTooLarge {
                limit: max_body_size,
                actual: bytes.len(),
            });
        }
        let body = if bytes.is_empty() { None } else { Some(bytes) };

        Ok(Self {
            method,
            path,
            params: HashMap::new(),
            headers,
            body,
            cancellation: CancellationToken::new(),
            received_at,
        })
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set or override a header
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(n), Ok(v)) = (
            hyper::header::HeaderName::from_bytes(name.as_bytes()),
            hyper::header::HeaderValue::from_str(value),
        ) {
            self.headers.insert(n, v);
        }
    }

    /// Get the request body as bytes
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Decode the JSON body; `Ok(None)` when the request has no body
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidBody` when the body is not valid JSON for `T`
    pub fn json<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match &self.body {
            Some(b) => {
                let mut buf = b.to_vec();
                parse_json_bytes(&mut buf).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Token cancelled when the client abandons the request
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Replace the request's cancellation token
    pub fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancellation = token;
    }

    /// When the request was received
    #[must_use]
    pub fn received_at(&self) -> Instant {
        self.received_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        name: String,
        number: i32,
    }

    fn request_with_body(body: &str) -> HttpRequest {
        HttpRequest::new(
            Method::Post,
            "/api/test".to_string(),
            HashMap::new(),
            Some(Bytes::from(body.to_string())),
        )
    }

    #[test]
    fn test_new_drops_query_string() {
        let req = HttpRequest::new(Method::Get, "/x?a=1".to_string(), HashMap::new(), None);
        assert_eq!(req.path, "/x");
    }

    #[tokio::test(start_paused = true)]
    async fn test_received_at_tracks_clock() {
        let req = HttpRequest::new(Method::Get, "/".to_string(), HashMap::new(), None);
        tokio::time::advance(std::time::Duration::from_millis(40)).await;
        assert_eq!(req.received_at().elapsed().as_millis(), 40);
    }

    #[test]
    fn test_header_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("X-Request-Id".to_string(), "abc".to_string());
        let req = HttpRequest::new(Method::Get, "/".to_string(), headers, None);
        assert_eq!(req.header("x-request-id"), Some("abc"));
    }

    #[test]
    fn test_json_body() {
        let req = request_with_body(r#"{"name": "Vedant", "number": 7}"#);
        let payload: Payload = req.json().unwrap().unwrap();
        assert_eq!(payload.name, "Vedant");
        assert_eq!(payload.number, 7);
    }

    #[test]
    fn test_json_missing_body_is_none() {
        let req = HttpRequest::new(Method::Post, "/".to_string(), HashMap::new(), None);
        assert!(req.json::<Payload>().unwrap().is_none());
    }

    #[test]
    fn test_json_invalid_body() {
        let req = request_with_body("{not json");
        assert!(matches!(
            req.json::<Payload>(),
            Err(Error::InvalidBody { .. })
        ));
    }

    #[test]
    fn test_fresh_request_is_not_cancelled() {
        let mut req = HttpRequest::new(Method::Get, "/".to_string(), HashMap::new(), None);
        assert!(!req.cancellation().is_cancelled());

        let token = CancellationToken::new();
        token.cancel();
        req.set_cancellation(token);
        assert!(req.cancellation().is_cancelled());
    }
}
