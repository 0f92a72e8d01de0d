//! # Router
//!
//! Radix-trie based router using `matchit`. Routes are registered per HTTP
//! method; each registration yields the index of its handler.

use crate::error::{Error, Result};
use matchit::Router as MatchitRouter;
use std::collections::HashMap;

/// HTTP methods supported by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP DELETE
    Delete,
    /// HTTP PATCH
    Patch,
    /// HTTP HEAD
    Head,
    /// HTTP OPTIONS
    Options,
}

impl Method {
    /// Map a hyper method, `None` for methods the router does not serve
    #[must_use]
    pub fn from_hyper(method: &hyper::Method) -> Option<Self> {
        match *method {
            hyper::Method::GET => Some(Self::Get),
            hyper::Method::POST => Some(Self::Post),
            hyper::Method::PUT => Some(Self::Put),
            hyper::Method::DELETE => Some(Self::Delete),
            hyper::Method::PATCH => Some(Self::Patch),
            hyper::Method::HEAD => Some(Self::Head),
            hyper::Method::OPTIONS => Some(Self::Options),
            _ => None,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
            Self::Patch => write!(f, "PATCH"),
            Self::Head => write!(f, "HEAD"),
            Self::Options => write!(f, "OPTIONS"),
        }
    }
}

/// Route handler identifier
pub type HandlerId = usize;

/// Matched route with extracted path parameters
#[derive(Debug, Clone)]
pub struct Match {
    /// The handler ID for this route
    pub handler_id: HandlerId,
    /// Extracted path parameters
    pub params: HashMap<String, String>,
}

/// Router keyed first by method, then by path
#[derive(Clone, Default)]
pub struct Router {
    method_routes: HashMap<Method, MatchitRouter<HandlerId>>,
    patterns: Vec<(Method, String)>,
}

impl Router {
    /// Create a new empty router
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route with the given method and path pattern
    ///
    /// Returns the handler ID assigned to this route. IDs are dense and
    /// follow registration order.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the pattern is malformed or
    /// conflicts with an existing route
    pub fn add_route(&mut self, method: Method, path: &str) -> Result<HandlerId> {
        let handler_id = self.patterns.len();

        self.method_routes
            .entry(method)
            .or_default()
            .insert(path, handler_id)
            .map_err(|e| Error::InvalidRoutePattern {
                pattern: path.to_string(),
                reason: e.to_string(),
            })?;

        self.patterns.push((method, path.to_string()));
        Ok(handler_id)
    }

    /// Match a request path against registered routes
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteNotFound` if no matching route exists
    pub fn match_route(&self, method: Method, path: &str) -> Result<Match> {
        let not_found = || Error::RouteNotFound {
            path: path.to_string(),
        };

        let matched = self
            .method_routes
            .get(&method)
            .ok_or_else(not_found)?
            .at(path)
            .map_err(|_| not_found())?;

        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Ok(Match {
            handler_id: *matched.value,
            params,
        })
    }

    /// Registered `(method, pattern)` pairs in handler ID order
    #[must_use]
    pub fn routes(&self) -> &[(Method, String)] {
        &self.patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_routing() {
        let mut router = Router::new();

        let id1 = router.add_route(Method::Get, "/").unwrap();
        let id2 = router.add_route(Method::Get, "/api/probe/health").unwrap();
        let id3 = router.add_route(Method::Post, "/api/probe/health").unwrap();

        assert_eq!((id1, id2, id3), (0, 1, 2));

        assert_eq!(router.match_route(Method::Get, "/").unwrap().handler_id, 0);
        assert_eq!(
            router
                .match_route(Method::Get, "/api/probe/health")
                .unwrap()
                .handler_id,
            1
        );
        assert_eq!(
            router
                .match_route(Method::Post, "/api/probe/health")
                .unwrap()
                .handler_id,
            2
        );
    }

    #[test]
    fn test_path_parameters() {
        let mut router = Router::new();
        router.add_route(Method::Get, "/books/{id}").unwrap();

        let m = router.match_route(Method::Get, "/books/123").unwrap();
        assert_eq!(m.params.get("id").map(String::as_str), Some("123"));
    }

    #[test]
    fn test_route_not_found() {
        let router = Router::new();
        assert!(matches!(
            router.match_route(Method::Get, "/nonexistent"),
            Err(Error::RouteNotFound { .. })
        ));
    }

    #[test]
    fn test_method_not_allowed() {
        let mut router = Router::new();
        router.add_route(Method::Get, "/users").unwrap();
        assert!(router.match_route(Method::Post, "/users").is_err());
    }

    #[test]
    fn test_conflicting_route_rejected() {
        let mut router = Router::new();
        router.add_route(Method::Get, "/users").unwrap();
        assert!(matches!(
            router.add_route(Method::Get, "/users"),
            Err(Error::InvalidRoutePattern { .. })
        ));
        assert_eq!(router.routes().len(), 1);
    }

    #[test]
    fn test_from_hyper_method() {
        assert_eq!(Method::from_hyper(&hyper::Method::POST), Some(Method::Post));
        assert_eq!(Method::from_hyper(&hyper::Method::TRACE), None);
    }
}
