//! # HTTP Server
//!
//! HTTP/1 server built on Hyper and Tokio.
//!
//! ## Key Features
//!
//! - Each handler runs on its own task, so a panic or error is caught by
//!   the top-level error handler and turned into a structured 500
//! - Every request carries a cancellation token that fires when the client
//!   connection is dropped mid-request
//! - Graceful shutdown on SIGINT/SIGTERM with connection draining
//! - A zero-network `dispatch` path sharing the exact same pipeline

use crate::error::{Error, Result};
use crate::middleware::{Middleware, MiddlewareChain, MiddlewareResult};
use crate::router::{Method, Router};
use http_body_util::Full;
pub use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub use crate::request::HttpRequest;

/// Status used when the client abandoned the request (nginx convention)
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// HTTP Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub address: SocketAddr,
    /// Enable keep-alive connections
    pub keep_alive: bool,
    /// Shutdown timeout for graceful shutdown (default: 30 seconds)
    pub shutdown_timeout: Duration,
    /// Max request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 8000).into(),
            keep_alive: true,
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024,
        }
    }
}

/// HTTP response produced by handlers
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
    /// Content type
    pub content_type: String,
    /// Response headers
    pub headers: HashMap<String, String>,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self {
            status: 200,
            body: String::new(),
            content_type: "application/json".to_string(),
            headers: HashMap::new(),
        }
    }
}

impl HttpResponse {
    /// Create a JSON response from a pre-encoded body
    #[must_use]
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Serialize `value` into a JSON response with the given status
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the value cannot be serialized
    pub fn json_value<T: Serialize>(status: u16, value: &T) -> Result<Self> {
        Ok(Self::json(crate::json::to_json(value)?).with_status(status))
    }

    /// Create a text response
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: "text/plain; charset=utf-8".to_string(),
            ..Self::default()
        }
    }

    /// Create an HTML response
    #[must_use]
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: "text/html; charset=utf-8".to_string(),
            ..Self::default()
        }
    }

    /// Set status code
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set or override a header
    pub fn set_header(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("content-type") {
            self.content_type = value.to_string();
        } else {
            self.headers.insert(key.to_string(), value.to_string());
        }
    }

    /// Header value set on this response, if any
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Convert to hyper Response
    fn into_hyper(self) -> Response<Full<Bytes>> {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = Response::builder()
            .status(status)
            .header("Content-Type", &self.content_type);
        for (k, v) in &self.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }

        builder
            .body(Full::new(Bytes::from(self.body)))
            .unwrap_or_else(|e| {
                error!(error = %e, "Failed to build response");
                let mut fallback = Response::new(Full::new(Bytes::from("Internal Server Error")));
                *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                fallback
            })
    }
}

/// Boxed future returned by handlers
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Handler function type (async)
pub type Handler = Arc<dyn Fn(HttpRequest) -> BoxFuture<'static, Result<HttpResponse>> + Send + Sync>;

/// Wrap an async function or closure into a [`Handler`]
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

/// Body returned by the top-level error handler
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerErrorBody {
    /// Always "Server error"
    pub title: &'static str,
    /// Always 500
    pub status_code: u16,
    /// Generic user-facing message
    pub message: &'static str,
    /// Error message of the failure
    pub details: String,
}

impl ServerErrorBody {
    fn new(details: impl Into<String>) -> Self {
        Self {
            title: "Server error",
            status_code: 500,
            message: "An unexpected error occurred. Please try again later.",
            details: details.into(),
        }
    }
}

/// Shared, cheaply clonable request pipeline
#[derive(Clone)]
struct Pipeline {
    router: Arc<Router>,
    handlers: Arc<Vec<Handler>>,
    middleware: Arc<MiddlewareChain>,
}

impl Pipeline {
    /// Core request processing logic (network agnostic)
    async fn run(self, mut req: HttpRequest) -> HttpResponse {
        if req.header("x-request-id").is_none() {
            let request_id = generate_request_id();
            req.set_header("x-request-id", &request_id);
        }

        let mut response = match self.router.match_route(req.method, &req.path) {
            Ok(matched) => {
                req.params = matched.params;
                match self.middleware.run_before(&req) {
                    MiddlewareResult::Continue => {
                        let handler = Arc::clone(&self.handlers[matched.handler_id]);
                        run_handler(&handler, &req).await
                    }
                    MiddlewareResult::Respond(resp) => resp,
                }
            }
            Err(_) => HttpResponse::json(r#"{"error":"Not Found"}"#).with_status(404),
        };

        if let Some(request_id) = req.header("x-request-id") {
            response.set_header("x-request-id", request_id);
        }
        self.middleware.run_after(&req, &mut response);
        response
    }
}

/// Run a handler on its own task and map failures to a structured 500
async fn run_handler(handler: &Handler, req: &HttpRequest) -> HttpResponse {
    let request_id = req.header("x-request-id").unwrap_or("-").to_string();
    let task = tokio::spawn(handler(req.clone()));

    let details = match task.await {
        Ok(Ok(resp)) => return resp,
        Ok(Err(Error::InvalidBody { reason })) => {
            warn!(request_id = %request_id, reason = %reason, "Rejected malformed request body");
            return HttpResponse::json_value(
                400,
                &serde_json::json!({ "error": "Bad Request", "details": reason }),
            )
            .unwrap_or_else(|_| HttpResponse::text("Bad Request").with_status(400));
        }
        Ok(Err(err)) => err.to_string(),
        Err(join_err) if join_err.is_panic() => "handler panicked".to_string(),
        Err(join_err) => join_err.to_string(),
    };

    error!(
        request_id = %request_id,
        method = %req.method,
        path = %req.path,
        error = %details,
        "Unhandled error while processing request"
    );
    HttpResponse::json_value(500, &ServerErrorBody::new(details)).unwrap_or_else(|_| {
        HttpResponse::text("An unexpected error occurred. Please try again later.")
            .with_status(500)
    })
}

/// HTTP server
pub struct Server {
    config: ServerConfig,
    router: Router,
    handlers: Vec<Handler>,
    middleware: MiddlewareChain,
    /// Built on first use, reset whenever routes or middleware change
    pipeline: OnceLock<Pipeline>,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    /// Create a new Server instance
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            router: Router::new(),
            handlers: Vec::new(),
            middleware: MiddlewareChain::new(),
            pipeline: OnceLock::new(),
        }
    }

    /// Bind the server to an address
    #[must_use]
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.address = addr;
        self
    }

    /// Set max request body size
    pub fn set_max_body_size(&mut self, bytes: usize) {
        self.config.max_body_size = bytes;
    }

    /// Set how long shutdown waits for in-flight connections
    pub fn set_shutdown_timeout(&mut self, timeout: Duration) {
        self.config.shutdown_timeout = timeout;
    }

    /// Add a middleware to the chain
    pub fn add_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middleware.add(middleware);
        self.pipeline.take();
    }

    /// Add a route and its handler
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the route is malformed or
    /// already registered
    pub fn add_route(&mut self, method: Method, path: &str, handler: Handler) -> Result<()> {
        let id = self.router.add_route(method, path)?;
        debug_assert_eq!(id, self.handlers.len());
        self.handlers.push(handler);
        self.pipeline.take();
        Ok(())
    }

    fn pipeline(&self) -> Pipeline {
        self.pipeline
            .get_or_init(|| Pipeline {
                router: Arc::new(self.router.clone()),
                handlers: Arc::new(self.handlers.clone()),
                middleware: Arc::new(self.middleware.clone()),
            })
            .clone()
    }

    /// Start the server and run until SIGINT/SIGTERM
    ///
    /// # Errors
    ///
    /// Returns `Error::BindError` if the listener cannot be set up
    pub async fn serve(&self) -> Result<()> {
        self.serve_until(shutdown_signal()).await
    }

    /// Start the server and run until `shutdown` resolves
    ///
    /// # Errors
    ///
    /// Returns `Error::BindError` if the listener cannot be set up, or an
    /// IO error if accepting fails
    pub async fn serve_until<S>(&self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        let addr = self.config.address;
        let bind_err = |source| Error::BindError {
            address: addr.to_string(),
            source,
        };

        let socket = if addr.is_ipv4() {
            tokio::net::TcpSocket::new_v4()
        } else {
            tokio::net::TcpSocket::new_v6()
        }
        .map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;
        let listener = socket.listen(1024).map_err(bind_err)?;

        info!(address = %addr, "Server listening");

        let pipeline = self.pipeline();
        let active = Arc::new(AtomicUsize::new(0));
        let max_body_size = self.config.max_body_size;
        let keep_alive = self.config.keep_alive;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, remote_addr) = match accept_result {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };
                    let io = TokioIo::new(stream);
                    let pipeline = pipeline.clone();
                    let active = Arc::clone(&active);

                    tokio::task::spawn(async move {
                        active.fetch_add(1, Ordering::Relaxed);

                        let service = service_fn(move |req| {
                            let pipeline = pipeline.clone();
                            async move {
                                let method = req.method().clone();
                                let path = req.uri().path().to_string();
                                let version = req.version();

                                let resp = handle_request(req, pipeline, remote_addr, max_body_size).await;
                                info!(
                                    "    {} - \"{} {} {:?}\" {}",
                                    remote_addr,
                                    method,
                                    path,
                                    version,
                                    resp.status()
                                );
                                Ok::<_, hyper::Error>(resp)
                            }
                        });

                        if let Err(err) = http1::Builder::new()
                            .keep_alive(keep_alive)
                            .serve_connection(io, service)
                            .await
                        {
                            error!("Error serving connection: {:?}", err);
                        }
                        active.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                () = &mut shutdown => {
                    info!("Shutdown signal received, stopping server...");
                    break;
                }
            }
        }

        let drain = async {
            while active.load(Ordering::Relaxed) > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        if tokio::time::timeout(self.config.shutdown_timeout, drain)
            .await
            .is_err()
        {
            warn!(
                remaining = active.load(Ordering::Relaxed),
                "Shutdown timeout reached with connections still open"
            );
        }
        Ok(())
    }

    /// Run a request through the full pipeline without the network stack
    pub async fn dispatch(&self, req: HttpRequest) -> HttpResponse {
        if let Some(len) = req.body_bytes().map(<[u8]>::len) {
            if len > self.config.max_body_size {
                return HttpResponse::json(r#"{"error":"Payload Too Large"}"#).with_status(413);
            }
        }
        self.pipeline().run(req).await
    }

    /// Execute a test request directly without network stack
    pub async fn test_request(
        &self,
        method: Method,
        path: &str,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> HttpResponse {
        let mut req = HttpRequest::new(method, path.to_string(), headers, body);
        req.set_header("x-client-ip", "test");
        self.dispatch(req).await
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "Failed to install SIGTERM handler");
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!(error = %e, "Failed to listen for CTRL+C");
                    }
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for CTRL+C");
        }
    }
}

async fn handle_request(
    req: hyper::Request<hyper::body::Incoming>,
    pipeline: Pipeline,
    remote_addr: SocketAddr,
    max_body_size: usize,
) -> Response<Full<Bytes>> {
    let mut request = match HttpRequest::from_hyper_with_limit(req, max_body_size).await {
        Ok(r) => r,
        Err(Error::PayloadTooLarge { limit, actual }) => {
            warn!(limit, actual, "Rejected oversized request body");
            return HttpResponse::json(r#"{"error":"Payload Too Large"}"#)
                .with_status(413)
                .into_hyper();
        }
        Err(Error::MethodNotAllowed { method }) => {
            warn!(%method, "Rejected unsupported method");
            return HttpResponse::json(r#"{"error":"Method Not Allowed"}"#)
                .with_status(405)
                .into_hyper();
        }
        Err(e) => {
            error!("Failed to parse request: {}", e);
            return HttpResponse::text("Bad Request").with_status(400).into_hyper();
        }
    };

    // Hyper drops this future when the client disconnects; the guard then
    // cancels the token seen by the still-running handler task.
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    request.set_cancellation(token);
    request.set_header("x-client-ip", &remote_addr.ip().to_string());

    let response = pipeline.run(request).await;
    guard.disarm();
    response.into_hyper()
}

static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(1);

fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:x}", now.as_nanos(), counter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_with(path: &str, h: Handler) -> Server {
        let mut server = Server::new();
        server.add_route(Method::Get, path, h).unwrap();
        server
    }

    #[test]
    fn test_response_json() {
        let resp = HttpResponse::json(r#"{"status": "ok"}"#);
        assert_eq!(resp.status, 200);
        assert_eq!(resp.content_type, "application/json");
    }

    #[test]
    fn test_response_with_status() {
        let resp = HttpResponse::text("Not Found").with_status(404);
        assert_eq!(resp.status, 404);
        assert!(resp.content_type.starts_with("text/plain"));
    }

    #[test]
    fn test_response_content_type_header_overrides() {
        let mut resp = HttpResponse::text("x");
        resp.set_header("Content-Type", "text/csv");
        assert_eq!(resp.content_type, "text/csv");
        assert!(resp.headers.is_empty());
    }

    #[test]
    fn test_into_hyper_keeps_client_closed_status() {
        let resp = HttpResponse::text("gone").with_status(CLIENT_CLOSED_REQUEST).into_hyper();
        assert_eq!(resp.status().as_u16(), 499);
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.address.port(), 8000);
        assert!(config.keep_alive);
    }

    #[tokio::test]
    async fn test_dispatch_ok_and_request_id() {
        let server = server_with(
            "/ping",
            handler(|_req| async { Ok(HttpResponse::text("pong")) }),
        );
        let resp = server
            .test_request(Method::Get, "/ping", HashMap::new(), None)
            .await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "pong");
        assert!(resp.header("x-request-id").is_some());
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let server = server_with(
            "/ping",
            handler(|_req| async { Ok(HttpResponse::text("pong")) }),
        );
        let mut headers = HashMap::new();
        headers.insert("x-request-id".to_string(), "req-42".to_string());
        let resp = server.test_request(Method::Get, "/ping", headers, None).await;
        assert_eq!(resp.header("x-request-id"), Some("req-42"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let server = Server::new();
        let resp = server
            .test_request(Method::Get, "/missing", HashMap::new(), None)
            .await;
        assert_eq!(resp.status, 404);
    }

    #[tokio::test]
    async fn test_handler_error_becomes_structured_500() {
        let server = server_with(
            "/boom",
            handler(|_req| async { Err(Error::handler("custom failure")) }),
        );
        let resp = server
            .test_request(Method::Get, "/boom", HashMap::new(), None)
            .await;
        assert_eq!(resp.status, 500);
        let body: serde_json::Value = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(body["title"], "Server error");
        assert_eq!(body["statusCode"], 500);
        assert_eq!(body["details"], "custom failure");
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_structured_500() {
        let server = server_with(
            "/panic",
            handler(|_req| async {
                if true {
                    panic!("deliberate");
                }
                Ok(HttpResponse::text("unreachable"))
            }),
        );
        let resp = server
            .test_request(Method::Get, "/panic", HashMap::new(), None)
            .await;
        assert_eq!(resp.status, 500);
        assert!(resp.body.contains("handler panicked"));
    }

    #[tokio::test]
    async fn test_invalid_body_is_400() {
        let mut server = Server::new();
        server
            .add_route(
                Method::Post,
                "/echo",
                handler(|req| async move {
                    let _: Option<serde_json::Value> = req.json()?;
                    Ok(HttpResponse::text("ok"))
                }),
            )
            .unwrap();
        let resp = server
            .test_request(
                Method::Post,
                "/echo",
                HashMap::new(),
                Some(Bytes::from_static(b"{oops")),
            )
            .await;
        assert_eq!(resp.status, 400);
    }

    #[tokio::test]
    async fn test_dispatch_rejects_oversized_body() {
        let mut server = server_with(
            "/ping",
            handler(|_req| async { Ok(HttpResponse::text("pong")) }),
        );
        server.set_max_body_size(4);
        let resp = server
            .test_request(
                Method::Get,
                "/ping",
                HashMap::new(),
                Some(Bytes::from_static(b"too long")),
            )
            .await;
        assert_eq!(resp.status, 413);
    }

    #[tokio::test]
    async fn test_cancellation_token_reaches_handler() {
        let server = server_with(
            "/cancelled",
            handler(|req| async move {
                let status = if req.cancellation().is_cancelled() {
                    CLIENT_CLOSED_REQUEST
                } else {
                    200
                };
                Ok(HttpResponse::text("done").with_status(status))
            }),
        );
        let mut req = HttpRequest::new(Method::Get, "/cancelled".to_string(), HashMap::new(), None);
        let token = CancellationToken::new();
        token.cancel();
        req.set_cancellation(token);
        let resp = server.dispatch(req).await;
        assert_eq!(resp.status, CLIENT_CLOSED_REQUEST);
    }

    #[tokio::test]
    async fn test_pipeline_built_once_and_rebuilt_on_change() {
        let mut server = server_with(
            "/ping",
            handler(|_req| async { Ok(HttpResponse::text("pong")) }),
        );
        let first = server.pipeline();
        assert!(Arc::ptr_eq(&first.router, &server.pipeline().router));
        assert!(Arc::ptr_eq(&first.handlers, &server.pipeline().handlers));

        server
            .add_route(
                Method::Get,
                "/pong",
                handler(|_req| async { Ok(HttpResponse::text("ping")) }),
            )
            .unwrap();
        let rebuilt = server.pipeline();
        assert!(!Arc::ptr_eq(&first.router, &rebuilt.router));
        assert_eq!(rebuilt.handlers.len(), 2);

        let resp = server
            .test_request(Method::Get, "/pong", HashMap::new(), None)
            .await;
        assert_eq!(resp.body, "ping");
    }

    /// Serve `server` on a free loopback port until the sender fires
    async fn spawn_listening(
        server: Server,
    ) -> (
        SocketAddr,
        tokio::sync::oneshot::Sender<()>,
        tokio::task::JoinHandle<Result<()>>,
    ) {
        // Port 0 cannot be dialled back, so reserve a free port first.
        let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = reserved.local_addr().unwrap();
        drop(reserved);

        let server = server.bind(addr);
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let serving = tokio::spawn(async move {
            server
                .serve_until(async {
                    let _ = stop_rx.await;
                })
                .await
        });
        (addr, stop_tx, serving)
    }

    async fn connect(addr: SocketAddr) -> tokio::net::TcpStream {
        loop {
            match tokio::net::TcpStream::connect(addr).await {
                Ok(stream) => return stream,
                Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }
    }

    #[tokio::test]
    async fn test_client_disconnect_cancels_handler_token() {
        use tokio::io::AsyncWriteExt;

        let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel::<bool>();
        let server = server_with(
            "/slow",
            handler(move |req| {
                let seen_tx = seen_tx.clone();
                async move {
                    let cancelled = tokio::select! {
                        () = req.cancellation().cancelled() => true,
                        () = tokio::time::sleep(Duration::from_secs(5)) => false,
                    };
                    let _ = seen_tx.send(cancelled);
                    Ok(HttpResponse::text("done"))
                }
            }),
        );
        let (addr, stop_tx, serving) = spawn_listening(server).await;

        let mut stream = connect(addr).await;
        stream
            .write_all(b"GET /slow HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        drop(stream);

        let cancelled = tokio::time::timeout(Duration::from_secs(3), seen_rx.recv())
            .await
            .expect("handler did not finish after disconnect");
        assert_eq!(cancelled, Some(true));

        let _ = stop_tx.send(());
        assert!(serving.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_unsupported_method_is_405() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let server = server_with(
            "/ping",
            handler(|_req| async { Ok(HttpResponse::text("pong")) }),
        );
        let (addr, stop_tx, serving) = spawn_listening(server).await;

        let mut stream = connect(addr).await;
        stream
            .write_all(b"TRACE /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let response = String::from_utf8_lossy(&raw);
        assert!(response.starts_with("HTTP/1.1 405"), "{response}");
        assert!(response.contains("Method Not Allowed"));

        let _ = stop_tx.send(());
        assert!(serving.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_serve_until_stops_on_signal() {
        let server = Server::new().bind(([127, 0, 0, 1], 0).into());
        let result = server.serve_until(async {}).await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(generate_request_id(), generate_request_id());
    }
}
