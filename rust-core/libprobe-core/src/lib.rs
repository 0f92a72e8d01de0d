//! # libprobe Core
//!
//! Runtime pieces of the library-management probe API.
//!
//! ## Modules
//!
//! - `server` - HTTP server built on Hyper, with a top-level error handler
//!   and per-request cancellation
//! - `router` - Routing using matchit (radix trie)
//! - `request` - Owned HTTP request wrapper
//! - `middleware` - Request/response middleware system
//! - `json` - JSON parsing with simd-json
//! - `database` - Verification connections over SQLx (SQLite, PostgreSQL)
//! - `selector` - Active database selection with verified switching
//! - `steps` - Cancellable fixed-count step runner
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod database;
pub mod error;
pub mod json;
pub mod middleware;
pub mod request;
pub mod router;
pub mod selector;
pub mod server;
pub mod steps;

pub use database::{Connector, DatabaseKind, SqlxConnector, VerifyError};
pub use error::{Error, Result};
pub use middleware::{CorsMiddleware, LoggingMiddleware, Middleware, MiddlewareChain, TimingMiddleware};
pub use request::HttpRequest;
pub use router::{Method, Router};
pub use selector::{ConnectionSelector, ConnectionStrings, DbKey, Selection, SelectorError};
pub use server::{handler, Handler, HttpResponse, Server, CLIENT_CLOSED_REQUEST};
pub use steps::{RunOutcome, StepRunner};
pub use tokio_util::sync::CancellationToken;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
