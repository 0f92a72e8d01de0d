//! Endpoint handlers
//!
//! Each handler receives a clone of the shared [`AppContext`] plus the
//! request. Handlers that report a database outcome answer with the
//! [`ApiResponse`] envelope.

use crate::config::Settings;
use libprobe_core::{
    Connector, ConnectionSelector, Error, HttpRequest, HttpResponse, Result, RunOutcome,
    SelectorError, StepRunner, VerifyError, CLIENT_CLOSED_REQUEST,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Message returned when a switch names an unknown key
pub const INVALID_KEY_MESSAGE: &str = "Invalid database key. Valid keys are 'old' or 'new'.";
/// Message returned by long-running operations that ran to the end
pub const OPERATION_COMPLETED: &str = "Operation completed successfully.";
/// Message returned by long-running operations cut short by the client
pub const OPERATION_CANCELED: &str = "Request canceled by the client.";

/// State shared by every handler
#[derive(Clone, Debug)]
pub struct AppContext {
    /// Active database holder
    pub selector: ConnectionSelector,
    /// Loaded settings
    pub settings: Arc<Settings>,
    /// Runner behind the long-running endpoints
    pub runner: StepRunner,
}

impl AppContext {
    /// Build the context from settings, verifying through `connector`
    pub fn new(settings: Settings, connector: Arc<dyn Connector>) -> Self {
        let selector = ConnectionSelector::new(
            settings.connection_strings.clone(),
            settings.default_database,
            connector,
        );
        let runner = StepRunner::new(settings.probes.step_delay(), settings.probes.step_count);
        Self {
            selector,
            settings: Arc::new(settings),
            runner,
        }
    }
}

/// Uniform result envelope of the database endpoints
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    /// Mirrors the HTTP status
    pub response_code: u16,
    /// True only for 2xx outcomes
    pub is_success: bool,
    /// Payload on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Human-readable failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Successful envelope
    pub fn ok(data: T) -> Self {
        Self {
            response_code: 200,
            is_success: true,
            data: Some(data),
            error_message: None,
        }
    }

    /// Failed envelope with status `code`
    pub fn failure(code: u16, message: impl Into<String>) -> Self {
        Self {
            response_code: code,
            is_success: false,
            data: None,
            error_message: Some(message.into()),
        }
    }

    /// Serialize into a response carrying the envelope's status
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if `T` cannot be serialized
    pub fn into_response(self) -> Result<HttpResponse> {
        HttpResponse::json_value(self.response_code, &self)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwitchDatabaseRequest {
    db_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationRequest {
    name: Option<String>,
    number: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionBody<'a> {
    version: &'a str,
    git_hub_repo: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthBody {
    status: &'static str,
    db_connection: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

/// Landing page pointing at the version endpoint
pub async fn home(_ctx: AppContext, req: HttpRequest) -> Result<HttpResponse> {
    let host = req.header("host").unwrap_or("localhost");
    let link = format!("http://{host}/api/AdvancedQualityDevelopTest/apiversion");
    Ok(HttpResponse::html(format!(
        "<!DOCTYPE html>\n<html>\n<head><title>Library API</title></head>\n<body>\n\
         <h1>Backend is running</h1>\n<p>API version: <a href=\"{link}\">{link}</a></p>\n\
         </body>\n</html>\n"
    )))
}

/// Report the configured version and source repository
pub async fn api_version(ctx: AppContext, _req: HttpRequest) -> Result<HttpResponse> {
    let info = &ctx.settings.api_info;
    info!(version = %info.version, "Serving API version");
    HttpResponse::json_value(
        200,
        &VersionBody {
            version: &info.version,
            git_hub_repo: &info.repository,
        },
    )
}

/// Always fails, so the top-level error handler answers 500
pub async fn break_application(_ctx: AppContext, _req: HttpRequest) -> Result<HttpResponse> {
    info!("Raising deliberate server error");
    Err(Error::handler("Custom 500 error to check Auto Heal."))
}

/// Answer after the configured delay
pub async fn delayed_response(ctx: AppContext, _req: HttpRequest) -> Result<HttpResponse> {
    let delay = ctx.settings.probes.delayed_response();
    info!(seconds = delay.as_secs(), "Delaying response");
    tokio::time::sleep(delay).await;
    Ok(HttpResponse::text(format!(
        "Response after {} seconds",
        delay.as_secs()
    )))
}

/// Probe the active database
pub async fn health(ctx: AppContext, _req: HttpRequest) -> Result<HttpResponse> {
    match ctx.selector.check_active().await {
        Ok(key) => {
            debug!(database = %key, "Health check passed");
            HttpResponse::json_value(
                200,
                &HealthBody {
                    status: "Healthy",
                    db_connection: "Successful",
                    error_message: None,
                },
            )
        }
        Err(e) => {
            error!(error = %e, "Health check failed");
            let error_message = match e {
                VerifyError::Connectivity(_) => None,
                VerifyError::Unexpected(reason) => Some(reason),
            };
            HttpResponse::json_value(
                500,
                &HealthBody {
                    status: "Unhealthy",
                    db_connection: "Failed",
                    error_message,
                },
            )
        }
    }
}

/// Switch the active database, rolling back if it cannot be reached
pub async fn switch_database(ctx: AppContext, req: HttpRequest) -> Result<HttpResponse> {
    let body: Option<SwitchDatabaseRequest> = req.json()?;
    let Some(key) = body.and_then(|b| b.db_key) else {
        return ApiResponse::<String>::failure(400, INVALID_KEY_MESSAGE).into_response();
    };

    match ctx.selector.switch(&key).await {
        Ok(active) => ApiResponse::ok(format!("Switched to {active} database.")).into_response(),
        Err(SelectorError::InvalidKey { key }) => {
            warn!(%key, "Rejected database key");
            ApiResponse::<String>::failure(400, INVALID_KEY_MESSAGE).into_response()
        }
        Err(SelectorError::ConnectivityFailure { reverted_to, .. }) => ApiResponse::<String>::failure(
            500,
            format!("Database connection failed. Reverted to {reverted_to}."),
        )
        .into_response(),
        Err(SelectorError::UnexpectedError { reverted_to, .. }) => ApiResponse::<String>::failure(
            500,
            format!("Unexpected error. Reverted to {reverted_to}."),
        )
        .into_response(),
    }
}

/// Whether the new database is the active one
pub async fn current_database(ctx: AppContext, _req: HttpRequest) -> Result<HttpResponse> {
    let current = ctx.selector.current().await;
    ApiResponse::ok(current == libprobe_core::DbKey::New).into_response()
}

/// Run the step sequence until done or until the client disconnects
pub async fn long_running(ctx: AppContext, req: HttpRequest) -> Result<HttpResponse> {
    info!("Long-running operation started");
    Ok(operation_response(ctx.runner.run(req.cancellation()).await))
}

/// Same as [`long_running`], accepting an optional JSON body
pub async fn long_running_post(ctx: AppContext, req: HttpRequest) -> Result<HttpResponse> {
    if let Some(body) = req.json::<OperationRequest>()? {
        debug!(name = ?body.name, number = ?body.number, "Long-running operation payload");
    }
    info!("Long-running POST operation started");
    Ok(operation_response(ctx.runner.run(req.cancellation()).await))
}

fn operation_response(outcome: RunOutcome) -> HttpResponse {
    match outcome {
        RunOutcome::Completed => HttpResponse::text(OPERATION_COMPLETED),
        RunOutcome::Cancelled { at_step } => {
            warn!(at_step, "Operation canceled by the client");
            HttpResponse::text(OPERATION_CANCELED).with_status(CLIENT_CLOSED_REQUEST)
        }
    }
}

/// Dump the effective settings
pub async fn app_settings(ctx: AppContext, _req: HttpRequest) -> Result<HttpResponse> {
    HttpResponse::json_value(200, &*ctx.settings)
}

/// Abort the process when crashing is enabled
pub async fn crash(ctx: AppContext, _req: HttpRequest) -> Result<HttpResponse> {
    if !ctx.settings.probes.enable_crash {
        warn!("Crash requested but disabled");
        return Ok(HttpResponse::json(r#"{"error":"Crash endpoint is disabled"}"#).with_status(403));
    }
    error!("Crash requested, aborting process");
    std::process::abort()
}
