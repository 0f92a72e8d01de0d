//! Route table
//!
//! Two controllers share the probe handlers: the full
//! `AdvancedQualityDevelopTest` surface and the reduced
//! `QualityDevelopTest` one.

use crate::handlers::{self, AppContext};
use libprobe_core::{
    handler, CorsMiddleware, Handler, HttpRequest, HttpResponse, LoggingMiddleware, Method, Result,
    Server, TimingMiddleware,
};
use std::future::Future;

const ADVANCED: &str = "/api/AdvancedQualityDevelopTest";
const BASIC: &str = "/api/QualityDevelopTest";

fn with_context<F, Fut>(ctx: &AppContext, f: F) -> Handler
where
    F: Fn(AppContext, HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
{
    let ctx = ctx.clone();
    handler(move |req| f(ctx.clone(), req))
}

/// Build a server with every route and middleware registered
///
/// # Errors
///
/// Returns `Error::InvalidRoutePattern` if a route cannot be registered
pub fn build_server(ctx: &AppContext) -> Result<Server> {
    let settings = &ctx.settings.server;
    let mut server = Server::new().bind(settings.address);
    server.set_max_body_size(settings.max_body_size);
    server.set_shutdown_timeout(settings.shutdown_timeout());

    server.add_middleware(LoggingMiddleware::new());
    server.add_middleware(TimingMiddleware::new());
    server.add_middleware(CorsMiddleware::new().allow_origin(settings.cors_origin.clone()));

    server.add_route(Method::Get, "/", with_context(ctx, handlers::home))?;

    let advanced = format!("{ADVANCED}/");
    server.add_route(Method::Get, &format!("{advanced}apiversion"), with_context(ctx, handlers::api_version))?;
    server.add_route(
        Method::Get,
        &format!("{advanced}BreakApplication500Error"),
        with_context(ctx, handlers::break_application),
    )?;
    server.add_route(
        Method::Get,
        &format!("{advanced}delayedresponse"),
        with_context(ctx, handlers::delayed_response),
    )?;
    server.add_route(Method::Get, &format!("{advanced}health"), with_context(ctx, handlers::health))?;
    server.add_route(
        Method::Post,
        &format!("{advanced}SwitchDatabase"),
        with_context(ctx, handlers::switch_database),
    )?;
    server.add_route(
        Method::Get,
        &format!("{advanced}GetCurrentDatabase"),
        with_context(ctx, handlers::current_database),
    )?;
    server.add_route(
        Method::Get,
        &format!("{advanced}long-running-operation"),
        with_context(ctx, handlers::long_running),
    )?;
    server.add_route(
        Method::Post,
        &format!("{advanced}long-running-operation-post"),
        with_context(ctx, handlers::long_running_post),
    )?;
    server.add_route(
        Method::Get,
        &format!("{advanced}appsettings"),
        with_context(ctx, handlers::app_settings),
    )?;
    server.add_route(Method::Get, &format!("{advanced}crash"), with_context(ctx, handlers::crash))?;

    server.add_route(
        Method::Get,
        &format!("{BASIC}/BreakApplication500Error"),
        with_context(ctx, handlers::break_application),
    )?;
    server.add_route(
        Method::Get,
        &format!("{BASIC}/delayedresponse"),
        with_context(ctx, handlers::delayed_response),
    )?;
    server.add_route(Method::Get, &format!("{BASIC}/health"), with_context(ctx, handlers::health))?;

    Ok(server)
}
