//! Route dispatch logic for the Admin API.

use crate::admin_api::handlers::{events, logs, maintenance, system};
use crate::admin_api::types::{not_found, AdminBody, ResponseExt};
use crate::engine::MockEngine;
use hyper::body::Incoming;
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::debug;

/// Main request router
pub async fn route_request(
    req: Request<Incoming>,
    engine: Arc<MockEngine>,
) -> Result<Response<AdminBody>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(|s| s.to_string());

    debug!("Admin API: {} {}", method, path);

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/health") => system::handle_health(&engine).into_boxed(),
        (&Method::GET, "/metrics") => system::handle_metrics().into_boxed(),
        (&Method::GET, "/events") => events::handle_subscribe(&engine, query.as_deref()),
        (&Method::POST, "/admin/cache/invalidate") => {
            maintenance::handle_invalidate(req, &engine).await.into_boxed()
        }
        (&Method::POST, "/admin/reload") => maintenance::handle_reload(&engine).await.into_boxed(),
        (&Method::GET, "/admin/calls") => logs::handle_calls(&engine, query.as_deref()).into_boxed(),
        (&Method::GET, "/admin/callbacks/logs") => {
            logs::handle_callback_logs(&engine, query.as_deref()).into_boxed()
        }
        _ => not_found().into_boxed(),
    };
    Ok(response)
}
