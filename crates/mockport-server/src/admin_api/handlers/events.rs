//! GET /events - live call/callback/notification stream.

use crate::admin_api::types::*;
use crate::broadcast::{sse_body, SubscriptionFilter};
use crate::engine::MockEngine;
use hyper::{Response, StatusCode};
use tracing::{debug, warn};

pub fn handle_subscribe(engine: &MockEngine, query: Option<&str>) -> Response<AdminBody> {
    let filter: SubscriptionFilter = match parse_query_params(query) {
        Ok(filter) => filter,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e).into_boxed(),
    };
    if filter.is_empty() {
        warn!("Event subscription without filters will only receive heartbeats");
    }

    let registry = engine.registry();
    let subscription = registry.subscribe(filter);
    debug!("Event stream opened for client {}", subscription.client_id);

    let body = sse_body(registry, subscription);
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/event-stream")
        .header("Cache-Control", "no-cache")
        .header("Access-Control-Allow-Origin", "*")
        .body(body)
        .unwrap_or_else(|_| {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to open event stream")
                .into_boxed()
        })
}
