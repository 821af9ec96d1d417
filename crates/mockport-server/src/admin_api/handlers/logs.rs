//! Call-log queries against the in-memory store.

use crate::admin_api::types::*;
use crate::engine::MockEngine;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

/// GET /admin/calls?projectId=&limit=
pub fn handle_calls(engine: &MockEngine, query: Option<&str>) -> Response<Full<Bytes>> {
    let params: LogQuery = match parse_query_params(query) {
        Ok(params) => params,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };
    let calls = engine
        .store()
        .recent_calls(params.project_id.as_deref(), params.limit());
    json_response(StatusCode::OK, &serde_json::json!({ "calls": calls }))
}

/// GET /admin/callbacks/logs?definitionId=&limit=
pub fn handle_callback_logs(engine: &MockEngine, query: Option<&str>) -> Response<Full<Bytes>> {
    let params: LogQuery = match parse_query_params(query) {
        Ok(params) => params,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };
    let logs = engine
        .store()
        .recent_callback_logs(params.definition_id.as_deref(), params.limit());
    json_response(StatusCode::OK, &serde_json::json!({ "logs": logs }))
}
