//! Cache invalidation and fixtures reload.

use crate::admin_api::types::*;
use crate::cache::RouteKey;
use crate::engine::MockEngine;
use crate::store::Fixtures;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use tracing::{info, warn};

/// POST /admin/cache/invalidate - `{projectId, path?, method?}`
///
/// With both `path` and `method` a single route is dropped, otherwise the
/// whole project.
pub async fn handle_invalidate(req: Request<Incoming>, engine: &MockEngine) -> Response<Full<Bytes>> {
    let body = match collect_body(req).await {
        Ok(body) => body,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };
    let request: InvalidateRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid JSON: {e}"));
        }
    };

    let cache = engine.cache();
    let (result, scope) = match (request.path.as_deref(), request.method.as_deref()) {
        (Some(path), Some(method)) => {
            let key = RouteKey::new(&request.project_id, path, method);
            (cache.invalidate(&key), key.storage_key())
        }
        _ => (
            cache.invalidate_project(&request.project_id),
            format!("project {}", request.project_id),
        ),
    };

    match result {
        Ok(()) => {
            info!("Route cache invalidated: {}", scope);
            json_response(
                StatusCode::OK,
                &serde_json::json!({ "invalidated": scope }),
            )
        }
        Err(e) => {
            warn!("Route cache invalidation failed for {}: {:#}", scope, e);
            error_response(StatusCode::SERVICE_UNAVAILABLE, &format!("{e:#}"))
        }
    }
}

/// POST /admin/reload - re-read the fixtures file into the store.
pub async fn handle_reload(engine: &MockEngine) -> Response<Full<Bytes>> {
    let Some(path) = engine.config().store.fixtures_path.clone() else {
        return error_response(StatusCode::BAD_REQUEST, "No fixtures file configured");
    };

    let loaded = tokio::task::spawn_blocking(move || Fixtures::from_file(path)).await;
    let fixtures = match loaded {
        Ok(Ok(fixtures)) => fixtures,
        Ok(Err(e)) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Reload task failed: {e}"),
            )
        }
    };

    let projects = fixtures.projects.len();
    match engine.store().replace_all(fixtures) {
        Ok(()) => {
            info!("Reloaded fixtures ({} projects)", projects);
            json_response(
                StatusCode::OK,
                &serde_json::json!({ "status": "reloaded", "projects": projects }),
            )
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}
