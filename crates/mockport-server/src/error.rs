//! Request-level errors of the mock listener.

use crate::store::StoreError;
use hyper::StatusCode;
use serde_json::{json, Value};

/// Outcomes that stop a mock request before a response is decided.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Project '{0}' not found")]
    ProjectNotFound(String),

    #[error("Project '{0}' is not active")]
    ProjectInactive(String),

    #[error("No mock definition matches {method} /{path}")]
    NoRoute { method: String, path: String },

    #[error("Method {0} is not allowed")]
    MethodNotAllowed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn status(&self) -> StatusCode {
        match self {
            EngineError::ProjectNotFound(_) | EngineError::NoRoute { .. } => StatusCode::NOT_FOUND,
            EngineError::ProjectInactive(_) => StatusCode::FORBIDDEN,
            EngineError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({ "error": self.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            EngineError::ProjectNotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            EngineError::ProjectInactive("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            EngineError::NoRoute {
                method: "GET".into(),
                path: "a".into()
            }
            .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            EngineError::MethodNotAllowed("PATCH".into()).status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            EngineError::from(StoreError::Unavailable("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_json_body() {
        let err = EngineError::NoRoute {
            method: "GET".into(),
            path: "users/1".into(),
        };
        assert_eq!(
            err.to_json(),
            json!({"error": "No mock definition matches GET /users/1"})
        );
    }
}
