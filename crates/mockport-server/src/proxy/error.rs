use serde_json::{json, Value};

/// Why a forwarded request produced no backend response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    #[error("Invalid proxy target '{url}': {reason}")]
    InvalidTarget { url: String, reason: String },
    #[error("TLS certificate validation failed for {url}: {detail}")]
    TlsValidation { url: String, detail: String },
    #[error("Backend request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },
    #[error("Backend request to {url} failed: {detail}")]
    Network { url: String, detail: String },
    #[error("Failed to read backend response from {url}: {detail}")]
    ResponseBody { url: String, detail: String },
}

impl ProxyError {
    /// Short machine-readable kind, also used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::InvalidTarget { .. } => "invalid_target",
            ProxyError::TlsValidation { .. } => "tls",
            ProxyError::Timeout { .. } => "timeout",
            ProxyError::Network { .. } => "network",
            ProxyError::ResponseBody { .. } => "response_body",
        }
    }

    pub fn target(&self) -> &str {
        match self {
            ProxyError::InvalidTarget { url, .. }
            | ProxyError::TlsValidation { url, .. }
            | ProxyError::Timeout { url, .. }
            | ProxyError::Network { url, .. }
            | ProxyError::ResponseBody { url, .. } => url,
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ProxyError::TlsValidation { .. } => Some(
                "The backend certificate is not trusted. Install a certificate signed by a \
                 public CA, add the issuing CA to the system trust store, or set \
                 proxy.tls_skip_verify for development backends.",
            ),
            ProxyError::Timeout { .. } => {
                Some("The backend did not answer in time. Check its health or raise proxy.request_timeout_secs.")
            }
            ProxyError::InvalidTarget { .. } => {
                Some("Check the project's backend URL; it must be an absolute http(s) URL.")
            }
            ProxyError::Network { .. } => {
                Some("Check that the backend is reachable from the mock server.")
            }
            ProxyError::ResponseBody { .. } => None,
        }
    }

    /// Body of the synthesized 502 response.
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "error": "Bad Gateway",
            "kind": self.kind(),
            "message": self.to_string(),
            "target": self.target(),
        });
        if let Some(hint) = self.hint() {
            body["hint"] = Value::String(hint.to_string());
        }
        body
    }
}
