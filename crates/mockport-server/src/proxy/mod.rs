//! Proxy forwarder.
//!
//! Forwards a mock request to a project's backend and relays the answer:
//! - target URL is the backend base joined with the request path, with the
//!   original query string re-appended
//! - hop-by-hop headers are dropped, `x-forwarded-*` headers added
//! - redirects are relayed, never followed
//! - any failure becomes a 502 with a structured [`ProxyError`]

mod client;
mod error;
mod forwarder;
mod headers;
mod tls;

pub use client::{create_http_client, HttpClient};
pub use error::ProxyError;
pub use forwarder::{ProxyForwarder, ProxyOutcome, ProxyRequest};
pub use headers::{forward_request_headers, is_hop_by_hop, strip_hop_by_hop, HOP_BY_HOP};
pub use tls::{create_tls_acceptor, install_crypto_provider, NoVerifier};
