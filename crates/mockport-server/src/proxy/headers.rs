//! Header handling for forwarded requests and relayed responses.

use hyper::header::{HeaderName, HeaderValue, CONNECTION};
use hyper::HeaderMap;

/// Headers that describe a single connection and are never forwarded.
pub const HOP_BY_HOP: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "trailers",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

pub static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub static X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub static X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Copy `headers` minus hop-by-hop ones, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let connection_listed: Vec<String> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name_str = name.as_str();
        if is_hop_by_hop(name_str) || connection_listed.iter().any(|c| c == name_str) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

/// Headers for the backend request: incoming ones minus hop-by-hop, plus
/// `x-forwarded-*`. An existing `x-forwarded-for` chain is extended.
pub fn forward_request_headers(
    incoming: &HeaderMap,
    client_ip: &str,
    protocol: &str,
) -> HeaderMap {
    let original_host = incoming
        .get(hyper::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut headers = strip_hop_by_hop(incoming);

    let forwarded_for = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.trim().is_empty() => format!("{existing}, {client_ip}"),
        _ => client_ip.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        headers.insert(X_FORWARDED_FOR.clone(), value);
    }
    if let Ok(value) = HeaderValue::from_str(protocol) {
        headers.insert(X_FORWARDED_PROTO.clone(), value);
    }
    if let Some(host) = original_host.and_then(|h| HeaderValue::from_str(&h).ok()) {
        headers.insert(X_FORWARDED_HOST.clone(), host);
    }
    headers
}
