//! Response handling and transformation.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Recognize protocol upgrade requests (exec, attach, port-forward)
//! - Map proxy-side failures to plain-text error responses
//!
//! # Design Decisions
//! - Bodies are streamed, never buffered
//! - `Connection`/`Upgrade` are stripped like any hop-by-hop header; the
//!   forwarder re-adds them on each leg of an upgrade
//! - Upstream transport failures become 502 Bad Gateway

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};

/// Headers that describe a single connection and must not be forwarded.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-connection"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// The requested protocol when `Connection` asks for an upgrade.
pub fn upgrade_protocol(headers: &HeaderMap) -> Option<HeaderValue> {
    let wants_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    if wants_upgrade {
        headers.get(header::UPGRADE).cloned()
    } else {
        None
    }
}

/// Set the headers that carry an upgrade across one hop.
pub fn set_upgrade_headers(headers: &mut HeaderMap, protocol: HeaderValue) {
    headers.insert(header::CONNECTION, HeaderValue::from_static("Upgrade"));
    headers.insert(header::UPGRADE, protocol);
}

/// Copy `headers` without hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if is_hop_by_hop(name) || listed.iter().any(|l| l == name.as_str()) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

/// Plain-text response with the given status.
pub fn text_response(status: StatusCode, message: impl Into<String>) -> Response {
    let mut response = Response::new(Body::from(message.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

pub fn not_found(path: &str) -> Response {
    text_response(StatusCode::NOT_FOUND, format!("no route for {}\n", path))
}

pub fn bad_gateway(error: impl std::fmt::Display) -> Response {
    text_response(StatusCode::BAD_GATEWAY, format!("upstream request failed: {}\n", error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, X-Trace"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-trace", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.append("x-multi", HeaderValue::from_static("a"));
        headers.append("x-multi", HeaderValue::from_static("b"));

        let stripped = strip_hop_by_hop(&headers);
        assert_eq!(stripped.len(), 3);
        assert_eq!(stripped.get(header::ACCEPT).unwrap(), "application/json");
        assert_eq!(stripped.get_all("x-multi").iter().count(), 2);
        assert!(stripped.get("x-trace").is_none());
    }

    #[test]
    fn test_upgrade_protocol() {
        let mut headers = HeaderMap::new();
        headers.insert(header::UPGRADE, HeaderValue::from_static("SPDY/3.1"));
        assert!(upgrade_protocol(&headers).is_none());

        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, Upgrade"));
        assert_eq!(upgrade_protocol(&headers).unwrap(), "SPDY/3.1");

        let stripped = strip_hop_by_hop(&headers);
        assert!(upgrade_protocol(&stripped).is_none());

        let mut forwarded = stripped;
        set_upgrade_headers(&mut forwarded, HeaderValue::from_static("SPDY/3.1"));
        assert_eq!(upgrade_protocol(&forwarded).unwrap(), "SPDY/3.1");
    }

    #[test]
    fn test_error_responses() {
        assert_eq!(not_found("/nope").status(), StatusCode::NOT_FOUND);
        assert_eq!(bad_gateway("refused").status(), StatusCode::BAD_GATEWAY);
    }
}
