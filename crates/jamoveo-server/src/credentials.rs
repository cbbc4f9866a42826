//! Where a client may present its bearer token.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use jamoveo_auth::strip_bearer;
use serde::Deserialize;

/// `?token=` query parameter, for clients that cannot set headers on a
/// `WebSocket` handshake.
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    /// Raw token.
    pub token: Option<String>,
}

/// Token from `Authorization`, falling back to `?token=`, with any `Bearer`
/// scheme removed.
///
/// Values that are blank once the scheme is gone count as absent.
pub fn extract(headers: &HeaderMap, query: &TokenQuery) -> Option<String> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(strip_bearer)
        .filter(|v| !v.is_empty());
    let from_query = query
        .token
        .as_deref()
        .map(strip_bearer)
        .filter(|v| !v.is_empty());
    from_header.or(from_query).map(str::to_owned)
}
