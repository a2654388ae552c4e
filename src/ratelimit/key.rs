//! Client key derivation.

use axum::http::HeaderMap;
use tracing::warn;

/// Key shared by every client that cannot be identified.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Left-most address in `header_name`, if there is a usable one.
///
/// Proxies append to `X-Forwarded-For`, so the left-most entry is the
/// client that opened the connection.
pub fn first_hop(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .map(str::to_string)
}

/// Derive the rate limit key for a request from a trusted header.
///
/// A missing, empty, or non-UTF-8 header falls back to [`UNKNOWN_CLIENT`].
pub fn client_key(headers: &HeaderMap, header_name: &str) -> String {
    first_hop(headers, header_name).unwrap_or_else(|| {
        warn!(header = %header_name, "Client header missing, using shared bucket");
        UNKNOWN_CLIENT.to_string()
    })
}
