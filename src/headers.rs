//! Request header decoration for the streaming REST collaborator.
//!
//! The hosting platform keeps one long-lived streaming connection to a
//! remote instance; every request on it carries basic-auth credentials (when
//! configured) and must never be served from a cache.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CACHE_CONTROL};

/// Insert `Authorization` and `Cache-Control` headers for a streaming
/// request.
///
/// The `Authorization: Basic <token>` header is set only when
/// `credential_token` is non-empty; `Cache-Control: no-cache` is always set.
/// Existing values for either header are replaced.
pub fn decorate_streaming_headers(headers: &mut HeaderMap, credential_token: &str) {
    if !credential_token.is_empty() {
        match HeaderValue::from_str(&format!("Basic {credential_token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => {
                tracing::warn!("credential token contains invalid header characters, skipping");
            }
        }
    }
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
}
