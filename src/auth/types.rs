//! Credential types.

use axum::http::{HeaderMap, HeaderValue, header};

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, get_cookie};

/// The credential pair presented by a request. Values are opaque.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Raw `Cookie` header, forwarded as-is to the identity backend.
    pub cookie_header: Option<HeaderValue>,
}

impl Credentials {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            access_token: get_cookie(headers, ACCESS_COOKIE_NAME).map(str::to_string),
            refresh_token: get_cookie(headers, REFRESH_COOKIE_NAME).map(str::to_string),
            cookie_header: combined_cookie_header(headers),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }

    /// Access credential expired while the refresh credential is still around.
    pub fn needs_refresh(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_some()
    }

    /// Key for cache and throttle lookups: the refresh credential, else the
    /// access credential.
    pub fn cache_key(&self) -> Option<&str> {
        self.refresh_token
            .as_deref()
            .or(self.access_token.as_deref())
    }
}

/// The request's `Cookie` header. HTTP/2 clients may split cookies across
/// several headers; those are joined with `; ` into one value.
fn combined_cookie_header(headers: &HeaderMap) -> Option<HeaderValue> {
    let mut values = headers.get_all(header::COOKIE).iter();
    let first = values.next()?;
    let rest: Vec<&HeaderValue> = values.collect();
    if rest.is_empty() {
        return Some(first.clone());
    }

    let mut joined = first.as_bytes().to_vec();
    for value in rest {
        joined.extend_from_slice(b"; ");
        joined.extend_from_slice(value.as_bytes());
    }
    HeaderValue::from_bytes(&joined).ok()
}
