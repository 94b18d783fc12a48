//! Cookie parsing and clearing for the credential pair.

use axum::http::{HeaderMap, HeaderValue, header};

/// Cookie name for the access credential (short-lived).
pub const ACCESS_COOKIE_NAME: &str = "accessToken";

/// Cookie name for the refresh credential (long-lived).
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Extract a cookie value from the Cookie header. Empty values count as absent.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    for cookie_header in headers.get_all(header::COOKIE) {
        let Ok(cookie_header) = cookie_header.to_str() else {
            continue;
        };
        for part in cookie_header.split(';') {
            let part = part.trim();
            if let Some((key, value)) = part.split_once('=') {
                let value = value.trim();
                if key.trim() == name && !value.is_empty() {
                    return Some(value);
                }
            }
        }
    }
    None
}

/// `Set-Cookie` value expiring `name` immediately.
pub fn clear_cookie(name: &str, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0{}",
        name, secure
    )
}

/// Append headers clearing both credential cookies.
pub fn append_clear_cookies(headers: &mut HeaderMap, secure: bool) {
    for name in [ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME] {
        if let Ok(value) = HeaderValue::from_str(&clear_cookie(name, secure)) {
            headers.append(header::SET_COOKIE, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_cookie_simple() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("accessToken=abc123"));

        assert_eq!(get_cookie(&headers, "accessToken"), Some("abc123"));
    }

    #[test]
    fn test_get_cookie_multiple() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("foo=bar; accessToken=abc123; refreshToken=xyz789"),
        );

        assert_eq!(get_cookie(&headers, "accessToken"), Some("abc123"));
        assert_eq!(get_cookie(&headers, "refreshToken"), Some("xyz789"));
        assert_eq!(get_cookie(&headers, "foo"), Some("bar"));
    }

    #[test]
    fn test_get_cookie_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("foo=bar"));
        headers.append(header::COOKIE, HeaderValue::from_static("refreshToken=xyz"));

        assert_eq!(get_cookie(&headers, "refreshToken"), Some("xyz"));
    }

    #[test]
    fn test_get_cookie_not_found() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("foo=bar"));

        assert_eq!(get_cookie(&headers, "accessToken"), None);
        assert_eq!(get_cookie(&HeaderMap::new(), "accessToken"), None);
    }

    #[test]
    fn test_get_cookie_empty_value() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("accessToken=; x=1"));

        assert_eq!(get_cookie(&headers, "accessToken"), None);
    }

    #[test]
    fn test_get_cookie_with_spaces() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("  accessToken = abc123  ; foo=bar"),
        );

        assert_eq!(get_cookie(&headers, "accessToken"), Some("abc123"));
    }

    #[test]
    fn test_clear_cookies() {
        let mut headers = HeaderMap::new();
        append_clear_cookies(&mut headers, true);

        let values: Vec<_> = headers
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(
            values,
            vec![
                "accessToken=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0; Secure",
                "refreshToken=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0; Secure",
            ]
        );
    }
}
