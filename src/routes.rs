//! Request classification.
//!
//! Every request path falls into exactly one category. Categories are checked
//! in a fixed order: bypass first, then protected, then auth-only, and anything
//! left over is public.

/// Path prefixes that are never intercepted (API calls and framework assets).
const BYPASS_PREFIXES: &[&str] = &["/api", "/_next", "/static", "/assets", "/favicon.ico"];

/// File extensions served as static assets.
const STATIC_EXTENSIONS: &[&str] = &[
    "css", "js", "map", "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "avif", "woff",
    "woff2", "ttf", "otf", "txt", "xml", "json", "webmanifest",
];

/// Path prefixes that require a logged-in session.
const PROTECTED_PREFIXES: &[&str] = &[
    "/parent",
    "/provider",
    "/employer",
    "/employee",
    "/dashboard",
    "/profile",
    "/favorites",
    "/payment",
    "/checkout",
    "/subscription",
];

/// Path prefixes only reachable by unauthenticated callers.
const AUTH_ONLY_PREFIXES: &[&str] = &["/login", "/register", "/signup", "/forgot-password"];

/// Login page, target of every credential-clearing redirect.
pub const LOGIN_PATH: &str = "/login";

/// Landing page for authenticated callers hitting an auth-only page.
pub const SEARCH_PATH: &str = "/search";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteCategory {
    /// Static assets and API calls, passed through untouched.
    Bypass,
    /// Requires a resolved identity.
    Protected,
    /// Login and registration pages.
    AuthOnly,
    Public,
}

/// Classify a path. The path is expected to be normalized already.
pub fn classify(path: &str) -> RouteCategory {
    if BYPASS_PREFIXES.iter().any(|p| matches_prefix(path, p)) || is_static_asset(path) {
        RouteCategory::Bypass
    } else if PROTECTED_PREFIXES.iter().any(|p| matches_prefix(path, p)) {
        RouteCategory::Protected
    } else if AUTH_ONLY_PREFIXES.iter().any(|p| matches_prefix(path, p)) {
        RouteCategory::AuthOnly
    } else {
        RouteCategory::Public
    }
}

/// Segment-aware prefix match: `/provider` matches `/provider` and
/// `/provider/dashboard` but not `/providers`.
pub fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn is_static_asset(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or_default();
    match last.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => STATIC_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext)),
        _ => false,
    }
}

/// Resolve `path` into the form the upstream will see once it is parsed as a
/// URL. Backslashes become slashes, percent-encoded unreserved characters are
/// decoded, and `.` and `..` segments are removed. Empty segments and a
/// trailing slash are kept.
pub fn canonical_path(path: &str) -> String {
    let decoded = decode_unreserved(&path.replace('\\', "/"));
    let rest = decoded.strip_prefix('/').unwrap_or(&decoded);

    let segments: Vec<&str> = rest.split('/').collect();
    let last = segments.len() - 1;
    let mut resolved: Vec<&str> = Vec::with_capacity(segments.len());
    for (i, segment) in segments.iter().enumerate() {
        match *segment {
            "." => {}
            ".." => {
                resolved.pop();
            }
            other => {
                resolved.push(other);
                continue;
            }
        }
        if i == last {
            resolved.push("");
        }
    }

    format!("/{}", resolved.join("/"))
}

fn decode_unreserved(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                let byte = hi << 4 | lo;
                if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
                    out.push(byte);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|d| d as u8)
}

/// Collapse repeated slashes and drop trailing slashes. The root stays `/`.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        normalized.push('/');
        normalized.push_str(segment);
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}
