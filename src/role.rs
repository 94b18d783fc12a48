//! Role-based routing for protected pages.

use crate::routes::{LOGIN_PATH, matches_prefix};

/// Account type reported by the identity backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserType {
    Parent,
    Provider,
    Employer,
    Employee,
    /// Missing or unrecognized account type.
    Unknown,
}

impl UserType {
    /// Map the backend's `userType` string. Anything unrecognized is `Unknown`.
    pub fn from_backend(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("parent") => Self::Parent,
            Some(v) if v.eq_ignore_ascii_case("provider") => Self::Provider,
            Some(v) if v.eq_ignore_ascii_case("employer") => Self::Employer,
            Some(v) if v.eq_ignore_ascii_case("employee") => Self::Employee,
            _ => Self::Unknown,
        }
    }

    /// Path prefixes this account type may visit.
    pub fn allowed_prefixes(self) -> &'static [&'static str] {
        match self {
            Self::Parent => &["/parent", "/profile", "/favorites", "/payment", "/checkout"],
            Self::Provider => &[
                "/provider",
                "/profile",
                "/payment",
                "/checkout",
                "/subscription",
            ],
            Self::Employer | Self::Employee => &["/employer", "/employee", "/profile", "/payment"],
            Self::Unknown => &[],
        }
    }

    /// Canonical landing page, `None` for `Unknown`.
    pub fn home_path(self) -> Option<&'static str> {
        match self {
            Self::Parent => Some("/parent/dashboard"),
            Self::Provider => Some("/provider/dashboard"),
            Self::Employer | Self::Employee => Some("/employer/dashboard"),
            Self::Unknown => None,
        }
    }
}

/// What the gateway does with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Let the request through.
    Continue,
    /// Redirect, carrying the original query string when there was one.
    RedirectTo { path: String, query: Option<String> },
    /// Redirect after clearing both credential cookies.
    ClearAuthAndRedirect { path: String },
}

impl RouteDecision {
    pub fn redirect(path: &str, query: Option<&str>) -> Self {
        Self::RedirectTo {
            path: path.to_string(),
            query: query.filter(|q| !q.is_empty()).map(str::to_string),
        }
    }

    pub fn clear_and_login() -> Self {
        Self::ClearAuthAndRedirect {
            path: LOGIN_PATH.to_string(),
        }
    }

    /// `Location` value for redirect decisions.
    pub fn location(&self) -> Option<String> {
        match self {
            Self::Continue => None,
            Self::RedirectTo {
                path,
                query: Some(query),
            } => Some(format!("{}?{}", path, query)),
            Self::RedirectTo { path, query: None } | Self::ClearAuthAndRedirect { path } => {
                Some(path.clone())
            }
        }
    }
}

/// Decide whether `user_type` may visit `path`, preserving `query` on redirect.
pub fn route_for(user_type: UserType, path: &str, query: Option<&str>) -> RouteDecision {
    let Some(home) = user_type.home_path() else {
        return RouteDecision::clear_and_login();
    };

    if user_type
        .allowed_prefixes()
        .iter()
        .any(|prefix| matches_prefix(path, prefix))
    {
        RouteDecision::Continue
    } else {
        RouteDecision::redirect(home, query)
    }
}
