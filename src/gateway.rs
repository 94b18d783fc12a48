//! Per-request authentication gateway.
//!
//! For every request the gateway classifies the path, works out who the caller
//! is (cache first, then a throttled call to the identity backend), and turns
//! that into a [`RouteDecision`]. The axum middleware [`gate`] applies the
//! decision and replays any `Set-Cookie` headers the backend sent.
//!
//! Refresh failures never fail the request. On protected pages they send the
//! caller to login with both credential cookies cleared; everywhere else they
//! are logged and the request continues unauthenticated.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri, header, uri::PathAndQuery},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, info, warn};

use crate::auth::{Credentials, append_clear_cookies};
use crate::cache::{CachedRefreshResult, CredentialCache};
use crate::config::{ConfigError, GatewayConfig};
use crate::refresh::{RefreshClient, RefreshError};
use crate::role::{RouteDecision, UserType, route_for};
use crate::routes::{RouteCategory, SEARCH_PATH, canonical_path, classify, normalize_path};
use crate::throttle::RefreshThrottle;

/// Diagnostic header set when credentials were cleared, carrying the path
/// that triggered it.
pub const AUTH_CLEARED_HEADER: HeaderName = HeaderName::from_static("x-auth-cleared");

type Resolution = Result<CachedRefreshResult, RefreshError>;

/// Outcome of evaluating one request.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub category: RouteCategory,
    /// Path as the upstream will see it, dot segments resolved.
    pub canonical_path: String,
    /// Canonical path with repeated and trailing slashes dropped.
    pub path: String,
    pub decision: RouteDecision,
    /// `Set-Cookie` values from a refresh made for this request.
    pub set_cookies: Vec<HeaderValue>,
}

/// Shared gateway state: one per process, behind an `Arc`.
pub struct Gateway {
    config: GatewayConfig,
    cache: Arc<CredentialCache>,
    throttle: RefreshThrottle,
    client: RefreshClient,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = RefreshClient::new(&config.backend_url, config.refresh_timeout)?;

        Ok(Self {
            cache: Arc::new(CredentialCache::new(config.cache_capacity)),
            throttle: RefreshThrottle::new(config.refresh_cooldown),
            client,
            config,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn cache(&self) -> &CredentialCache {
        &self.cache
    }

    pub fn throttle(&self) -> &RefreshThrottle {
        &self.throttle
    }

    /// Decide what to do with a request.
    pub async fn evaluate(&self, uri: &Uri, headers: &HeaderMap) -> Verdict {
        let canonical = canonical_path(uri.path());
        let path = normalize_path(&canonical);
        let query = uri.query();
        let category = classify(&path);

        let mut verdict = Verdict {
            category,
            canonical_path: canonical,
            path,
            decision: RouteDecision::Continue,
            set_cookies: Vec::new(),
        };

        if category == RouteCategory::Bypass {
            return verdict;
        }

        let credentials = Credentials::from_headers(headers);

        if category == RouteCategory::Protected && credentials.is_empty() {
            debug!(path = %verdict.path, "No credentials on protected route");
            verdict.decision = RouteDecision::clear_and_login();
            return verdict;
        }

        // Keep the access credential warm whatever the route.
        let mut resolved = None;
        if credentials.needs_refresh() {
            let result = self
                .resolve_for(&credentials, None, &mut verdict.set_cookies)
                .await;
            if let Some(Err(e)) = &result {
                warn!(path = %verdict.path, error = %e, "Opportunistic refresh failed");
            }
            resolved = result;
        }

        verdict.decision = match category {
            RouteCategory::Protected => {
                match self
                    .resolve_for(&credentials, resolved, &mut verdict.set_cookies)
                    .await
                {
                    Some(Ok(identity)) => route_for(identity.user_type, &verdict.path, query),
                    Some(Err(e)) => {
                        info!(path = %verdict.path, error = %e, "Protected route without identity");
                        RouteDecision::clear_and_login()
                    }
                    None => RouteDecision::clear_and_login(),
                }
            }
            RouteCategory::AuthOnly => {
                match self
                    .resolve_for(&credentials, resolved, &mut verdict.set_cookies)
                    .await
                {
                    Some(Ok(identity)) if identity.user_type != UserType::Unknown => {
                        RouteDecision::redirect(SEARCH_PATH, None)
                    }
                    _ => RouteDecision::Continue,
                }
            }
            RouteCategory::Public | RouteCategory::Bypass => RouteDecision::Continue,
        };

        verdict
    }

    /// Reuse an earlier resolution for this request, or resolve now.
    /// Returns `None` when the request carries no credential at all.
    async fn resolve_for(
        &self,
        credentials: &Credentials,
        earlier: Option<Resolution>,
        set_cookies: &mut Vec<HeaderValue>,
    ) -> Option<Resolution> {
        if earlier.is_some() {
            return earlier;
        }
        let key = credentials.cache_key()?;
        Some(self.resolve(key, credentials, set_cookies).await)
    }

    /// Cache, then throttle, then the identity backend.
    async fn resolve(
        &self,
        key: &str,
        credentials: &Credentials,
        set_cookies: &mut Vec<HeaderValue>,
    ) -> Resolution {
        if let Some(hit) = self.cache.get(key) {
            debug!(user_id = %hit.user_id, "Identity served from cache");
            return Ok(hit);
        }

        if self.throttle.should_throttle(key) {
            return Err(RefreshError::Throttled);
        }

        // The refresh runs in its own task so a dropped request still
        // populates the cache for the next one.
        let client = self.client.clone();
        let cache = Arc::clone(&self.cache);
        let ttl = self.config.cache_ttl;
        let key = key.to_string();
        let cookie = credentials.cookie_header.clone();
        let task = tokio::spawn(async move {
            let outcome = client.refresh(cookie.as_ref()).await?;
            let cached = cache.store_refresh(&key, &outcome.identity, ttl);
            Ok::<_, RefreshError>((cached, outcome.set_cookies))
        });

        match task.await {
            Ok(Ok((cached, cookies))) => {
                info!(user_id = %cached.user_id, user_type = ?cached.user_type, "Refreshed identity");
                set_cookies.extend(cookies);
                Ok(cached)
            }
            Ok(Err(e)) => Err(e),
            Err(e) => Err(RefreshError::Transport(format!("refresh task failed: {}", e))),
        }
    }

    /// Response for a redirect decision. `Continue` has no response of its own.
    fn redirect_response(&self, decision: &RouteDecision, trigger_path: &str) -> Option<Response> {
        let location = decision.location()?;
        let mut response = Redirect::temporary(&location).into_response();

        if let RouteDecision::ClearAuthAndRedirect { .. } = decision {
            let headers = response.headers_mut();
            if let Ok(value) = HeaderValue::from_str(trigger_path) {
                headers.insert(AUTH_CLEARED_HEADER, value);
            }
        }

        Some(response)
    }
}

/// Middleware applying the gateway to every request.
pub async fn gate(
    State(gateway): State<Arc<Gateway>>,
    mut request: Request,
    next: Next,
) -> Response {
    let verdict = gateway.evaluate(request.uri(), request.headers()).await;

    let mut response = match gateway.redirect_response(&verdict.decision, &verdict.path) {
        Some(response) => response,
        None => {
            // Downstream must see the path that was classified.
            if request.uri().path() != verdict.canonical_path {
                match with_path(request.uri(), &verdict.canonical_path) {
                    Some(uri) => *request.uri_mut() = uri,
                    None => {
                        warn!(uri = %request.uri(), "Cannot rewrite request path");
                        return (StatusCode::BAD_REQUEST, "Invalid request path").into_response();
                    }
                }
            }
            next.run(request).await
        }
    };

    let headers = response.headers_mut();
    for cookie in verdict.set_cookies {
        headers.append(header::SET_COOKIE, cookie);
    }
    // Appended after the backend's cookies so the clearing values win.
    if let RouteDecision::ClearAuthAndRedirect { .. } = verdict.decision {
        append_clear_cookies(headers, gateway.config.secure_cookies);
    }

    response
}

/// `uri` with its path replaced and its query kept.
fn with_path(uri: &Uri, path: &str) -> Option<Uri> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(parts).ok()
}
