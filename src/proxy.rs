//! Forwarding of allowed requests to the upstream web app.

use std::time::Duration;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use reqwest::{Client, redirect::Policy};
use tracing::{error, warn};
use url::Url;

use crate::APP_USER_AGENT;
use crate::config::ConfigError;

/// Largest request body buffered for forwarding.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Headers scoped to a single connection, never forwarded.
const HOP_BY_HOP: &[header::HeaderName] = &[
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::CONTENT_LENGTH,
];

#[derive(Clone)]
pub struct UpstreamProxy {
    client: Client,
    upstream: Url,
}

impl UpstreamProxy {
    pub fn new(upstream: Url, timeout: Duration) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self { client, upstream })
    }

    /// Upstream URL for an incoming request URI.
    pub fn target(&self, uri: &Uri) -> Result<Url, url::ParseError> {
        let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
        Url::parse(&format!(
            "{}{}",
            self.upstream.as_str().trim_end_matches('/'),
            path_and_query
        ))
    }
}

fn filter_headers(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = headers.clone();
    for name in HOP_BY_HOP {
        filtered.remove(name);
    }
    filtered.remove("keep-alive");
    filtered
}

/// Fallback handler proxying the request upstream.
pub async fn forward(State(proxy): State<UpstreamProxy>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "Failed to read request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let url = match proxy.target(&parts.uri) {
        Ok(url) => url,
        Err(e) => {
            warn!(uri = %parts.uri, error = %e, "Invalid upstream URL");
            return (StatusCode::BAD_REQUEST, "Invalid request path").into_response();
        }
    };

    let mut headers = filter_headers(&parts.headers);
    if let Some(host) = headers.remove(header::HOST) {
        headers.insert("x-forwarded-host", host);
    }

    let upstream_response = match proxy
        .client
        .request(parts.method, url)
        .headers(headers)
        .body(body)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "Upstream request failed");
            return (StatusCode::BAD_GATEWAY, "Upstream unavailable").into_response();
        }
    };

    let status = upstream_response.status();
    let headers = filter_headers(upstream_response.headers());
    let bytes = match upstream_response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "Failed to read upstream response");
            return (StatusCode::BAD_GATEWAY, "Upstream unavailable").into_response();
        }
    };

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
