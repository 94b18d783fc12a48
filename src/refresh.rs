//! Client for the identity backend's refresh endpoint.
//!
//! The gateway never looks inside credentials. It forwards the caller's
//! `Cookie` header to `POST {base}/api/auth/refresh`, reads the identity out of
//! the JSON body, and hands back any `Set-Cookie` headers untouched so they can
//! be replayed to the browser.

use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use reqwest::{Client, redirect::Policy};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::APP_USER_AGENT;
use crate::config::ConfigError;
use crate::role::UserType;

/// Path of the refresh endpoint, relative to the backend base URL.
pub const REFRESH_ENDPOINT_PATH: &str = "api/auth/refresh";

/// Why a refresh did not produce an identity.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RefreshError {
    #[error("refresh transport error: {0}")]
    Transport(String),

    #[error("identity backend rejected refresh with status {0}")]
    BackendRejected(StatusCode),

    #[error("identity backend returned a malformed identity: {0}")]
    MalformedIdentity(String),

    #[error("refresh throttled, cooldown still active")]
    Throttled,
}

impl From<reqwest::Error> for RefreshError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Transport(format!("timed out: {}", e))
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Identity resolved from a refresh response.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    /// Stable user id, if the backend sent one.
    pub user_id: Option<String>,
    pub user_type: UserType,
    pub email: String,
    /// Full response body, kept for callers that need more than the core fields.
    pub raw_payload: Value,
}

/// Successful refresh call.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub identity: Identity,
    /// `Set-Cookie` headers from the backend, in order, byte-for-byte.
    pub set_cookies: Vec<HeaderValue>,
}

#[derive(Deserialize, Default)]
struct RefreshBody {
    #[serde(default)]
    user: Option<UserPayload>,
    #[serde(default)]
    data: Option<DataPayload>,
}

#[derive(Deserialize, Default)]
struct DataPayload {
    #[serde(default)]
    user: Option<UserPayload>,
}

#[derive(Deserialize, Default)]
struct UserPayload {
    #[serde(default, alias = "_id", alias = "userId")]
    id: Option<Value>,
    #[serde(default, rename = "userType", alias = "user_type")]
    user_type: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// Extract the identity from a refresh response body.
///
/// The user object may sit at `user` or `data.user`. A body whose user object
/// carries neither `userType` nor `email` is rejected; one carrying only one of
/// them resolves with whatever it has, which routes as `UserType::Unknown` when
/// the type is missing.
pub fn parse_identity(body: &[u8]) -> Result<Identity, RefreshError> {
    let raw: Value = serde_json::from_slice(body)
        .map_err(|e| RefreshError::MalformedIdentity(format!("invalid JSON: {}", e)))?;

    let parsed: RefreshBody = serde_json::from_value(raw.clone())
        .map_err(|e| RefreshError::MalformedIdentity(e.to_string()))?;

    let user = parsed
        .user
        .or_else(|| parsed.data.and_then(|d| d.user))
        .ok_or_else(|| RefreshError::MalformedIdentity("missing user object".into()))?;

    let user_type = user.user_type.filter(|t| !t.trim().is_empty());
    let email = user.email.filter(|e| !e.trim().is_empty());
    if user_type.is_none() && email.is_none() {
        return Err(RefreshError::MalformedIdentity(
            "missing userType and email".into(),
        ));
    }

    let user_id = match user.id {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    Ok(Identity {
        user_id,
        user_type: UserType::from_backend(user_type.as_deref()),
        email: email.unwrap_or_default(),
        raw_payload: raw,
    })
}

/// HTTP client bound to one identity backend.
#[derive(Clone)]
pub struct RefreshClient {
    client: Client,
    endpoint: Url,
}

impl RefreshClient {
    /// Build a client for `base`. Every call is bounded by `timeout`.
    pub fn new(base: &Url, timeout: Duration) -> Result<Self, ConfigError> {
        let endpoint = refresh_endpoint(base)?;
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Call the refresh endpoint, forwarding `cookie` verbatim.
    pub async fn refresh(
        &self,
        cookie: Option<&HeaderValue>,
    ) -> Result<RefreshOutcome, RefreshError> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = cookie {
            headers.insert(header::COOKIE, cookie.clone());
        }

        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(headers)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::BackendRejected(status));
        }

        let set_cookies: Vec<HeaderValue> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .cloned()
            .collect();

        let body = response.bytes().await?;
        let identity = parse_identity(&body)?;

        Ok(RefreshOutcome {
            identity,
            set_cookies,
        })
    }
}

fn refresh_endpoint(base: &Url) -> Result<Url, ConfigError> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        REFRESH_ENDPOINT_PATH
    );
    Url::parse(&joined).map_err(|e| ConfigError::InvalidUrl {
        url: joined,
        reason: e.to_string(),
    })
}
