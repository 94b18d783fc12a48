#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use serde_json::{Value, json};
use tollgate::config::{Environment, GatewayConfig};
use tollgate::gateway::Gateway;
use tollgate::protect;
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const REFRESH_PATH: &str = "/api/auth/refresh";

/// Set-Cookie the fake identity backend hands out on refresh.
pub const BACKEND_SET_COOKIE: &str =
    "accessToken=fresh-access; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age=900";

/// Gateway config pointing at `backend`.
pub fn test_config(backend: &MockServer) -> GatewayConfig {
    let mut config = GatewayConfig::for_environment(Environment::Development)
        .expect("Failed to build default config");
    config.backend_url = Url::parse(&backend.uri()).expect("Invalid mock server URL");
    config
}

/// Gateway in front of a page router that answers every path with "page".
pub fn create_test_app(config: GatewayConfig) -> (Router, Arc<Gateway>) {
    let gateway = Arc::new(Gateway::new(config).expect("Failed to build gateway"));
    let pages = Router::new().fallback(|| async { "page" });
    (protect(pages, gateway.clone()), gateway)
}

pub fn request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub fn location(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string())
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn identity_body(user_type: &str) -> Value {
    json!({
        "success": true,
        "data": {
            "user": {
                "_id": format!("user-{}", user_type),
                "userType": user_type,
                "email": format!("{}@example.com", user_type),
            }
        }
    })
}

/// Mount a refresh endpoint answering with `body` and [`BACKEND_SET_COOKIE`],
/// expecting exactly `calls` calls.
pub async fn mount_refresh(server: &MockServer, body: Value, calls: u64) {
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(body)
                .append_header("set-cookie", BACKEND_SET_COOKIE),
        )
        .expect(calls)
        .mount(server)
        .await;
}

/// Mount a refresh endpoint failing with `status`.
pub async fn mount_refresh_failure(server: &MockServer, status: u16, calls: u64) {
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(status))
        .expect(calls)
        .mount(server)
        .await;
}

/// Mount a refresh endpoint that answers only after `delay`.
pub async fn mount_slow_refresh(server: &MockServer, delay: Duration) {
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(identity_body("parent"))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}
