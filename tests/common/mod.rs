#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use bosun::store::MemoryStore;
use bosun::{ServerConfig, create_app};
use tower::ServiceExt;

pub const VERIFICATION_TOKEN: &str = "webhook-verification-token";
pub const GRANT_SECRET: &[u8] = b"integration-test-grant-secret-0123456789";

/// Build an app backed by an in-memory store.
pub fn app() -> Router {
    create_app(&ServerConfig {
        store: Arc::new(MemoryStore::new()),
        verification_token: VERIFICATION_TOKEN.into(),
        grant_secret: GRANT_SECRET.to_vec(),
    })
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<axum::body::Body> {
    app.clone()
        .oneshot(request)
        .await
        .expect("request never fails")
}

/// A slash-command webhook request carrying the verification token.
pub fn command_request(channel: &str, user_id: &str, user_name: &str, text: &str) -> Request<Body> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("token", VERIFICATION_TOKEN)
        .append_pair("command", "/deploy")
        .append_pair("channel_id", channel)
        .append_pair("user_id", user_id)
        .append_pair("user_name", user_name)
        .append_pair("text", text)
        .finish();

    Request::post("/deploy")
        .header(header::HOST, "bosun.example.com")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .expect("valid request")
}

pub async fn body_string(response: Response<axum::body::Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("readable body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub async fn body_json(response: Response<axum::body::Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).expect("json body")
}

/// Run `/deploy history` and pull the one-time token out of the reply link.
pub async fn issue_bootstrap_token(app: &Router, channel: &str) -> String {
    let response = send(app, command_request(channel, "U0", "historian", "history")).await;
    let json = body_json(response).await;
    let text = json["text"].as_str().expect("text field");

    let start = text.find("token=").expect("link contains a token") + "token=".len();
    let end = text[start..].find('|').expect("link is closed");
    text[start..start + end].to_string()
}

/// Value of the `Auth` cookie set by `response`, if any.
pub fn auth_cookie(response: &Response<axum::body::Body>) -> Option<String> {
    let set_cookie = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    let value = set_cookie.strip_prefix("Auth=")?;
    Some(value.split(';').next().unwrap_or(value).to_string())
}

/// A dashboard GET with an optional `Auth` cookie.
pub fn dashboard_request(path: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(path);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, format!("Auth={}", cookie));
    }
    builder.body(Body::empty()).expect("valid request")
}

/// Exchange a fresh bootstrap token for a grant cookie scoped to `channel`.
pub async fn authenticated_cookie(app: &Router, channel: &str) -> String {
    let token = issue_bootstrap_token(app, channel).await;
    let response = send(
        app,
        dashboard_request(&format!("/{}?token={}", channel, token), None),
    )
    .await;
    auth_cookie(&response).expect("exchange sets the Auth cookie")
}
