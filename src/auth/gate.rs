//! Request-level authentication gates.
//!
//! Two layers compose around the dashboard: an outer middleware that
//! exchanges a one-time bootstrap token for a signed grant cookie and
//! redirects with the token stripped from the URL, and an inner extractor
//! that requires a grant scoped to the channel in the request path. The
//! deploy-command endpoint sits beside them behind a strict one-parameter
//! token check.

use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::error;

use super::cookie::{AUTH_COOKIE_NAME, get_cookie, grant_cookie};
use super::errors::AccessError;
use super::one_time::{OneTimeTokenIssuer, TokenAuthenticator};
use crate::api::dashboard::channel_id_from_path;
use crate::grant::{ChannelClaims, GrantKeys};

/// Request parameter carrying the one-time bootstrap token.
pub const TOKEN_PARAM: &str = "token";

/// Largest form body `require_token` is willing to buffer.
const FORM_BODY_LIMIT: usize = 64 * 1024;

/// State capability for the grant-issuing and grant-verifying layers.
pub trait GrantGate {
    fn grants(&self) -> &GrantKeys;
    fn bootstrap(&self) -> &OneTimeTokenIssuer;
}

/// State capability for the strict token check on the command endpoint.
pub trait TokenGate {
    fn token_authenticator(&self) -> &dyn TokenAuthenticator;
}

/// Outer dashboard middleware: redeem a bootstrap token into a grant cookie.
///
/// When the query carries a redeemable `token`, mint or extend the grant for
/// the channel in the path, attach it as a cookie and redirect to the same
/// URL without the token, so the one-time token never reaches logs or
/// referrer headers of the rendered page. A missing or unredeemable token is
/// not fatal here; authorization stays with the inner layer.
pub async fn exchange_bootstrap_token<S>(
    State(state): State<S>,
    req: Request,
    next: Next,
) -> Response
where
    S: GrantGate + Clone + Send + Sync + 'static,
{
    let Some(channel) = channel_id_from_path(req.uri().path()) else {
        return next.run(req).await;
    };

    let query = req.uri().query().unwrap_or("");
    let Some(token) = query_param(query, TOKEN_PARAM) else {
        return next.run(req).await;
    };
    if !state.bootstrap().authenticate(&token) {
        return next.run(req).await;
    }

    let existing = get_cookie(req.headers(), AUTH_COOKIE_NAME);
    let grant = match state.grants().grant(existing, &channel) {
        Ok(grant) => grant,
        Err(e) => {
            error!(channel = %channel, error = %e, "Failed to mint channel access grant");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
        }
    };

    let location = stripped_location(req.uri().path(), query);
    let mut response = Redirect::to(&location).into_response();
    if let Ok(value) = header::HeaderValue::from_str(&grant_cookie(&grant)) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }

    response
}

/// Inner dashboard layer: a verified grant scoped to the channel in the
/// request path.
pub struct ChannelAccess {
    pub channel: String,
    pub claims: ChannelClaims,
}

impl<S> axum::extract::FromRequestParts<S> for ChannelAccess
where
    S: GrantGate + Send + Sync,
{
    type Rejection = AccessError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let channel =
            channel_id_from_path(parts.uri.path()).ok_or(AccessError::MissingChannel)?;
        let token =
            get_cookie(&parts.headers, AUTH_COOKIE_NAME).ok_or(AccessError::NotAuthenticated)?;

        let claims = state.grants().verify(token, &channel)?;

        Ok(ChannelAccess { channel, claims })
    }
}

/// Strict one-parameter-token middleware for the command endpoint. The token
/// may arrive as a query parameter or as a urlencoded form field; a missing
/// token is refused outright, unlike at the dashboard gate.
pub async fn require_token<S>(State(state): State<S>, req: Request, next: Next) -> Response
where
    S: TokenGate + Clone + Send + Sync + 'static,
{
    let mut token = query_param(req.uri().query().unwrap_or(""), TOKEN_PARAM);

    let req = if token.is_none() && is_form(&req) {
        let (parts, body) = req.into_parts();
        let bytes = match axum::body::to_bytes(body, FORM_BODY_LIMIT).await {
            Ok(bytes) => bytes,
            Err(_) => {
                return (StatusCode::BAD_REQUEST, "Request body too large").into_response();
            }
        };
        token = query_param(std::str::from_utf8(&bytes).unwrap_or(""), TOKEN_PARAM);
        Request::from_parts(parts, axum::body::Body::from(bytes))
    } else {
        req
    };

    match token {
        None => (StatusCode::UNAUTHORIZED, "Missing token").into_response(),
        Some(token) if !state.token_authenticator().authenticate(&token) => {
            (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
        Some(_) => next.run(req).await,
    }
}

fn is_form(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

fn query_param(query: &str, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, value)| key == name && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

/// The request URL with the bootstrap token parameter removed.
fn stripped_location(path: &str, query: &str) -> String {
    let remaining: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key != TOKEN_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if remaining.is_empty() {
        return path.to_string();
    }

    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(remaining)
        .finish();
    format!("{}?{}", path, query)
}
