//! Grant cookie reading and writing.

use axum::http::{HeaderMap, header};

use crate::clock::now_unix;
use crate::grant::GrantResult;

/// Cookie carrying the signed channel access grant.
pub const AUTH_COOKIE_NAME: &str = "Auth";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Build the Set-Cookie value storing a freshly minted grant. The cookie
/// lives exactly as long as the grant itself. SameSite=Lax so it still rides
/// on top-level navigations from the chat client.
pub fn grant_cookie(grant: &GrantResult) -> String {
    let max_age = grant.expires_at.saturating_sub(now_unix());
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        AUTH_COOKIE_NAME, grant.token, max_age
    )
}
