//! SSO cookie handling.
//!
//! The cookie value is a signed `SSO` token; nothing about the session is
//! stored server-side. The cookie is re-issued on every successful
//! authorization, which gives the rolling renewal.

use std::time::Duration;

use axum::http::header::{HeaderMap, COOKIE};

/// Name of the SSO session cookie.
pub const SSO_COOKIE: &str = "OXIDP_SSO";

/// Builds the `Set-Cookie` value for a fresh SSO token.
#[must_use]
pub fn set_cookie(token: &str, max_age: Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{SSO_COOKIE}={token}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
        max_age.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Builds the `Set-Cookie` value that clears the SSO cookie.
#[must_use]
pub fn clear_cookie(secure: bool) -> String {
    let mut cookie = format!("{SSO_COOKIE}=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Extracts the SSO token from the request's `Cookie` header, if any.
#[must_use]
pub fn read_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SSO_COOKIE).then(|| value.to_string())
        })
        .next()
}
