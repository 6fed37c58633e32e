//! The userinfo endpoint.
//!
//! Bearer-protected: validates the access token's signature, expiry, and
//! audience, then answers with the claims subset the granted scopes
//! authorise. `sub` is always present.

use std::collections::BTreeSet;

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{Map, Value};

use oxidp_token::claims::AccessTokenClaims;

use crate::error::{ErrorKind, ErrorMessage};
use crate::state::SharedState;

/// GET/POST handler.
pub async fn userinfo(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    match handle(&state, &headers) {
        Ok(claims) => Json(claims).into_response(),
        Err(error) => error.into_json_response(),
    }
}

fn handle(state: &SharedState, headers: &HeaderMap) -> Result<Map<String, Value>, ErrorMessage> {
    let token = bearer_token(headers)
        .ok_or_else(|| ErrorMessage::json(ErrorKind::InvalidToken, "bearer token is required"))?;

    let access = state
        .tokens
        .parse_validated::<AccessTokenClaims>(&token)
        .map_err(|e| ErrorMessage::json(ErrorKind::InvalidToken, e.to_string()))?;

    if state.registry.resolve(&access.body.aud).is_none() {
        return Err(ErrorMessage::json(
            ErrorKind::InvalidToken,
            "token audience is unknown",
        ));
    }

    let scopes: BTreeSet<String> = access
        .body
        .scope
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let allowed = state.allowed_claim_names(&scopes);

    let mut claims = Map::new();
    claims.insert("sub".to_string(), Value::String(access.body.sub));
    for (name, value) in access.body.claims {
        if allowed.contains(&name) {
            claims.insert(name, value);
        }
    }

    Ok(claims)
}

/// Extracts the bearer token from the `Authorization` header.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer the-token"),
        );
        assert_eq!(bearer_token(&headers), Some("the-token".to_string()));
    }

    #[test]
    fn bearer_extraction_rejects_other_schemes_and_empty() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        assert_eq!(bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
