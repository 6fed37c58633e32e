//! The token endpoint.
//!
//! Authenticates the client (HTTP Basic or form fields; clients without a
//! secret are never accepted here), then dispatches on `grant_type`:
//! `authorization_code`, `refresh_token`, `password`, and
//! `client_credentials`.

use std::collections::{BTreeSet, HashMap};

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use url::Url;

use oxidp_core::{Client, ClientRegistry};
use oxidp_token::claims::{AccessTokenClaims, IdTokenClaims, RefreshTokenClaims};
use oxidp_token::hash::half_hash;
use oxidp_token::TokenError;

use crate::error::{ErrorKind, ErrorMessage};
use crate::state::SharedState;

/// Token endpoint request body.
#[derive(Debug, Default, Deserialize)]
pub struct TokenForm {
    grant_type: Option<String>,
    code: Option<String>,
    redirect_uri: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    scope: Option<String>,
    refresh_token: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

/// Token endpoint success body.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// The bearer access token.
    pub access_token: String,
    /// Always `Bearer`.
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    /// Rotated refresh token, when `offline_access` was granted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// ID token, when `openid` was granted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// The granted scope, space separated.
    pub scope: String,
}

/// POST handler.
pub async fn token(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(form): Form<TokenForm>,
) -> Response {
    match handle(&state, &headers, form).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => error.into_json_response(),
    }
}

async fn handle(
    state: &SharedState,
    headers: &HeaderMap,
    form: TokenForm,
) -> Result<TokenResponse, ErrorMessage> {
    let client = authenticate_client(state, headers, &form)?;

    match form.grant_type.as_deref().unwrap_or("") {
        "authorization_code" => code_grant(state, client, &form),
        "refresh_token" => refresh_grant(state, client, &form),
        "password" => password_grant(state, client, &form).await,
        "client_credentials" => client_credentials_grant(state, client, &form),
        other => Err(ErrorMessage::json(
            ErrorKind::UnsupportedGrantType,
            format!("grant_type {other:?} is not supported"),
        )),
    }
}

/// Resolves and authenticates the calling client.
///
/// Credentials come from the `Authorization: Basic` header or from the
/// `client_id`/`client_secret` form fields. A client without a secret can
/// never authenticate here.
fn authenticate_client<'a>(
    state: &'a SharedState,
    headers: &HeaderMap,
    form: &TokenForm,
) -> Result<&'a Client, ErrorMessage> {
    let rejected = || ErrorMessage::json(ErrorKind::InvalidClient, "client authentication failed");

    let (client_id, secret) = match basic_credentials(headers) {
        Some(result) => result.map_err(|()| rejected())?,
        None => {
            let client_id = form.client_id.clone().filter(|s| !s.is_empty());
            let secret = form.client_secret.clone().filter(|s| !s.is_empty());
            match (client_id, secret) {
                (Some(id), Some(secret)) => (id, secret),
                _ => return Err(rejected()),
            }
        }
    };

    let client = state.registry.resolve(&client_id).ok_or_else(rejected)?;
    match &client.client_secret {
        Some(expected) if *expected == secret => Ok(client),
        _ => {
            tracing::warn!(client_id = %client_id, "client authentication failed");
            Err(rejected())
        }
    }
}

/// Parses `Authorization: Basic` credentials, when present.
///
/// Returns `None` when the header is absent, `Some(Err(()))` when it is
/// present but unusable.
fn basic_credentials(headers: &HeaderMap) -> Option<Result<(String, String), ()>> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;

    let parse = || {
        let decoded = STANDARD.decode(encoded.trim()).map_err(|_| ())?;
        let text = String::from_utf8(decoded).map_err(|_| ())?;
        let (id, secret) = text.split_once(':').ok_or(())?;
        let id = urlencoding::decode(id).map_err(|_| ())?.into_owned();
        let secret = urlencoding::decode(secret).map_err(|_| ())?.into_owned();
        Ok((id, secret))
    };
    Some(parse())
}

fn code_grant(
    state: &SharedState,
    client: &Client,
    form: &TokenForm,
) -> Result<TokenResponse, ErrorMessage> {
    let code = form
        .code
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ErrorMessage::json(ErrorKind::InvalidRequest, "code is required"))?;
    let redirect_uri = form
        .redirect_uri
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ErrorMessage::json(ErrorKind::InvalidRequest, "redirect_uri is required")
        })?;

    let signed = state.tokens.consume_code(code).map_err(grant_error)?;
    let claims = signed.body;

    if claims.aud != client.client_id {
        return Err(ErrorMessage::json(
            ErrorKind::InvalidGrant,
            "code was issued to another client",
        ));
    }
    let matches = Url::parse(redirect_uri).is_ok_and(|u| u.as_str() == claims.redirect_uri);
    if !matches {
        return Err(ErrorMessage::json(
            ErrorKind::InvalidGrant,
            "redirect_uri does not match the authorization request",
        ));
    }

    let scope: BTreeSet<String> = claims.scope.split_whitespace().map(str::to_string).collect();
    mint_response(
        state,
        &claims.sub,
        &client.client_id,
        &scope,
        claims.auth_time,
        claims.nonce.as_deref(),
        &claims.claims,
    )
}

fn refresh_grant(
    state: &SharedState,
    client: &Client,
    form: &TokenForm,
) -> Result<TokenResponse, ErrorMessage> {
    let token = form
        .refresh_token
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ErrorMessage::json(ErrorKind::InvalidRequest, "refresh_token is required")
        })?;

    let signed = state
        .tokens
        .parse_validated::<RefreshTokenClaims>(token)
        .map_err(grant_error)?;
    let claims = signed.body;

    if claims.aud != client.client_id {
        return Err(ErrorMessage::json(
            ErrorKind::InvalidGrant,
            "refresh token was issued to another client",
        ));
    }

    let original: BTreeSet<String> =
        claims.scope.split_whitespace().map(str::to_string).collect();
    let requested: BTreeSet<String> = form
        .scope
        .as_deref()
        .unwrap_or("")
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let effective = if requested.is_empty() {
        original.clone()
    } else {
        if !requested.is_subset(&original) {
            return Err(ErrorMessage::json(
                ErrorKind::InvalidScope,
                "scope can be narrowed but never widened",
            ));
        }
        requested
    };

    mint_response(
        state,
        &claims.sub,
        &client.client_id,
        &effective,
        claims.auth_time,
        claims.nonce.as_deref(),
        &claims.claims,
    )
}

async fn password_grant(
    state: &SharedState,
    client: &Client,
    form: &TokenForm,
) -> Result<TokenResponse, ErrorMessage> {
    if !client.allow_password_grant {
        return Err(ErrorMessage::json(
            ErrorKind::UnsupportedGrantType,
            "password grant is disallowed for this client",
        ));
    }

    let username = form
        .username
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ErrorMessage::json(ErrorKind::InvalidRequest, "username is required"))?;
    let password = form
        .password
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ErrorMessage::json(ErrorKind::InvalidRequest, "password is required"))?;

    let subject = match state.authenticator.authenticate(username, password).await {
        Ok(subject) => subject,
        Err(error) if error.is_transport() => {
            tracing::error!(%error, "identity source unavailable");
            return Err(ErrorMessage::json(
                ErrorKind::ServerError,
                "authentication backend is unavailable",
            ));
        }
        Err(_) => {
            return Err(ErrorMessage::json(
                ErrorKind::InvalidGrant,
                "username or password is incorrect",
            ));
        }
    };

    let requested: BTreeSet<String> = form
        .scope
        .as_deref()
        .unwrap_or("")
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let scope = ClientRegistry::normalize_scopes(client, &requested)
        .map_err(|e| ErrorMessage::json(ErrorKind::InvalidScope, e.to_string()))?;

    mint_response(
        state,
        &subject.id,
        &client.client_id,
        &scope,
        Utc::now().timestamp(),
        None,
        &subject.claims,
    )
}

fn client_credentials_grant(
    state: &SharedState,
    client: &Client,
    form: &TokenForm,
) -> Result<TokenResponse, ErrorMessage> {
    if !client.allow_client_credentials {
        return Err(ErrorMessage::json(
            ErrorKind::UnsupportedGrantType,
            "client_credentials grant is disallowed for this client",
        ));
    }

    let requested: BTreeSet<String> = form
        .scope
        .as_deref()
        .unwrap_or("")
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let scope = ClientRegistry::normalize_scopes(client, &requested)
        .map_err(|e| ErrorMessage::json(ErrorKind::InvalidScope, e.to_string()))?;

    // the subject is the client itself; never an ID token, never a refresh
    let access = AccessTokenClaims::new(
        &client.client_id,
        &client.client_id,
        scope.iter().cloned().collect::<Vec<_>>().join(" "),
        Utc::now().timestamp(),
    );
    let access_token = state
        .tokens
        .mint(access, state.config.ttl.token)
        .map_err(grant_error)?;

    Ok(TokenResponse {
        access_token,
        token_type: "Bearer",
        expires_in: state.config.ttl.token.as_secs(),
        refresh_token: None,
        id_token: None,
        scope: scope.iter().cloned().collect::<Vec<_>>().join(" "),
    })
}

/// Mints the access/ID/refresh token combination a user grant produces.
fn mint_response(
    state: &SharedState,
    sub: &str,
    client_id: &str,
    scope: &BTreeSet<String>,
    auth_time: i64,
    nonce: Option<&str>,
    claims: &HashMap<String, serde_json::Value>,
) -> Result<TokenResponse, ErrorMessage> {
    let scope_param = scope.iter().cloned().collect::<Vec<_>>().join(" ");
    let filtered = state.filter_claims(scope, claims);

    let access = AccessTokenClaims::new(sub, client_id, &scope_param, auth_time)
        .with_claims(filtered.clone());
    let access_token = state
        .tokens
        .mint(access, state.config.ttl.token)
        .map_err(grant_error)?;

    let id_token = if scope.contains("openid") {
        let mut id = IdTokenClaims::new(sub, client_id, auth_time)
            .with_claims(filtered)
            .with_at_hash(half_hash(&access_token));
        if let Some(nonce) = nonce {
            id = id.with_nonce(nonce);
        }
        Some(
            state
                .tokens
                .mint(id, state.config.ttl.token)
                .map_err(grant_error)?,
        )
    } else {
        None
    };

    let refresh_token = if scope.contains("offline_access") {
        let mut refresh = RefreshTokenClaims::new(sub, client_id, &scope_param, auth_time)
            .with_claims(claims.clone());
        if let Some(nonce) = nonce {
            refresh = refresh.with_nonce(nonce);
        }
        Some(
            state
                .tokens
                .mint(refresh, state.config.ttl.refresh_ttl())
                .map_err(grant_error)?,
        )
    } else {
        None
    };

    Ok(TokenResponse {
        access_token,
        token_type: "Bearer",
        expires_in: state.config.ttl.token.as_secs(),
        refresh_token,
        id_token,
        scope: scope_param,
    })
}

/// Maps token-manager failures onto the grant error taxonomy: the
/// client's fault is `invalid_grant`, the signer's fault is
/// `server_error`.
fn grant_error(error: TokenError) -> ErrorMessage {
    if error.is_client_error() {
        ErrorMessage::json(ErrorKind::InvalidGrant, error.to_string())
    } else {
        tracing::error!(%error, "token signing failed");
        ErrorMessage::json(ErrorKind::ServerError, "failed to sign the response")
    }
}
