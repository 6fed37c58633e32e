//! The authorization endpoint.
//!
//! GET decides between silent SSO re-authentication, the consent page,
//! and the login page. POST consumes either credentials (with a valid
//! login-session token) or a consent continuation (with a valid SSO
//! cookie), then assembles the response the requested response_type asks
//! for: code in the query, everything else in the fragment.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::Form;
use chrono::Utc;
use serde::Deserialize;

use oxidp_token::claims::{
    AccessTokenClaims, CodeClaims, IdTokenClaims, LoginSessionClaims, Signed, SsoClaims,
};
use oxidp_token::hash::half_hash;

use crate::error::{found, ErrorKind, ErrorMessage};
use crate::pages;
use crate::request::{AuthRequest, Normalizer, RawAuthzRequest};
use crate::session;
use crate::state::SharedState;

/// Lifetime of the login-session token embedded in forms.
const LOGIN_SESSION_TTL: Duration = Duration::from_secs(10 * 60);

/// POST body of the authorization endpoint: the request parameters plus
/// the form-only fields. serde_urlencoded cannot flatten, so the
/// parameter fields are spelled out again.
#[derive(Debug, Deserialize)]
pub struct AuthzForm {
    client_id: Option<String>,
    redirect_uri: Option<String>,
    response_type: Option<String>,
    scope: Option<String>,
    state: Option<String>,
    nonce: Option<String>,
    max_age: Option<String>,
    prompt: Option<String>,
    login_hint: Option<String>,
    request: Option<String>,
    request_uri: Option<String>,
    username: Option<String>,
    password: Option<String>,
    session: Option<String>,
}

impl AuthzForm {
    fn into_parts(self) -> (RawAuthzRequest, Credentials) {
        (
            RawAuthzRequest {
                client_id: self.client_id,
                redirect_uri: self.redirect_uri,
                response_type: self.response_type,
                scope: self.scope,
                state: self.state,
                nonce: self.nonce,
                max_age: self.max_age,
                prompt: self.prompt,
                login_hint: self.login_hint,
                request: self.request,
                request_uri: self.request_uri,
            },
            Credentials {
                username: self.username.filter(|s| !s.is_empty()),
                password: self.password.filter(|s| !s.is_empty()),
                session: self.session.filter(|s| !s.is_empty()),
            },
        )
    }
}

struct Credentials {
    username: Option<String>,
    password: Option<String>,
    session: Option<String>,
}

/// GET handler.
pub async fn authorize_get(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(raw): Query<RawAuthzRequest>,
) -> Response {
    let request = match normalize(&state, raw) {
        Ok(request) => request,
        Err(error) => return error.into_authz_response(),
    };

    let ip = client_ip(&headers);
    let sso = usable_sso(&state, &headers, request.max_age);

    if request.prompt.none {
        return match sso {
            Some(sso) if sso.body.authorizes(&request.client_id) && !request.prompt.consent => {
                finish_with_sso(&state, &request, sso)
            }
            Some(_) => request.error(ErrorKind::ConsentRequired).into_authz_response(),
            None => request.error(ErrorKind::LoginRequired).into_authz_response(),
        };
    }

    if let Some(sso) = sso {
        if !request.prompt.login && !request.prompt.select_account {
            if sso.body.authorizes(&request.client_id) && !request.prompt.consent {
                return finish_with_sso(&state, &request, sso);
            }
            return consent_page(&state, &request, &ip);
        }
    }

    login_page(&state, &request, &ip, StatusCode::OK, false)
}

/// POST handler.
pub async fn authorize_post(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(form): Form<AuthzForm>,
) -> Response {
    let (raw, credentials) = form.into_parts();
    let request = match normalize(&state, raw) {
        Ok(request) => request,
        Err(error) => return error.into_authz_response(),
    };

    let ip = client_ip(&headers);

    // Every POST carries the signed login-session token from the form it
    // came from; a missing, expired, or rebound token is a hard stop.
    let session_valid = credentials
        .session
        .as_deref()
        .and_then(|token| {
            state
                .tokens
                .parse_validated::<LoginSessionClaims>(token)
                .ok()
        })
        .is_some_and(|session| session.body.matches(&request.client_id, &ip));
    if !session_valid {
        tracing::debug!(client_id = %request.client_id, "login session token rejected");
        return login_page(&state, &request, &ip, StatusCode::FORBIDDEN, false);
    }

    if credentials.username.is_some() || credentials.password.is_some() {
        let (Some(username), Some(password)) = (&credentials.username, &credentials.password)
        else {
            return login_page(&state, &request, &ip, StatusCode::FORBIDDEN, true);
        };

        match state.authenticator.authenticate(username, password).await {
            Ok(subject) => {
                let now = Utc::now().timestamp();
                let mut sso =
                    SsoClaims::new(&subject.id, now, &request.client_id).with_claims(subject.claims);
                // a re-login keeps the clients the subject already authorized
                if let Some(previous) = usable_sso(&state, &headers, None) {
                    if previous.body.sub == subject.id {
                        sso.clients.extend(previous.body.clients);
                    }
                }
                respond(&state, &request, sso)
            }
            Err(error) if error.is_transport() => {
                tracing::error!(%error, "identity source unavailable");
                request
                    .error(ErrorKind::ServerError)
                    .with_description("authentication backend is unavailable")
                    .into_authz_response()
            }
            Err(error) => {
                tracing::warn!(username = %username, %error, "login failed");
                login_page(&state, &request, &ip, StatusCode::FORBIDDEN, true)
            }
        }
    } else {
        // consent continuation: the SSO cookie carries the identity
        match usable_sso(&state, &headers, request.max_age) {
            Some(sso) => {
                let mut sso = sso.body;
                sso.authorize(&request.client_id);
                respond(&state, &request, sso)
            }
            None => login_page(&state, &request, &ip, StatusCode::FORBIDDEN, false),
        }
    }
}

fn normalize(state: &SharedState, raw: RawAuthzRequest) -> Result<AuthRequest, ErrorMessage> {
    Normalizer {
        registry: &state.registry,
        issuer: state.issuer(),
    }
    .normalize(raw)
}

/// Reads, verifies, and age-checks the SSO cookie.
///
/// The `max_age` comparison is strict: a session is acceptable while
/// `now - auth_time < max_age`, so `max_age=0` always forces a fresh
/// login.
fn usable_sso(
    state: &SharedState,
    headers: &HeaderMap,
    max_age: Option<u64>,
) -> Option<Signed<SsoClaims>> {
    let token = session::read_cookie(headers)?;
    let sso = state.tokens.parse_validated::<SsoClaims>(&token).ok()?;

    if let Some(max_age) = max_age {
        let age = Utc::now().timestamp() - sso.body.auth_time;
        let within = u64::try_from(age).map_or(false, |age| age < max_age);
        if !within {
            return None;
        }
    }

    Some(sso)
}

/// Silent SSO completion: the existing session answers the request.
fn finish_with_sso(
    state: &SharedState,
    request: &AuthRequest,
    sso: Signed<SsoClaims>,
) -> Response {
    respond(state, request, sso.body)
}

/// Assembles the success redirect and re-issues the SSO cookie.
fn respond(state: &SharedState, request: &AuthRequest, sso: SsoClaims) -> Response {
    let filtered = state.filter_claims(&request.scope, &sso.claims);
    let mut params: Vec<(&str, String)> = Vec::new();
    let mut minted_code: Option<String> = None;
    let mut minted_access: Option<String> = None;

    if request.response_type.code {
        let mut claims = CodeClaims::new(
            &sso.sub,
            &request.client_id,
            request.redirect_uri.as_str(),
            request.scope_param(),
            sso.auth_time,
        )
        .with_claims(filtered.clone());
        if let Some(nonce) = &request.nonce {
            claims = claims.with_nonce(nonce);
        }

        match state.tokens.mint(claims, state.config.ttl.code) {
            Ok(token) => {
                params.push(("code", token.clone()));
                minted_code = Some(token);
            }
            Err(error) => return signer_failure(request, &error),
        }
    }

    if request.response_type.token {
        let claims = AccessTokenClaims::new(
            &sso.sub,
            &request.client_id,
            request.scope_param(),
            sso.auth_time,
        )
        .with_claims(filtered.clone());

        match state.tokens.mint(claims, state.config.ttl.token) {
            Ok(token) => {
                params.push(("access_token", token.clone()));
                params.push(("token_type", "Bearer".to_string()));
                params.push(("expires_in", state.config.ttl.token.as_secs().to_string()));
                minted_access = Some(token);
            }
            Err(error) => return signer_failure(request, &error),
        }
    }

    if request.response_type.id_token {
        let mut claims =
            IdTokenClaims::new(&sso.sub, &request.client_id, sso.auth_time).with_claims(filtered);
        if let Some(nonce) = &request.nonce {
            claims = claims.with_nonce(nonce);
        }
        if let Some(access) = &minted_access {
            claims = claims.with_at_hash(half_hash(access));
        }
        if let Some(code) = &minted_code {
            claims = claims.with_c_hash(half_hash(code));
        }

        match state.tokens.mint(claims, state.config.ttl.token) {
            Ok(token) => params.push(("id_token", token)),
            Err(error) => return signer_failure(request, &error),
        }
    }

    if let Some(value) = &request.state {
        params.push(("state", value.clone()));
    }

    let mut uri = request.redirect_uri.clone();
    let encoded = serde_urlencoded::to_string(&params).unwrap_or_default();
    if request.response_type.is_code_only() {
        uri.set_query(Some(&encoded));
    } else {
        uri.set_fragment(Some(&encoded));
    }

    let mut response = found(uri.as_str());

    // rolling renewal: every successful authorization re-issues the cookie
    match state.tokens.mint(sso, state.config.ttl.sso) {
        Ok(token) => {
            let cookie =
                session::set_cookie(&token, state.config.ttl.sso, state.config.secure_cookies());
            if let Ok(value) = cookie.parse() {
                response.headers_mut().append(SET_COOKIE, value);
            }
        }
        Err(error) => return signer_failure(request, &error),
    }

    response
}

fn signer_failure(request: &AuthRequest, error: &oxidp_token::TokenError) -> Response {
    tracing::error!(%error, "token signing failed");
    request
        .error(ErrorKind::ServerError)
        .with_description("failed to sign the response")
        .into_authz_response()
}

/// Renders the login page with a fresh login-session token.
fn login_page(
    state: &SharedState,
    request: &AuthRequest,
    ip: &str,
    status: StatusCode,
    failed: bool,
) -> Response {
    let session = match state.tokens.mint(
        LoginSessionClaims::new(&request.client_id, ip),
        LOGIN_SESSION_TTL,
    ) {
        Ok(token) => token,
        Err(error) => return signer_failure(request, &error),
    };

    let mut fields = request.form_fields();
    fields.push(("session", session));
    let borrowed: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (*k, v.as_str())).collect();

    pages::login_page(
        status,
        &state.config.endpoints.authz,
        &request.client_id,
        &borrowed,
        failed,
    )
}

/// Renders the consent page with a fresh login-session token.
fn consent_page(state: &SharedState, request: &AuthRequest, ip: &str) -> Response {
    let session = match state.tokens.mint(
        LoginSessionClaims::new(&request.client_id, ip),
        LOGIN_SESSION_TTL,
    ) {
        Ok(token) => token,
        Err(error) => return signer_failure(request, &error),
    };

    let mut fields = request.form_fields();
    fields.push(("session", session));
    let borrowed: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (*k, v.as_str())).collect();

    pages::consent_page(
        &state.config.endpoints.authz,
        &request.client_id,
        &request.scope_param(),
        &borrowed,
    )
}

/// Best-effort client IP for login-session binding. Behind the expected
/// reverse proxy this reads the forwarded header; bare deployments all
/// collapse to the same placeholder, which still binds the token to the
/// client_id.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "local".to_string())
}
