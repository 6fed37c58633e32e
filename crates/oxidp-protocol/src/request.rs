//! Authorization request normalisation.
//!
//! Turns the raw query/form parameter bag, plus an optional signed request
//! object, into a validated [`AuthRequest`] — or into an [`ErrorMessage`]
//! already routed to the correct channel. Validation order is strict:
//!
//! 1. client_id resolution (failures render the error page)
//! 2. request_uri rejection
//! 3. request object decode, cross-check, and merge
//! 4. redirect_uri validation (failures render the error page)
//! 5. response_type, prompt, nonce, max_age
//! 6. scope normalisation

use std::collections::BTreeSet;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use url::Url;

use oxidp_core::{Client, ClientRegistry};

use crate::error::{ErrorKind, ErrorMessage};

/// Fields shared between the outer parameters and the request object, in
/// the canonical order used for mismatch reporting.
const MERGE_FIELDS: [&str; 9] = [
    "response_type",
    "client_id",
    "redirect_uri",
    "scope",
    "state",
    "nonce",
    "max_age",
    "prompt",
    "login_hint",
];

/// The raw parameter bag of an authorization call.
///
/// Used for both GET queries and POST forms; credential and session
/// fields of the POST body live in the endpoint handler, not here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAuthzRequest {
    /// `client_id` parameter.
    pub client_id: Option<String>,
    /// `redirect_uri` parameter.
    pub redirect_uri: Option<String>,
    /// `response_type` parameter.
    pub response_type: Option<String>,
    /// `scope` parameter.
    pub scope: Option<String>,
    /// `state` parameter.
    pub state: Option<String>,
    /// `nonce` parameter.
    pub nonce: Option<String>,
    /// `max_age` parameter.
    pub max_age: Option<String>,
    /// `prompt` parameter.
    pub prompt: Option<String>,
    /// `login_hint` parameter.
    pub login_hint: Option<String>,
    /// `request` parameter (signed request object).
    pub request: Option<String>,
    /// `request_uri` parameter (not supported).
    pub request_uri: Option<String>,
}

impl RawAuthzRequest {
    fn get(&self, field: &str) -> Option<&str> {
        let value = match field {
            "response_type" => &self.response_type,
            "client_id" => &self.client_id,
            "redirect_uri" => &self.redirect_uri,
            "scope" => &self.scope,
            "state" => &self.state,
            "nonce" => &self.nonce,
            "max_age" => &self.max_age,
            "prompt" => &self.prompt,
            "login_hint" => &self.login_hint,
            _ => &None,
        };
        value.as_deref().filter(|s| !s.is_empty())
    }

    fn set(&mut self, field: &str, value: String) {
        match field {
            "response_type" => self.response_type = Some(value),
            "client_id" => self.client_id = Some(value),
            "redirect_uri" => self.redirect_uri = Some(value),
            "scope" => self.scope = Some(value),
            "state" => self.state = Some(value),
            "nonce" => self.nonce = Some(value),
            "max_age" => self.max_age = Some(value),
            "prompt" => self.prompt = Some(value),
            "login_hint" => self.login_hint = Some(value),
            _ => {}
        }
    }
}

/// The set of requested response types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResponseTypeSet {
    /// Contains `code`.
    pub code: bool,
    /// Contains `token`.
    pub token: bool,
    /// Contains `id_token`.
    pub id_token: bool,
}

impl ResponseTypeSet {
    /// Parses a whitespace-separated, order-insensitive set.
    ///
    /// # Errors
    ///
    /// Returns the first unknown token.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let mut set = Self::default();
        for part in raw.split_whitespace() {
            match part {
                "code" => set.code = true,
                "token" => set.token = true,
                "id_token" => set.id_token = true,
                unknown => return Err(unknown.to_string()),
            }
        }
        Ok(set)
    }

    /// Whether no response type was requested.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        !self.code && !self.token && !self.id_token
    }

    /// Whether this is the pure code flow.
    #[must_use]
    pub const fn is_code_only(self) -> bool {
        self.code && !self.token && !self.id_token
    }

    /// Whether response parameters belong in the fragment.
    /// True for every flow except the pure code flow.
    #[must_use]
    pub const fn use_fragment(self) -> bool {
        self.token || self.id_token
    }

    /// Canonical string form.
    #[must_use]
    pub fn to_param(self) -> String {
        let mut parts = Vec::new();
        if self.code {
            parts.push("code");
        }
        if self.token {
            parts.push("token");
        }
        if self.id_token {
            parts.push("id_token");
        }
        parts.join(" ")
    }
}

/// The set of requested prompt values. Unknown values are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PromptSet {
    /// `none`: no UI may be shown.
    pub none: bool,
    /// `login`: force re-authentication.
    pub login: bool,
    /// `consent`: force the consent page.
    pub consent: bool,
    /// `select_account`: force account selection.
    pub select_account: bool,
}

impl PromptSet {
    /// Parses a whitespace-separated set.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut set = Self::default();
        for part in raw.split_whitespace() {
            match part {
                "none" => set.none = true,
                "login" => set.login = true,
                "consent" => set.consent = true,
                "select_account" => set.select_account = true,
                _ => {}
            }
        }
        set
    }

    /// Whether `none` conflicts with an interactive prompt.
    #[must_use]
    pub const fn has_conflict(self) -> bool {
        self.none && (self.login || self.consent || self.select_account)
    }

    /// Canonical string form.
    #[must_use]
    pub fn to_param(self) -> String {
        let mut parts = Vec::new();
        if self.none {
            parts.push("none");
        }
        if self.login {
            parts.push("login");
        }
        if self.consent {
            parts.push("consent");
        }
        if self.select_account {
            parts.push("select_account");
        }
        parts.join(" ")
    }
}

/// A fully validated authorization request.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// The requesting client.
    pub client_id: String,
    /// The validated, registered redirect URI.
    pub redirect_uri: Url,
    /// Requested response types.
    pub response_type: ResponseTypeSet,
    /// Granted scopes (already intersected with the client's allowance).
    pub scope: BTreeSet<String>,
    /// Opaque client state.
    pub state: Option<String>,
    /// Nonce; always present in implicit/hybrid flows.
    pub nonce: Option<String>,
    /// Maximum acceptable authentication age in seconds.
    pub max_age: Option<u64>,
    /// Requested prompts.
    pub prompt: PromptSet,
    /// Login hint for the login form.
    pub login_hint: Option<String>,
}

impl AuthRequest {
    /// Space-joined granted scope string.
    #[must_use]
    pub fn scope_param(&self) -> String {
        self.scope.iter().cloned().collect::<Vec<_>>().join(" ")
    }

    /// An error routed back to this request's redirect URI.
    #[must_use]
    pub fn error(&self, kind: ErrorKind) -> ErrorMessage {
        ErrorMessage::redirect(
            self.redirect_uri.clone(),
            self.response_type.use_fragment(),
            self.state.clone(),
            kind,
        )
    }

    /// The hidden form fields that let the login and consent pages
    /// re-submit this request.
    #[must_use]
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("response_type", self.response_type.to_param()),
            ("client_id", self.client_id.clone()),
            ("redirect_uri", self.redirect_uri.to_string()),
            ("scope", self.scope_param()),
        ];
        if let Some(state) = &self.state {
            fields.push(("state", state.clone()));
        }
        if let Some(nonce) = &self.nonce {
            fields.push(("nonce", nonce.clone()));
        }
        if let Some(max_age) = self.max_age {
            fields.push(("max_age", max_age.to_string()));
        }
        let prompt = self.prompt.to_param();
        if !prompt.is_empty() {
            fields.push(("prompt", prompt));
        }
        if let Some(hint) = &self.login_hint {
            fields.push(("login_hint", hint.clone()));
        }
        fields
    }
}

/// The request normaliser.
pub struct Normalizer<'a> {
    /// Client registry for resolution and policy checks.
    pub registry: &'a ClientRegistry,
    /// Canonical issuer string, the required `aud` of request objects.
    pub issuer: &'a str,
}

impl Normalizer<'_> {
    /// Runs the full validation pipeline.
    ///
    /// # Errors
    ///
    /// An [`ErrorMessage`] already routed to the page or redirect channel.
    pub fn normalize(&self, mut raw: RawAuthzRequest) -> Result<AuthRequest, ErrorMessage> {
        let client_id = raw
            .get("client_id")
            .map(str::to_string)
            .ok_or_else(|| ErrorMessage::page(ErrorKind::InvalidRequest, "client_id is required"))?;
        let client = self.registry.resolve(&client_id).ok_or_else(|| {
            ErrorMessage::page(ErrorKind::InvalidRequest, "client_id is not registered")
        })?;

        // The outer redirect_uri, when valid and registered, is a
        // trustworthy error target even before merging.
        let outer_redirect = raw
            .get("redirect_uri")
            .and_then(|s| Url::parse(s).ok())
            .filter(|u| ClientRegistry::check_redirect_uri(client, u));
        // Until response_type is parsed, placement follows the raw string:
        // exactly "code" (or nothing) means query, anything else fragment.
        let early_fragment = raw
            .get("response_type")
            .is_some_and(|s| s.trim() != "code");
        let early_error = |kind: ErrorKind| match &outer_redirect {
            Some(uri) => ErrorMessage::redirect(
                uri.clone(),
                early_fragment,
                raw.get("state").map(str::to_string),
                kind,
            ),
            None => ErrorMessage::page(kind, ""),
        };

        if raw.request_uri.as_deref().is_some_and(|s| !s.is_empty()) {
            return Err(early_error(ErrorKind::RequestUriNotSupported));
        }

        if let Some(object) = raw.request.clone().filter(|s| !s.is_empty()) {
            let inner = decode_request_object(&object, client, self.issuer).map_err(|()| {
                early_error(ErrorKind::InvalidRequestObject)
                    .with_description("failed to decode or validation request object")
            })?;

            let mismatched: Vec<&str> = MERGE_FIELDS
                .iter()
                .copied()
                .filter(|field| {
                    match (raw.get(field), inner.get(*field).and_then(value_as_param)) {
                        (Some(outer), Some(inner)) => outer != inner,
                        _ => false,
                    }
                })
                .collect();
            if !mismatched.is_empty() {
                return Err(early_error(ErrorKind::InvalidRequestObject).with_description(
                    format!(
                        "mismatch query parameter and request object: {}",
                        mismatched.join(", ")
                    ),
                ));
            }

            for field in MERGE_FIELDS {
                if raw.get(field).is_none() {
                    if let Some(value) = inner.get(field).and_then(value_as_param) {
                        raw.set(field, value);
                    }
                }
            }
        }

        let redirect_raw = raw.get("redirect_uri").ok_or_else(|| {
            ErrorMessage::page(ErrorKind::InvalidRequest, "redirect_uri is required")
        })?;
        let redirect_uri = Url::parse(redirect_raw).map_err(|_| {
            ErrorMessage::page(
                ErrorKind::InvalidRequest,
                "redirect_uri must be an absolute URL",
            )
        })?;
        if !ClientRegistry::check_redirect_uri(client, &redirect_uri) {
            return Err(ErrorMessage::page(
                ErrorKind::InvalidRequest,
                "redirect_uri is not registered for this client",
            ));
        }

        let state = raw.get("state").map(str::to_string);
        let raw_response_type = raw.get("response_type").map(str::to_string);
        let fragment = raw_response_type
            .as_deref()
            .is_some_and(|s| s.trim() != "code");
        let redirect_error = |kind: ErrorKind| {
            ErrorMessage::redirect(redirect_uri.clone(), fragment, state.clone(), kind)
        };

        let Some(raw_response_type) = raw_response_type else {
            return Err(redirect_error(ErrorKind::UnsupportedResponseType)
                .with_description("response_type is required"));
        };
        let response_type = ResponseTypeSet::parse(&raw_response_type).map_err(|unknown| {
            redirect_error(ErrorKind::UnsupportedResponseType)
                .with_description(format!("response_type \"{unknown}\" is not supported"))
        })?;
        if response_type.is_empty() {
            return Err(redirect_error(ErrorKind::UnsupportedResponseType)
                .with_description("response_type is required"));
        }
        if response_type.use_fragment() && !client.allow_implicit {
            return Err(redirect_error(ErrorKind::UnsupportedResponseType)
                .with_description("implicit/hybrid flow is disallowed"));
        }

        let prompt = PromptSet::parse(raw.get("prompt").unwrap_or(""));
        if prompt.has_conflict() {
            return Err(redirect_error(ErrorKind::InvalidRequest).with_description(
                "prompt=none can't use same time with login, select_account, or consent",
            ));
        }

        let nonce = raw.get("nonce").map(str::to_string);
        if response_type.use_fragment() && nonce.is_none() {
            return Err(redirect_error(ErrorKind::InvalidRequest)
                .with_description("nonce is required in the implicit/hybrid flow of OpenID Connect"));
        }

        let max_age = match raw.get("max_age") {
            None => None,
            Some(value) => Some(value.parse::<u64>().map_err(|_| {
                redirect_error(ErrorKind::InvalidRequest)
                    .with_description("max_age must be a non-negative integer")
            })?),
        };

        let requested: BTreeSet<String> = raw
            .get("scope")
            .unwrap_or("")
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let scope = ClientRegistry::normalize_scopes(client, &requested)
            .map_err(|e| redirect_error(ErrorKind::InvalidScope).with_description(e.to_string()))?;

        Ok(AuthRequest {
            client_id,
            redirect_uri,
            response_type,
            scope,
            state,
            nonce,
            max_age,
            prompt,
            login_hint: raw.get("login_hint").map(str::to_string),
        })
    }
}

/// Decodes and verifies a request object.
///
/// Request objects are HS256 JWTs keyed by the client secret, and must
/// carry `iss` = client_id and `aud` = issuer. Public clients cannot use
/// them. Any failure collapses into the one canonical error.
fn decode_request_object(
    token: &str,
    client: &Client,
    issuer: &str,
) -> Result<serde_json::Map<String, serde_json::Value>, ()> {
    let secret = client.client_secret.as_deref().ok_or(())?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = std::collections::HashSet::new();

    let data = decode::<serde_json::Map<String, serde_json::Value>>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| ())?;
    let claims = data.claims;

    let iss = claims.get("iss").and_then(serde_json::Value::as_str);
    let aud = claims.get("aud").and_then(serde_json::Value::as_str);
    if iss != Some(client.client_id.as_str()) || aud != Some(issuer) {
        return Err(());
    }

    Ok(claims)
}

/// Renders a request-object value the way it would appear as a query
/// parameter, so outer/inner comparison is type-insensitive
/// (`max_age=123` matches a JSON number 123).
fn value_as_param(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
