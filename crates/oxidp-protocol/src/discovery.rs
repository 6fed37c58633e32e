//! OpenID Connect Discovery 1.0 and JWK set publication.

use std::collections::BTreeSet;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, ErrorMessage};
use crate::state::SharedState;

/// The provider metadata document served at
/// `/.well-known/openid-configuration`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Issuer URL.
    pub issuer: String,
    /// Authorization endpoint URL.
    pub authorization_endpoint: String,
    /// Token endpoint URL.
    pub token_endpoint: String,
    /// Userinfo endpoint URL.
    pub userinfo_endpoint: String,
    /// JWK set URL.
    pub jwks_uri: String,
    /// Supported scopes.
    pub scopes_supported: Vec<String>,
    /// Supported response types.
    pub response_types_supported: Vec<String>,
    /// Supported response modes.
    pub response_modes_supported: Vec<String>,
    /// Supported grant types.
    pub grant_types_supported: Vec<String>,
    /// Supported subject types.
    pub subject_types_supported: Vec<String>,
    /// ID token signing algorithms.
    pub id_token_signing_alg_values_supported: Vec<String>,
    /// Token endpoint authentication methods.
    pub token_endpoint_auth_methods_supported: Vec<String>,
    /// Supported claims.
    pub claims_supported: Vec<String>,
    /// Supported prompt values.
    pub prompt_values_supported: Vec<String>,
    /// Whether the `request` parameter is supported.
    pub request_parameter_supported: bool,
    /// Whether the `request_uri` parameter is supported.
    pub request_uri_parameter_supported: bool,
}

/// Builds the metadata document from the configuration.
#[must_use]
pub fn metadata(state: &SharedState) -> ProviderMetadata {
    let config = &state.config;

    let mut scopes: BTreeSet<String> = config.scopes.keys().cloned().collect();
    scopes.insert("openid".to_string());
    scopes.insert("offline_access".to_string());

    let mut claims: BTreeSet<String> = config
        .scopes
        .values()
        .flatten()
        .map(|m| m.claim.clone())
        .collect();
    claims.insert("sub".to_string());

    ProviderMetadata {
        issuer: state.issuer().to_string(),
        authorization_endpoint: config.endpoint_url(&config.endpoints.authz),
        token_endpoint: config.endpoint_url(&config.endpoints.token),
        userinfo_endpoint: config.endpoint_url(&config.endpoints.userinfo),
        jwks_uri: config.endpoint_url(&config.endpoints.jwks),
        scopes_supported: scopes.into_iter().collect(),
        response_types_supported: [
            "code",
            "token",
            "id_token",
            "code token",
            "code id_token",
            "token id_token",
            "code token id_token",
        ]
        .into_iter()
        .map(str::to_string)
        .collect(),
        response_modes_supported: vec!["query".to_string(), "fragment".to_string()],
        grant_types_supported: [
            "authorization_code",
            "refresh_token",
            "password",
            "client_credentials",
        ]
        .into_iter()
        .map(str::to_string)
        .collect(),
        subject_types_supported: vec!["public".to_string()],
        id_token_signing_alg_values_supported: vec!["RS256".to_string()],
        token_endpoint_auth_methods_supported: vec![
            "client_secret_basic".to_string(),
            "client_secret_post".to_string(),
        ],
        claims_supported: claims.into_iter().collect(),
        prompt_values_supported: ["none", "login", "consent", "select_account"]
            .into_iter()
            .map(str::to_string)
            .collect(),
        request_parameter_supported: true,
        request_uri_parameter_supported: false,
    }
}

/// GET `/.well-known/openid-configuration`.
pub async fn discovery(State(state): State<SharedState>) -> Response {
    Json(metadata(&state)).into_response()
}

/// GET handler for the JWK set endpoint.
pub async fn jwks(State(state): State<SharedState>) -> Response {
    match state.tokens.jwk_set(&state.issuer_hostname()) {
        Ok(set) => Json(set).into_response(),
        Err(error) => {
            tracing::error!(%error, "failed to build the JWK set");
            ErrorMessage::json(ErrorKind::ServerError, "failed to build the JWK set")
                .into_json_response()
        }
    }
}
