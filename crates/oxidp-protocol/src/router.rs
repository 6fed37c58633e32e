//! Router assembly.
//!
//! Explicit endpoint registration over the shared state; no global router
//! state. Endpoint paths come from the configuration.

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;

use crate::state::SharedState;
use crate::{authz, discovery, token_endpoint, userinfo};

/// Builds the provider's router from its configuration.
#[must_use]
pub fn build_router(state: SharedState) -> Router {
    let endpoints = state.config.endpoints.clone();

    Router::new()
        .route("/.well-known/openid-configuration", get(discovery::discovery))
        .route("/health", get(health))
        .route(
            &endpoints.authz,
            get(authz::authorize_get).post(authz::authorize_post),
        )
        .route(&endpoints.token, post(token_endpoint::token))
        .route(
            &endpoints.userinfo,
            get(userinfo::userinfo).post(userinfo::userinfo),
        )
        .route(&endpoints.jwks, get(discovery::jwks))
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}
