//! End-to-end tests for the userinfo endpoint.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use common::{
    basic_auth, login, parse_location, post_form, provider, CLIENT_ID, CLIENT_SECRET, REDIRECT_URI,
};

async fn userinfo(router: &axum::Router, token: Option<&str>) -> common::TestResponse {
    let mut builder = Request::builder().method("GET").uri("/userinfo");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let response = router
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    common::TestResponse {
        status,
        headers,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    }
}

async fn obtain_access_token(router: &axum::Router, scope: &str) -> String {
    let (response, _) = login(
        router,
        CLIENT_ID,
        REDIRECT_URI,
        &[("response_type", "code"), ("scope", scope)],
    )
    .await;
    let (_, query, _) = parse_location(response.location());
    let code = query.get("code").unwrap().clone();

    let response = post_form(
        router,
        "/token",
        &[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", REDIRECT_URI),
        ],
        None,
        Some(&basic_auth(CLIENT_ID, CLIENT_SECRET)),
    )
    .await;
    response.json()["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn claims_follow_the_granted_scopes() {
    let router = provider();

    let token = obtain_access_token(&router, "openid email").await;
    let response = userinfo(&router, Some(&token)).await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);

    let body = response.json();
    assert_eq!(body["sub"], "macrat");
    assert_eq!(body["email"], "macrat@example.com");
    assert_eq!(body["email_verified"], true);
    // profile and groups were not granted
    assert!(body.get("name").is_none());
    assert!(body.get("groups").is_none());
}

#[tokio::test]
async fn full_scope_exposes_profile_and_groups() {
    let router = provider();

    let token = obtain_access_token(&router, "openid profile email groups").await;
    let body = userinfo(&router, Some(&token)).await.json();

    assert_eq!(body["sub"], "macrat");
    assert_eq!(body["name"], "SHIDA Yuuma");
    assert_eq!(body["preferred_username"], "macrat");
    assert_eq!(body["email_verified"], true);
    assert_eq!(body["groups"], serde_json::json!(["users", "admins"]));
}

#[tokio::test]
async fn invalid_bearer_tokens_are_403() {
    let router = provider();

    let response = userinfo(&router, None).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.json()["error"], "invalid_token");

    let response = userinfo(&router, Some("not-a-token")).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.json()["error"], "invalid_token");
}

#[tokio::test]
async fn non_access_tokens_are_rejected() {
    let router = provider();

    // an ID token must not pass as a bearer token
    let (response, _) = login(
        &router,
        CLIENT_ID,
        REDIRECT_URI,
        &[("response_type", "code"), ("scope", "openid")],
    )
    .await;
    let (_, query, _) = parse_location(response.location());
    let code = query.get("code").unwrap().clone();
    let body = post_form(
        &router,
        "/token",
        &[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", REDIRECT_URI),
        ],
        None,
        Some(&basic_auth(CLIENT_ID, CLIENT_SECRET)),
    )
    .await
    .json();
    let id_token = body["id_token"].as_str().unwrap();

    let response = userinfo(&router, Some(id_token)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}
