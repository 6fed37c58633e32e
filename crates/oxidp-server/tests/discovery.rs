//! End-to-end tests for discovery and the JWK set.

mod common;

use axum::http::StatusCode;

use common::{get, provider};

#[tokio::test]
async fn discovery_document_describes_the_provider() {
    let router = provider();

    let response = get(&router, "/.well-known/openid-configuration", None).await;
    assert_eq!(response.status, StatusCode::OK);

    let body = response.json();
    assert_eq!(body["issuer"], "http://localhost:8000");
    assert_eq!(
        body["authorization_endpoint"],
        "http://localhost:8000/authz"
    );
    assert_eq!(body["token_endpoint"], "http://localhost:8000/token");
    assert_eq!(body["userinfo_endpoint"], "http://localhost:8000/userinfo");
    assert_eq!(body["jwks_uri"], "http://localhost:8000/certs");
    assert_eq!(
        body["id_token_signing_alg_values_supported"],
        serde_json::json!(["RS256"])
    );
    assert_eq!(body["request_parameter_supported"], true);
    assert_eq!(body["request_uri_parameter_supported"], false);

    let response_types = body["response_types_supported"].as_array().unwrap();
    assert!(response_types.contains(&serde_json::json!("code")));
    assert!(response_types.contains(&serde_json::json!("code token id_token")));

    let scopes = body["scopes_supported"].as_array().unwrap();
    for scope in ["openid", "profile", "email", "groups", "offline_access"] {
        assert!(scopes.contains(&serde_json::json!(scope)), "{scope}");
    }

    let claims = body["claims_supported"].as_array().unwrap();
    for claim in ["sub", "name", "preferred_username", "email", "email_verified", "groups"] {
        assert!(claims.contains(&serde_json::json!(claim)), "{claim}");
    }
}

#[tokio::test]
async fn jwk_set_publishes_one_rsa_signing_key() {
    let router = provider();

    let response = get(&router, "/certs", None).await;
    assert_eq!(response.status, StatusCode::OK);

    let body = response.json();
    let keys = body["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 1);

    let key = &keys[0];
    assert_eq!(key["kty"], "RSA");
    assert_eq!(key["alg"], "RS256");
    assert_eq!(key["use"], "sig");
    assert!(key["kid"].as_str().is_some());
    assert!(key["n"].as_str().is_some());
    assert!(key["e"].as_str().is_some());
    assert_eq!(key["x5c"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn health_endpoint_answers() {
    let router = provider();
    let response = get(&router, "/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
}
