//! End-to-end tests for the authorization code flow: login form, SSO
//! cookie, silent re-authentication, and the consent prompt.

mod common;

use axum::http::StatusCode;

use common::{
    get, hidden_inputs, input_value, jwt_payload, login, parse_location, post_form, provider,
    CLIENT_ID, REDIRECT_URI,
};

fn authz_query(extra: &[(&str, &str)]) -> String {
    let mut fields = vec![
        ("client_id", CLIENT_ID),
        ("redirect_uri", REDIRECT_URI),
        ("response_type", "code"),
        ("scope", "openid profile email"),
    ];
    fields.extend_from_slice(extra);
    format!("/authz?{}", serde_urlencoded::to_string(fields).unwrap())
}

#[tokio::test]
async fn login_form_carries_a_session_token() {
    let router = provider();

    let page = get(&router, &authz_query(&[]), None).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(input_value(&page.body, "session").is_some());
    assert!(page.body.contains(r#"name="username""#));
    assert!(page.body.contains(r#"name="password""#));
}

#[tokio::test]
async fn posting_credentials_returns_a_code_and_the_sso_cookie() {
    let router = provider();

    let (response, cookie) = login(
        &router,
        CLIENT_ID,
        REDIRECT_URI,
        &[("response_type", "code"), ("scope", "openid")],
    )
    .await;

    let (base, query, fragment) = parse_location(response.location());
    assert_eq!(base, REDIRECT_URI);
    assert!(fragment.is_empty(), "code flow answers in the query");
    let code = query.get("code").expect("code in redirect");
    assert!(query.get("access_token").is_none());
    assert!(query.get("id_token").is_none());

    let claims = jwt_payload(code);
    assert_eq!(claims["typ"], "CODE");
    assert_eq!(claims["sub"], "macrat");
    assert_eq!(claims["aud"], CLIENT_ID);

    let sso = jwt_payload(&cookie);
    assert_eq!(sso["typ"], "SSO");
    assert_eq!(sso["sub"], "macrat");
}

#[tokio::test]
async fn sso_cookie_allows_silent_reauthentication() {
    let router = provider();
    let (_, cookie) = login(
        &router,
        CLIENT_ID,
        REDIRECT_URI,
        &[("response_type", "code"), ("scope", "openid")],
    )
    .await;

    let response = get(&router, &authz_query(&[]), Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::FOUND, "{}", response.body);

    let (_, query, _) = parse_location(response.location());
    let code = query.get("code").expect("code from silent re-auth");

    // the code inherits the session's auth_time, not a fresh one
    assert_eq!(
        jwt_payload(code)["auth_time"],
        jwt_payload(&cookie)["auth_time"]
    );

    // rolling renewal re-issues the cookie
    assert!(response.sso_cookie().is_some());
}

#[tokio::test]
async fn prompt_consent_shows_the_consent_page_without_credential_inputs() {
    let router = provider();
    let (_, cookie) = login(
        &router,
        CLIENT_ID,
        REDIRECT_URI,
        &[("response_type", "code"), ("scope", "openid")],
    )
    .await;

    let page = get(
        &router,
        &authz_query(&[("prompt", "consent")]),
        Some(&cookie),
    )
    .await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(!page.body.contains(r#"name="username""#));
    assert!(!page.body.contains(r#"name="password""#));

    // continue through the consent form
    let inputs = hidden_inputs(&page.body);
    let fields: Vec<(&str, &str)> = inputs
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let response = post_form(&router, "/authz", &fields, Some(&cookie), None).await;
    assert_eq!(response.status, StatusCode::FOUND, "{}", response.body);

    let (_, query, _) = parse_location(response.location());
    let code = query.get("code").expect("code after consent");
    assert_eq!(
        jwt_payload(code)["auth_time"],
        jwt_payload(&cookie)["auth_time"]
    );
}

#[tokio::test]
async fn a_new_client_needs_consent_even_with_a_session() {
    let router = provider();
    let (_, cookie) = login(
        &router,
        CLIENT_ID,
        REDIRECT_URI,
        &[("response_type", "code"), ("scope", "openid")],
    )
    .await;

    // same session, different client: consent page instead of silence
    let query = serde_urlencoded::to_string([
        ("client_id", common::IMPLICIT_CLIENT_ID),
        ("redirect_uri", common::IMPLICIT_REDIRECT_URI),
        ("response_type", "code"),
        ("scope", "openid"),
    ])
    .unwrap();
    let page = get(&router, &format!("/authz?{query}"), Some(&cookie)).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(!page.body.contains(r#"name="password""#));

    let inputs = hidden_inputs(&page.body);
    let fields: Vec<(&str, &str)> = inputs
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let response = post_form(&router, "/authz", &fields, Some(&cookie), None).await;
    assert_eq!(response.status, StatusCode::FOUND, "{}", response.body);

    // afterwards the first client still signs in silently
    let response = get(&router, &authz_query(&[]), response.sso_cookie().as_deref()).await;
    assert_eq!(response.status, StatusCode::FOUND);
}

#[tokio::test]
async fn prompt_none_without_a_session_is_login_required() {
    let router = provider();

    let response = get(&router, &authz_query(&[("prompt", "none")]), None).await;
    assert_eq!(response.status, StatusCode::FOUND);

    let (_, query, _) = parse_location(response.location());
    assert_eq!(query.get("error").map(String::as_str), Some("login_required"));
}

#[tokio::test]
async fn prompt_none_with_an_unconsented_client_is_consent_required() {
    let router = provider();
    let (_, cookie) = login(
        &router,
        CLIENT_ID,
        REDIRECT_URI,
        &[("response_type", "code"), ("scope", "openid")],
    )
    .await;

    let query = serde_urlencoded::to_string([
        ("client_id", common::IMPLICIT_CLIENT_ID),
        ("redirect_uri", common::IMPLICIT_REDIRECT_URI),
        ("response_type", "code"),
        ("scope", "openid"),
        ("prompt", "none"),
    ])
    .unwrap();
    let response = get(&router, &format!("/authz?{query}"), Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::FOUND);

    let (_, query, _) = parse_location(response.location());
    assert_eq!(
        query.get("error").map(String::as_str),
        Some("consent_required")
    );
}

#[tokio::test]
async fn max_age_zero_always_forces_a_fresh_login() {
    let router = provider();
    let (_, cookie) = login(
        &router,
        CLIENT_ID,
        REDIRECT_URI,
        &[("response_type", "code"), ("scope", "openid")],
    )
    .await;

    let page = get(&router, &authz_query(&[("max_age", "0")]), Some(&cookie)).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains(r#"name="password""#));

    // a generous max_age accepts the session
    let response = get(&router, &authz_query(&[("max_age", "3600")]), Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::FOUND);
}

#[tokio::test]
async fn post_without_a_session_token_is_forbidden() {
    let router = provider();

    for fields in [
        vec![
            ("client_id", CLIENT_ID),
            ("redirect_uri", REDIRECT_URI),
            ("response_type", "code"),
        ],
        vec![
            ("client_id", CLIENT_ID),
            ("redirect_uri", REDIRECT_URI),
            ("response_type", "code"),
            ("username", "macrat"),
            ("password", "foobar"),
        ],
    ] {
        let response = post_form(&router, "/authz", &fields, None, None).await;
        assert_eq!(response.status, StatusCode::FORBIDDEN);
    }
}

#[tokio::test]
async fn wrong_password_re_renders_the_login_form() {
    let router = provider();

    let page = get(&router, &authz_query(&[]), None).await;
    let session = input_value(&page.body, "session").unwrap();

    let response = post_form(
        &router,
        "/authz",
        &[
            ("client_id", CLIENT_ID),
            ("redirect_uri", REDIRECT_URI),
            ("response_type", "code"),
            ("scope", "openid"),
            ("session", &session),
            ("username", "macrat"),
            ("password", "wrong"),
        ],
        None,
        None,
    )
    .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(response.body.contains(r#"name="password""#));
    assert!(response.sso_cookie().is_none());
}

#[tokio::test]
async fn unknown_client_and_bad_redirect_render_the_error_page() {
    let router = provider();

    let response = get(
        &router,
        "/authz?client_id=another_client_id&redirect_uri=http%3A%2F%2Fsome-client.example.com%2Fcallback&response_type=code",
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.headers.get("location").is_none());

    let response = get(
        &router,
        "/authz?client_id=some_client_id&redirect_uri=%2Frelative%2Furl&response_type=code",
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn protocol_errors_redirect_with_the_canonical_description() {
    let router = provider();

    // missing response_type
    let query = serde_urlencoded::to_string([
        ("client_id", CLIENT_ID),
        ("redirect_uri", REDIRECT_URI),
    ])
    .unwrap();
    let response = get(&router, &format!("/authz?{query}"), None).await;
    assert_eq!(response.status, StatusCode::FOUND);
    let (_, query_params, _) = parse_location(response.location());
    assert_eq!(
        query_params.get("error").map(String::as_str),
        Some("unsupported_response_type")
    );
    assert_eq!(
        query_params.get("error_description").map(String::as_str),
        Some("response_type is required")
    );

    // hybrid flow for a client without the flag, reported in the fragment
    let query = serde_urlencoded::to_string([
        ("client_id", CLIENT_ID),
        ("redirect_uri", REDIRECT_URI),
        ("response_type", "code token"),
        ("scope", "openid"),
    ])
    .unwrap();
    let response = get(&router, &format!("/authz?{query}"), None).await;
    let (_, _, fragment) = parse_location(response.location());
    assert_eq!(
        fragment.get("error_description").map(String::as_str),
        Some("implicit/hybrid flow is disallowed")
    );
}
