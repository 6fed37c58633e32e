//! Inline HTML for the login, consent, and error pages.
//!
//! The pages are deliberately minimal: deployments that want branding put
//! a reverse proxy or their own frontend ahead of the provider. Every
//! interpolated value goes through [`html_escape`].

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

/// Escapes text for safe interpolation into HTML.
#[must_use]
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Hidden `<input>` rows echoing the authorization request parameters.
fn hidden_fields(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| {
            format!(
                r#"<input type="hidden" name="{}" value="{}" />"#,
                html_escape(k),
                html_escape(v)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The login form.
///
/// `fields` carries the request parameters plus the signed `session`
/// token; the form posts everything back to the authorization endpoint.
#[must_use]
pub fn login_page(
    status: StatusCode,
    action: &str,
    client_id: &str,
    fields: &[(&str, &str)],
    failed: bool,
) -> Response {
    let notice = if failed {
        r#"<p class="error">Login failed. Check your username and password.</p>"#
    } else {
        ""
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8" /><title>Sign in</title></head>
<body>
<h1>Sign in</h1>
<p>Sign in to continue to <strong>{client}</strong>.</p>
{notice}
<form method="post" action="{action}">
{fields}
<label>Username <input type="text" name="username" autocomplete="username" autofocus /></label>
<label>Password <input type="password" name="password" autocomplete="current-password" /></label>
<button type="submit">Sign in</button>
</form>
</body>
</html>"#,
        client = html_escape(client_id),
        action = html_escape(action),
        fields = hidden_fields(fields),
    );

    (status, Html(html)).into_response()
}

/// The consent page. No credential inputs: the SSO cookie carries the
/// identity, the form only confirms the authorization.
#[must_use]
pub fn consent_page(action: &str, client_id: &str, scopes: &str, fields: &[(&str, &str)]) -> Response {
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8" /><title>Authorize</title></head>
<body>
<h1>Authorize {client}</h1>
<p><strong>{client}</strong> is asking for access: {scopes}.</p>
<form method="post" action="{action}">
{fields}
<button type="submit">Continue</button>
</form>
</body>
</html>"#,
        client = html_escape(client_id),
        scopes = html_escape(scopes),
        action = html_escape(action),
        fields = hidden_fields(fields),
    );

    (StatusCode::OK, Html(html)).into_response()
}

/// The error page used when no trustworthy redirect target exists.
#[must_use]
pub fn error_page(status: StatusCode, error: &str, description: &str) -> Response {
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8" /><title>Error</title></head>
<body>
<h1>Error</h1>
<p><strong>{}</strong></p>
<p>{}</p>
</body>
</html>"#,
        html_escape(error),
        html_escape(description),
    );

    (status, Html(html)).into_response()
}
