//! Protocol error model.
//!
//! A failure travels down one of three channels, decided by where it
//! happened:
//!
//! 1. before the redirect URI is trusted — an HTML error page (4xx)
//! 2. after — a 302 back to the client with the error in the query
//!    (pure code flow) or fragment (anything implicit/hybrid)
//! 3. at the token/userinfo endpoints — a JSON error object

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use url::Url;

use crate::pages;

/// A `302 Found` redirect. axum's `Redirect` helpers answer 303/307/308,
/// but OAuth error and success redirects are specified as 302.
#[must_use]
pub fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => {
            let mut response = StatusCode::FOUND.into_response();
            response.headers_mut().insert(header::LOCATION, value);
            response
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// OAuth / OIDC error codes used by this provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid request parameters.
    InvalidRequest,
    /// The request object failed to decode or validate.
    InvalidRequestObject,
    /// Unknown or disallowed response_type.
    UnsupportedResponseType,
    /// `request_uri` is not supported by this provider.
    RequestUriNotSupported,
    /// Requested scope cannot be granted.
    InvalidScope,
    /// Interaction needed but prompt=none forbade it: no session.
    LoginRequired,
    /// Interaction needed but prompt=none forbade it: no consent.
    ConsentRequired,
    /// Interaction needed but prompt=none forbade it.
    InteractionRequired,
    /// The resource owner denied the request.
    AccessDenied,
    /// Expired, used, or unknown grant.
    InvalidGrant,
    /// Client authentication failed.
    InvalidClient,
    /// Unknown grant type.
    UnsupportedGrantType,
    /// Invalid bearer token at userinfo.
    InvalidToken,
    /// Internal fault.
    ServerError,
}

impl ErrorKind {
    /// The wire error code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidRequestObject => "invalid_request_object",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::RequestUriNotSupported => "request_uri_not_supported",
            Self::InvalidScope => "invalid_scope",
            Self::LoginRequired => "login_required",
            Self::ConsentRequired => "consent_required",
            Self::InteractionRequired => "interaction_required",
            Self::AccessDenied => "access_denied",
            Self::InvalidGrant => "invalid_grant",
            Self::InvalidClient => "invalid_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidToken => "invalid_token",
            Self::ServerError => "server_error",
        }
    }
}

/// A protocol error with everything needed to deliver it.
#[derive(Debug, Clone)]
pub struct ErrorMessage {
    /// Where to redirect the user agent, when that place is trustworthy.
    pub redirect_uri: Option<Url>,
    /// Whether error parameters belong in the fragment rather than the
    /// query. True for any flow containing `token` or `id_token`.
    pub use_fragment: bool,
    /// `state` from the request, echoed back verbatim.
    pub state: Option<String>,
    /// The error code.
    pub kind: ErrorKind,
    /// Optional human-readable description.
    pub description: Option<String>,
}

/// Wire form of the error object.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
}

impl ErrorMessage {
    /// An error that happened before the redirect URI could be trusted.
    #[must_use]
    pub fn page(kind: ErrorKind, description: impl Into<String>) -> Self {
        Self {
            redirect_uri: None,
            use_fragment: false,
            state: None,
            kind,
            description: Some(description.into()),
        }
    }

    /// An error destined for the JSON channel (token / userinfo).
    #[must_use]
    pub fn json(kind: ErrorKind, description: impl Into<String>) -> Self {
        Self::page(kind, description)
    }

    /// An error that can safely be redirected back to the client.
    #[must_use]
    pub fn redirect(
        redirect_uri: Url,
        use_fragment: bool,
        state: Option<String>,
        kind: ErrorKind,
    ) -> Self {
        Self {
            redirect_uri: Some(redirect_uri),
            use_fragment,
            state,
            kind,
            description: None,
        }
    }

    /// Attaches a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Delivers the error through the authorization-endpoint channel:
    /// a redirect when possible, the HTML error page otherwise.
    #[must_use]
    pub fn into_authz_response(self) -> Response {
        let Some(mut uri) = self.redirect_uri else {
            return pages::error_page(
                StatusCode::BAD_REQUEST,
                self.kind.as_str(),
                self.description.as_deref().unwrap_or(""),
            );
        };

        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(state) = self.state.as_deref() {
            params.push(("state", state));
        }
        params.push(("error", self.kind.as_str()));
        if let Some(description) = self.description.as_deref() {
            params.push(("error_description", description));
        }
        let encoded = serde_urlencoded::to_string(&params).unwrap_or_default();

        if self.use_fragment {
            uri.set_fragment(Some(&encoded));
        } else {
            uri.set_query(Some(&encoded));
        }

        found(uri.as_str())
    }

    /// Delivers the error through the JSON channel (token / userinfo).
    #[must_use]
    pub fn into_json_response(self) -> Response {
        let body = ErrorBody {
            error: self.kind.as_str(),
            error_description: self.description.as_deref(),
            state: self.state.as_deref(),
        };

        match self.kind {
            ErrorKind::ServerError => {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
            ErrorKind::InvalidToken => (StatusCode::FORBIDDEN, Json(body)).into_response(),
            ErrorKind::InvalidClient => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Basic")],
                Json(body),
            )
                .into_response(),
            _ => (StatusCode::BAD_REQUEST, Json(body)).into_response(),
        }
    }
}
