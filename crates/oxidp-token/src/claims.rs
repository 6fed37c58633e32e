//! Claim types for every signed artifact.
//!
//! Each artifact kind has its own body struct; [`Signed`] wraps a body with
//! the envelope claims (`iss`, `iat`, `exp`, `typ`) that the manager fills
//! in at mint time.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kinds of artifact the token manager can mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Single-use authorization code.
    Code,
    /// Bearer access token.
    AccessToken,
    /// OpenID Connect ID token.
    IdToken,
    /// Refresh token.
    RefreshToken,
    /// SSO session cookie.
    Sso,
    /// Login-form session nonce.
    LoginSession,
}

impl TokenKind {
    /// The stable `typ` value embedded in tokens of this kind.
    #[must_use]
    pub const fn typ(self) -> &'static str {
        match self {
            Self::Code => "CODE",
            Self::AccessToken => "ACCESS_TOKEN",
            Self::IdToken => "ID_TOKEN",
            Self::RefreshToken => "REFRESH_TOKEN",
            Self::Sso => "SSO",
            Self::LoginSession => "LOGIN_SESSION",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.typ())
    }
}

/// Marker trait tying a claims body to its token kind.
pub trait ClaimsBody: Serialize + DeserializeOwned {
    /// The kind of token this body belongs to.
    const KIND: TokenKind;
}

/// Envelope around a claims body: the fields every artifact carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signed<T> {
    /// Issuer URL.
    pub iss: String,
    /// Issued-at (Unix seconds).
    pub iat: i64,
    /// Expiry (Unix seconds). Tokens are expired strictly when `now >= exp`.
    pub exp: i64,
    /// Stable type discriminator, see [`TokenKind::typ`].
    pub typ: String,
    /// Kind-specific claims.
    #[serde(flatten)]
    pub body: T,
}

impl<T> Signed<T> {
    /// Remaining lifetime in seconds relative to `now`, clamped to zero.
    #[must_use]
    pub fn expires_in(&self, now: i64) -> i64 {
        (self.exp - now).max(0)
    }
}

/// Authorization code claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeClaims {
    /// Authenticated subject.
    pub sub: String,
    /// Client the code was issued to.
    pub aud: String,
    /// Redirect URI the code is bound to.
    pub redirect_uri: String,
    /// Granted scopes, space separated.
    pub scope: String,
    /// Nonce from the authorization request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// When the subject authenticated.
    pub auth_time: i64,
    /// Scope-filtered user claims, carried through to the minted tokens.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub claims: HashMap<String, serde_json::Value>,
    /// Unique token id. RS256 signing is deterministic, so two codes with
    /// identical claims would be byte-identical without it.
    pub jti: String,
}

impl CodeClaims {
    /// Creates code claims for an authenticated subject.
    #[must_use]
    pub fn new(
        sub: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        scope: impl Into<String>,
        auth_time: i64,
    ) -> Self {
        Self {
            sub: sub.into(),
            aud: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scope: scope.into(),
            nonce: None,
            auth_time,
            claims: HashMap::new(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Sets the nonce.
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Attaches scope-filtered user claims.
    #[must_use]
    pub fn with_claims(mut self, claims: HashMap<String, serde_json::Value>) -> Self {
        self.claims = claims;
        self
    }
}

impl ClaimsBody for CodeClaims {
    const KIND: TokenKind = TokenKind::Code;
}

/// Access token claims.
///
/// User claims granted by scope are embedded at mint time so the userinfo
/// endpoint can serve them without going back to the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Authenticated subject.
    pub sub: String,
    /// Client the token was issued to.
    pub aud: String,
    /// Granted scopes, space separated.
    pub scope: String,
    /// When the subject authenticated.
    pub auth_time: i64,
    /// Scope-filtered user claims.
    #[serde(flatten)]
    pub claims: HashMap<String, serde_json::Value>,
}

impl AccessTokenClaims {
    /// Creates access token claims.
    #[must_use]
    pub fn new(
        sub: impl Into<String>,
        client_id: impl Into<String>,
        scope: impl Into<String>,
        auth_time: i64,
    ) -> Self {
        Self {
            sub: sub.into(),
            aud: client_id.into(),
            scope: scope.into(),
            auth_time,
            claims: HashMap::new(),
        }
    }

    /// Attaches scope-filtered user claims.
    #[must_use]
    pub fn with_claims(mut self, claims: HashMap<String, serde_json::Value>) -> Self {
        self.claims = claims;
        self
    }
}

impl ClaimsBody for AccessTokenClaims {
    const KIND: TokenKind = TokenKind::AccessToken;
}

/// ID token claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Authenticated subject.
    pub sub: String,
    /// Client the token was issued to.
    pub aud: String,
    /// Nonce from the authorization request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// When the subject authenticated.
    pub auth_time: i64,
    /// Left-half SHA-256 hash of the paired access token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_hash: Option<String>,
    /// Left-half SHA-256 hash of the paired authorization code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_hash: Option<String>,
    /// Scope-filtered user claims.
    #[serde(flatten)]
    pub claims: HashMap<String, serde_json::Value>,
}

impl IdTokenClaims {
    /// Creates ID token claims.
    #[must_use]
    pub fn new(sub: impl Into<String>, client_id: impl Into<String>, auth_time: i64) -> Self {
        Self {
            sub: sub.into(),
            aud: client_id.into(),
            nonce: None,
            auth_time,
            at_hash: None,
            c_hash: None,
            claims: HashMap::new(),
        }
    }

    /// Sets the nonce.
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Sets the access token hash.
    #[must_use]
    pub fn with_at_hash(mut self, at_hash: impl Into<String>) -> Self {
        self.at_hash = Some(at_hash.into());
        self
    }

    /// Sets the code hash.
    #[must_use]
    pub fn with_c_hash(mut self, c_hash: impl Into<String>) -> Self {
        self.c_hash = Some(c_hash.into());
        self
    }

    /// Attaches scope-filtered user claims.
    #[must_use]
    pub fn with_claims(mut self, claims: HashMap<String, serde_json::Value>) -> Self {
        self.claims = claims;
        self
    }
}

impl ClaimsBody for IdTokenClaims {
    const KIND: TokenKind = TokenKind::IdToken;
}

/// Refresh token claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    /// Authenticated subject.
    pub sub: String,
    /// Client the token was issued to.
    pub aud: String,
    /// Granted scopes, space separated.
    pub scope: String,
    /// Nonce preserved from the original authorization request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// When the subject authenticated.
    pub auth_time: i64,
    /// Scope-filtered user claims, re-embedded into refreshed tokens.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub claims: HashMap<String, serde_json::Value>,
    /// Unique token id.
    pub jti: String,
}

impl RefreshTokenClaims {
    /// Creates refresh token claims.
    #[must_use]
    pub fn new(
        sub: impl Into<String>,
        client_id: impl Into<String>,
        scope: impl Into<String>,
        auth_time: i64,
    ) -> Self {
        Self {
            sub: sub.into(),
            aud: client_id.into(),
            scope: scope.into(),
            nonce: None,
            auth_time,
            claims: HashMap::new(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Sets the nonce.
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Attaches scope-filtered user claims.
    #[must_use]
    pub fn with_claims(mut self, claims: HashMap<String, serde_json::Value>) -> Self {
        self.claims = claims;
        self
    }
}

impl ClaimsBody for RefreshTokenClaims {
    const KIND: TokenKind = TokenKind::RefreshToken;
}

/// SSO session claims, signed into the SSO cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SsoClaims {
    /// Authenticated subject.
    pub sub: String,
    /// When the subject authenticated.
    pub auth_time: i64,
    /// Clients the subject has authorized in this session.
    pub clients: BTreeSet<String>,
    /// User claims captured at login, the only moment the directory
    /// vouches for the user. Silent re-authentication reads them back.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub claims: HashMap<String, serde_json::Value>,
}

impl SsoClaims {
    /// Creates a fresh SSO session for a subject that just logged in
    /// through `client_id`.
    #[must_use]
    pub fn new(sub: impl Into<String>, auth_time: i64, client_id: impl Into<String>) -> Self {
        Self {
            sub: sub.into(),
            auth_time,
            clients: BTreeSet::from([client_id.into()]),
            claims: HashMap::new(),
        }
    }

    /// Attaches the user claims captured at login.
    #[must_use]
    pub fn with_claims(mut self, claims: HashMap<String, serde_json::Value>) -> Self {
        self.claims = claims;
        self
    }

    /// Whether the session already covers consent for a client.
    #[must_use]
    pub fn authorizes(&self, client_id: &str) -> bool {
        self.clients.contains(client_id)
    }

    /// Records consent for another client.
    pub fn authorize(&mut self, client_id: impl Into<String>) {
        self.clients.insert(client_id.into());
    }
}

impl ClaimsBody for SsoClaims {
    const KIND: TokenKind = TokenKind::Sso;
}

/// Login-session claims, embedded in the login and consent forms to defeat
/// login CSRF and stale-form submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginSessionClaims {
    /// Client the form was rendered for.
    pub client_id: String,
    /// Client IP the form was rendered to.
    pub ip: String,
    /// Unique token id.
    pub jti: String,
}

impl LoginSessionClaims {
    /// Creates login-session claims bound to a client and an IP.
    #[must_use]
    pub fn new(client_id: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ip: ip.into(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Verifies the binding against the submitting request.
    #[must_use]
    pub fn matches(&self, client_id: &str, ip: &str) -> bool {
        self.client_id == client_id && self.ip == ip
    }
}

impl ClaimsBody for LoginSessionClaims {
    const KIND: TokenKind = TokenKind::LoginSession;
}
