//! # oxidp-ldap
//!
//! The identity source behind the provider: a narrow capability that turns
//! `(username, password)` into an authenticated [`Subject`] with claims.
//!
//! The production implementation binds against an LDAP directory
//! ([`LdapAuthenticator`]); [`StaticAuthenticator`] serves tests and demos.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod ldap;
pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

pub use ldap::LdapAuthenticator;
pub use memory::StaticAuthenticator;

/// An authenticated user: a stable identifier plus mapped claims.
#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    /// Stable opaque identifier, embedded as `sub` in every token.
    pub id: String,
    /// Claims mapped from directory attributes (name, email, groups, …).
    pub claims: HashMap<String, serde_json::Value>,
}

impl Subject {
    /// Creates a subject with no claims.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            claims: HashMap::new(),
        }
    }

    /// Adds a claim.
    #[must_use]
    pub fn with_claim(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.claims.insert(name.into(), value);
        self
    }
}

/// Errors from the identity source.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The credentials did not check out. Deliberately carries no detail.
    #[error("authentication failed")]
    InvalidCredentials,

    /// The directory could not be reached. Retryable.
    #[error("directory connection failed: {0}")]
    Connection(String),

    /// The directory did not answer in time. Retryable.
    #[error("directory operation timed out")]
    Timeout,

    /// The directory answered with something unexpected.
    #[error("directory protocol error: {0}")]
    Protocol(String),

    /// The directory settings are unusable.
    #[error("directory configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    /// Whether a single retry with backoff is worth attempting.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout)
    }
}

/// Result type for identity source operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// The capability the protocol engine consumes: credentials in,
/// subject and claims out.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Verifies a username and password.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidCredentials`] for bad credentials or unknown
    /// users; transport errors when the directory is unreachable.
    async fn authenticate(&self, username: &str, password: &str) -> AuthResult<Subject>;

    /// Startup reachability check. A failure here aborts the process.
    ///
    /// # Errors
    ///
    /// Transport or configuration errors.
    async fn probe(&self) -> AuthResult<()>;
}
