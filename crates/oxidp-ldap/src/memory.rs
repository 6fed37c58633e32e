//! In-memory authenticator for tests and demos.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::{AuthError, AuthResult, Authenticator, Subject};

/// An authenticator backed by a static user table.
///
/// Plays the role of the directory wherever spinning one up would be
/// absurd: unit tests, the end-to-end suite, local demos.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthenticator {
    users: HashMap<String, (String, Subject)>,
}

impl StaticAuthenticator {
    /// Creates an empty user table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user.
    #[must_use]
    pub fn with_user(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        subject: Subject,
    ) -> Self {
        self.users
            .insert(username.into(), (password.into(), subject));
        self
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, username: &str, password: &str) -> AuthResult<Subject> {
        match self.users.get(username) {
            Some((stored, subject)) if stored == password => Ok(subject.clone()),
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    async fn probe(&self) -> AuthResult<()> {
        Ok(())
    }
}
