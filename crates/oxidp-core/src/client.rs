//! Client records and the static client registry.
//!
//! Clients are relying parties registered in the configuration file. The
//! registry is immutable after startup: resolution, redirect-URI checking,
//! and scope normalisation never touch shared mutable state.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// A registered relying party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Unique client identifier (OAuth `client_id`).
    pub client_id: String,

    /// Client secret. Absent for public clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Registered redirect URIs. Matching is exact.
    #[serde(default)]
    pub redirect_uris: BTreeSet<String>,

    /// Scopes this client may request.
    #[serde(default = "default_allowed_scopes")]
    pub allowed_scopes: BTreeSet<String>,

    /// Whether implicit and hybrid flows are permitted.
    #[serde(default)]
    pub allow_implicit: bool,

    /// Whether the `client_credentials` grant is permitted.
    #[serde(default)]
    pub allow_client_credentials: bool,

    /// Whether the `password` grant is permitted.
    #[serde(default)]
    pub allow_password_grant: bool,
}

fn default_allowed_scopes() -> BTreeSet<String> {
    ["openid", "profile", "email", "groups", "offline_access"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

impl Client {
    /// Whether this client holds a secret (confidential client).
    #[must_use]
    pub fn is_confidential(&self) -> bool {
        self.client_secret.is_some()
    }
}

/// Error from scope normalisation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScopeError {
    /// `openid` was requested but the client is not allowed to use it.
    #[error("\"openid\" scope is not allowed for this client")]
    OpenidNotAllowed,
}

/// Static lookup of clients by `client_id`.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, Client>,
}

impl ClientRegistry {
    /// Builds a registry from configured client records.
    #[must_use]
    pub fn new(clients: impl IntoIterator<Item = Client>) -> Self {
        Self {
            clients: clients
                .into_iter()
                .map(|c| (c.client_id.clone(), c))
                .collect(),
        }
    }

    /// Resolves a `client_id` to its record.
    #[must_use]
    pub fn resolve(&self, client_id: &str) -> Option<&Client> {
        self.clients.get(client_id)
    }

    /// Number of registered clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Checks a redirect URI against the client's registered list.
    ///
    /// Matching is exact string equality after URL parsing, so scheme, host,
    /// port, path, and query all have to line up. Fragments never match
    /// because registered URIs with fragments are rejected by validation.
    #[must_use]
    pub fn check_redirect_uri(client: &Client, uri: &Url) -> bool {
        client
            .redirect_uris
            .iter()
            .any(|registered| Url::parse(registered).is_ok_and(|r| r == *uri))
    }

    /// Intersects the requested scopes with the client's allowed scopes.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::OpenidNotAllowed`] when `openid` was requested
    /// but is not in the client's allowed set; silently drops any other
    /// scope the client may not use.
    pub fn normalize_scopes(
        client: &Client,
        requested: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, ScopeError> {
        if requested.contains("openid") && !client.allowed_scopes.contains("openid") {
            return Err(ScopeError::OpenidNotAllowed);
        }

        Ok(requested
            .intersection(&client.allowed_scopes)
            .cloned()
            .collect())
    }
}
