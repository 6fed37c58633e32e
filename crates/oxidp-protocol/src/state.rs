//! Shared state for the protocol endpoints.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use oxidp_core::{ClientRegistry, Config};
use oxidp_ldap::Authenticator;
use oxidp_token::TokenManager;

/// Everything a request handler needs, shared behind an [`Arc`].
///
/// The registry and configuration are immutable; the token manager owns
/// the only mutable state (the consumed-code set) and is safe to share.
pub struct ProviderState {
    /// Provider configuration.
    pub config: Config,
    /// Client registry built from the configuration.
    pub registry: ClientRegistry,
    /// Token manager.
    pub tokens: TokenManager,
    /// The identity source.
    pub authenticator: Arc<dyn Authenticator>,
}

/// Handler state alias.
pub type SharedState = Arc<ProviderState>;

impl ProviderState {
    /// Assembles the provider state.
    #[must_use]
    pub fn new(config: Config, tokens: TokenManager, authenticator: Arc<dyn Authenticator>) -> Self {
        let registry = ClientRegistry::new(config.clients.clone());
        Self {
            config,
            registry,
            tokens,
            authenticator,
        }
    }

    /// The canonical issuer string (no trailing slash).
    #[must_use]
    pub fn issuer(&self) -> &str {
        self.tokens.issuer()
    }

    /// Claim names admitted by a set of granted scopes, per the
    /// configured scope→claim mapping table.
    #[must_use]
    pub fn allowed_claim_names(&self, scopes: &BTreeSet<String>) -> BTreeSet<String> {
        scopes
            .iter()
            .filter_map(|scope| self.config.scopes.get(scope))
            .flatten()
            .map(|mapping| mapping.claim.clone())
            .collect()
    }

    /// Filters a subject's claims down to what the granted scopes admit.
    #[must_use]
    pub fn filter_claims(
        &self,
        scopes: &BTreeSet<String>,
        claims: &HashMap<String, serde_json::Value>,
    ) -> HashMap<String, serde_json::Value> {
        let allowed = self.allowed_claim_names(scopes);
        claims
            .iter()
            .filter(|(name, _)| allowed.contains(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// The issuer hostname, used as the x5c certificate common name.
    #[must_use]
    pub fn issuer_hostname(&self) -> String {
        self.config
            .issuer
            .host_str()
            .unwrap_or("localhost")
            .to_string()
    }
}

/// Canonicalizes an issuer URL to the string embedded in tokens:
/// the URL without its trailing slash.
#[must_use]
pub fn issuer_string(issuer: &url::Url) -> String {
    issuer.as_str().trim_end_matches('/').to_string()
}
