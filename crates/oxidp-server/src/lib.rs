//! Server bootstrap: CLI surface, configuration assembly, state wiring.
//!
//! `main` stays thin; everything testable lives here.

#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use url::Url;

use oxidp_core::{Config, ConfigOverlay};
use oxidp_ldap::{Authenticator, LdapAuthenticator};
use oxidp_protocol::state::issuer_string;
use oxidp_protocol::{ProviderState, SharedState};
use oxidp_token::{SigningKey, TokenManager};

/// The oxidp OpenID Connect provider.
#[derive(Debug, Parser)]
#[command(name = "oxidp", version, about = "OpenID Connect provider for LDAP directories")]
pub struct Cli {
    /// Load options from a YAML file.
    #[arg(long, env = "OXIDP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Issuer URL.
    #[arg(long, env = "OXIDP_ISSUER")]
    pub issuer: Option<Url>,

    /// Listen address and port. Defaults to the issuer's port.
    #[arg(long, env = "OXIDP_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// RSA private key (PEM) for signing tokens. Generated when omitted.
    #[arg(long, env = "OXIDP_SIGN_KEY")]
    pub sign_key: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, env = "OXIDP_VERBOSE")]
    pub verbose: bool,
}

/// Builds the effective configuration: defaults, then the YAML file,
/// then CLI flags. Set fields override; zero values never do.
pub fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::default();

    if let Some(path) = &cli.config {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let overlay = Config::parse_overlay(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.apply(overlay);
    }

    config.apply(ConfigOverlay {
        issuer: cli.issuer.clone(),
        listen: cli.listen,
        sign_key: cli.sign_key.clone(),
        ..ConfigOverlay::default()
    });

    config.validate()?;
    Ok(config)
}

/// Loads the signing key named in the configuration, or generates an
/// ephemeral one.
pub fn load_signing_key(config: &Config) -> anyhow::Result<SigningKey> {
    match &config.sign_key {
        Some(path) => {
            let pem = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(SigningKey::from_pem(&pem)?)
        }
        None => {
            tracing::info!("no sign_key configured, generating an ephemeral RSA key");
            Ok(SigningKey::generate()?)
        }
    }
}

/// Wires configuration, key, and authenticator into the shared state.
#[must_use]
pub fn build_state(
    config: Config,
    key: SigningKey,
    authenticator: Arc<dyn Authenticator>,
) -> SharedState {
    let issuer = issuer_string(&config.issuer);
    let tokens = TokenManager::new(issuer, key);
    Arc::new(ProviderState::new(config, tokens, authenticator))
}

/// Builds the production LDAP authenticator and checks the directory is
/// reachable. An unreachable directory aborts startup.
pub async fn connect_directory(config: &Config) -> anyhow::Result<Arc<dyn Authenticator>> {
    let ldap = LdapAuthenticator::new(&config.ldap, &config.scopes)?;
    ldap.probe()
        .await
        .context("LDAP directory is unreachable")?;
    Ok(Arc::new(ldap))
}
