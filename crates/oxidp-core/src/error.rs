//! Configuration and startup error types.
//!
//! These errors are fatal: they abort startup with a non-zero exit code.
//! Protocol-level errors live in `oxidp-protocol`.

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file: {0}")]
    Read(#[from] std::io::Error),

    /// The configuration file is not valid YAML.
    #[error("failed to parse configuration file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The issuer URL is missing or not an absolute http(s) URL.
    #[error("issuer must be an absolute http or https URL: {0}")]
    InvalidIssuer(String),

    /// The listen address could not be parsed.
    #[error("invalid listen address: {0}")]
    InvalidListen(String),

    /// `tls_cert` and `tls_key` must be set together.
    #[error("tls_cert and tls_key must be set together")]
    TlsPairing,

    /// TLS is configured but the issuer is not an https URL.
    #[error("issuer must use https when TLS is configured")]
    TlsIssuerScheme,

    /// A client record is invalid.
    #[error("invalid client \"{client_id}\": {reason}")]
    InvalidClient {
        /// The offending client id.
        client_id: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A TTL value is out of range.
    #[error("invalid ttl.{field}: {reason}")]
    InvalidTtl {
        /// The ttl field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The LDAP section is missing or incomplete.
    #[error("invalid ldap configuration: {0}")]
    InvalidLdap(String),

    /// The signing key file could not be used.
    #[error("invalid sign_key: {0}")]
    InvalidSignKey(String),
}
