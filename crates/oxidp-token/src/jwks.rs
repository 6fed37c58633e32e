//! JSON Web Key publication.
//!
//! The JWK set contains the single active RSA public key, plus an `x5c`
//! chain holding a freshly minted self-signed certificate. The certificate
//! exists purely so introspection UIs have something to display; relying
//! parties verify against `n`/`e`.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{TokenError, TokenResult};
use crate::keys::SigningKey;

/// A single JSON Web Key (RFC 7517), RSA-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key id.
    pub kid: String,
    /// Public key use; always `sig`.
    #[serde(rename = "use")]
    pub key_use: String,
    /// JWA algorithm; always `RS256`.
    pub alg: String,
    /// Key type; always `RSA`.
    pub kty: String,
    /// Public exponent, base64url.
    pub e: String,
    /// Public modulus, base64url.
    pub n: String,
    /// Certificate chain: one self-signed certificate, standard base64 DER.
    pub x5c: Vec<String>,
}

/// A JWK set document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    /// The published keys.
    pub keys: Vec<JsonWebKey>,
}

impl JsonWebKeySet {
    /// Builds the set for the active signing key.
    ///
    /// `hostname` ends up as the certificate's common name.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Key`] when certificate minting fails.
    pub fn for_key(key: &SigningKey, hostname: &str) -> TokenResult<Self> {
        let cert = make_cert(key, hostname)?;

        Ok(Self {
            keys: vec![JsonWebKey {
                kid: key.kid().to_string(),
                key_use: "sig".to_string(),
                alg: "RS256".to_string(),
                kty: "RSA".to_string(),
                e: URL_SAFE_NO_PAD.encode(key.exponent_bytes()),
                n: URL_SAFE_NO_PAD.encode(key.modulus_bytes()),
                x5c: vec![cert],
            }],
        })
    }
}

/// Mints a throwaway self-signed certificate for the signing key.
///
/// Common name is the issuer hostname; validity is one hour from now.
fn make_cert(key: &SigningKey, hostname: &str) -> TokenResult<String> {
    let key_pair = rcgen::KeyPair::from_der(key.pkcs8_der())
        .map_err(|e| TokenError::Key(format!("certificate key: {e}")))?;

    let mut dn = rcgen::DistinguishedName::new();
    dn.push(rcgen::DnType::CommonName, hostname);

    let mut params = rcgen::CertificateParams::default();
    params.alg = &rcgen::PKCS_RSA_SHA256;
    params.key_pair = Some(key_pair);
    params.distinguished_name = dn;
    params.not_before = time::OffsetDateTime::now_utc();
    params.not_after = params.not_before + time::Duration::hours(1);

    let cert = rcgen::Certificate::from_params(params)
        .map_err(|e| TokenError::Key(format!("certificate build: {e}")))?;
    let der = cert
        .serialize_der()
        .map_err(|e| TokenError::Key(format!("certificate encode: {e}")))?;

    Ok(STANDARD.encode(der))
}
