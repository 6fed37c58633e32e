//! RSA signing key material.
//!
//! The provider holds exactly one RS256 keypair for its lifetime. It is
//! loaded from a PEM file when `sign_key` is configured, otherwise a
//! 2048-bit key is generated at startup and lives only in memory.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::{TokenError, TokenResult};

/// Key size used for generated (ephemeral) keys.
const GENERATED_KEY_BITS: usize = 2048;

/// An RS256 signing keypair with its derived key id.
pub struct SigningKey {
    kid: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
    public: RsaPublicKey,
    pkcs8_der: Vec<u8>,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl SigningKey {
    /// Generates an ephemeral keypair.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Key`] when generation fails.
    pub fn generate() -> TokenResult<Self> {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), GENERATED_KEY_BITS)
            .map_err(|e| TokenError::Key(format!("failed to generate RSA key: {e}")))?;
        Self::from_private(private)
    }

    /// Loads a keypair from PEM text (PKCS#8 or PKCS#1).
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Key`] when the PEM is not a usable RSA key.
    pub fn from_pem(pem: &str) -> TokenResult<Self> {
        let private = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| TokenError::Key(format!("failed to read RSA private key: {e}")))?;
        Self::from_private(private)
    }

    fn from_private(private: RsaPrivateKey) -> TokenResult<Self> {
        let public = private.to_public_key();

        let private_pem = private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| TokenError::Key(e.to_string()))?;
        let public_pem = public
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| TokenError::Key(e.to_string()))?;
        let pkcs8_der = private
            .to_pkcs8_der()
            .map_err(|e| TokenError::Key(e.to_string()))?
            .as_bytes()
            .to_vec();

        let encoding = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| TokenError::Key(e.to_string()))?;
        let decoding = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| TokenError::Key(e.to_string()))?;

        let kid = key_id(&public.n().to_bytes_be());

        Ok(Self {
            kid,
            encoding,
            decoding,
            public,
            pkcs8_der,
        })
    }

    /// The key id, a deterministic hash over the public modulus.
    /// Rotating the key changes the id.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Key for signing.
    #[must_use]
    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }

    /// Key for verification.
    #[must_use]
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }

    /// The public half.
    #[must_use]
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    /// Public modulus, big endian.
    #[must_use]
    pub fn modulus_bytes(&self) -> Vec<u8> {
        self.public.n().to_bytes_be()
    }

    /// Public exponent, big endian.
    #[must_use]
    pub fn exponent_bytes(&self) -> Vec<u8> {
        self.public.e().to_bytes_be()
    }

    /// PKCS#8 DER of the private key, for certificate minting.
    #[must_use]
    pub fn pkcs8_der(&self) -> &[u8] {
        &self.pkcs8_der
    }
}

/// Derives a key id from the public modulus bytes.
fn key_id(modulus: &[u8]) -> String {
    let digest = Sha256::digest(modulus);
    URL_SAFE_NO_PAD.encode(&digest[..8])
}
