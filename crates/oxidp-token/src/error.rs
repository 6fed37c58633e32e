//! Token error types.

use thiserror::Error;

use crate::claims::TokenKind;

/// Result type for token operations.
pub type TokenResult<T> = std::result::Result<T, TokenError>;

/// Errors from minting, parsing, or validating signed artifacts.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token's `exp` is in the past.
    #[error("token is expired")]
    Expired,

    /// The token could not be decoded at all.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The signature does not verify against the current key.
    #[error("invalid token signature")]
    InvalidSignature,

    /// The token is of a different kind than expected.
    #[error("unexpected token type: expected {expected}, found {found:?}")]
    WrongType {
        /// The kind the caller asked for.
        expected: TokenKind,
        /// The `typ` the token actually carried.
        found: String,
    },

    /// The `iss` claim does not match this issuer.
    #[error("token was issued by another issuer")]
    WrongIssuer,

    /// The `iat` claim lies beyond the accepted clock skew.
    #[error("token was issued in the future")]
    IssuedInFuture,

    /// The code was already redeemed.
    #[error("code is already used")]
    AlreadyUsed,

    /// Signing failed. Fatal to the request, not to the process.
    #[error("token signing failed: {0}")]
    Signing(String),

    /// The signing key could not be loaded or generated.
    #[error("signing key error: {0}")]
    Key(String),
}

impl TokenError {
    /// Whether the failure is the caller's fault rather than the server's.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Signing(_) | Self::Key(_))
    }
}
