//! # oxidp-token
//!
//! Signed-artifact management for the oxidp identity provider.
//!
//! Every artifact the provider hands out — authorization codes, access/ID/
//! refresh tokens, the SSO cookie, and login-session nonces — is an RS256
//! JWT minted and verified here. The only server-side state is the
//! single-use set for authorization codes; everything else is stateless.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod claims;
pub mod code_store;
pub mod error;
pub mod hash;
pub mod jwks;
pub mod keys;
pub mod manager;

pub use claims::{
    AccessTokenClaims, CodeClaims, IdTokenClaims, LoginSessionClaims, RefreshTokenClaims, Signed,
    SsoClaims, TokenKind,
};
pub use code_store::CodeStore;
pub use error::{TokenError, TokenResult};
pub use jwks::{JsonWebKey, JsonWebKeySet};
pub use keys::SigningKey;
pub use manager::TokenManager;
