//! # oxidp-protocol
//!
//! The OIDC protocol engine: request normalisation, the authorization
//! endpoint state machine, the token and userinfo endpoints, discovery,
//! and the SSO cookie.
//!
//! Everything here is transport-thin: axum handlers delegate to plain
//! functions over a shared [`state::ProviderState`], so the whole engine
//! can be driven in-process by the tests.

#![forbid(unsafe_code)]

pub mod authz;
pub mod discovery;
pub mod error;
pub mod pages;
pub mod request;
pub mod router;
pub mod session;
pub mod state;
pub mod token_endpoint;
pub mod userinfo;

pub use error::{ErrorKind, ErrorMessage};
pub use request::{AuthRequest, PromptSet, RawAuthzRequest, ResponseTypeSet};
pub use router::build_router;
pub use state::{ProviderState, SharedState};
