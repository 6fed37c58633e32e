//! # oxidp-core
//!
//! Shared foundation for the oxidp identity provider:
//! - YAML configuration with a pure default value and field-wise override
//! - TTL duration strings (`10m`, `1h`, `14d`)
//! - Client records and the static client registry

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod client;
pub mod config;
pub mod duration;
pub mod error;

pub use client::{Client, ClientRegistry, ScopeError};
pub use config::{ClaimMapping, Config, ConfigOverlay, EndpointConfig, LdapConfig, TtlConfig};
pub use error::{ConfigError, ConfigResult};
