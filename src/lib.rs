//! Recon Proxy - proxy pool and scope filtering for reconnaissance
//!
//! Loads proxies from a local file or remote lists, prunes the dead ones with
//! concurrent liveness probes, and decides which IPs and FQDNs may be
//! targeted at all.

pub mod config;
pub mod context;
pub mod error;
pub mod health;
pub mod proxy;
pub mod scope;

#[cfg(test)]
mod test_support;

pub use config::Settings;
pub use context::Context;
pub use error::Error;
pub use health::{Target, WebServerValidator};
pub use proxy::*;
pub use scope::{Category, ScopeMatcher, ScopeRule};

/// Library result type
pub type Result<T> = std::result::Result<T, Error>;
