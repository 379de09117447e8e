//! Error taxonomy shared by every component

use thiserror::Error;

/// Errors raised while loading, validating or serving the proxy pool
#[derive(Debug, Error)]
pub enum Error {
    /// Fatal: the operator configuration cannot be used. Carries every
    /// problem found so they can be reported at once.
    #[error("invalid configuration: {}", .0.join("; "))]
    Configuration(Vec<String>),

    /// A single remote proxy list could not be fetched
    #[error("proxy source {url} failed: {reason}")]
    SourceFetch { url: String, reason: String },

    /// A single proxy failed its liveness probe
    #[error("probe through {proxy} failed: {reason}")]
    Probe { proxy: String, reason: String },

    /// A target was rejected by the scope matcher
    #[error("target {target} is out of scope")]
    OutOfScope { target: String },

    /// The target web server could not be reached
    #[error("web server {target} unreachable: {reason}")]
    WebServer { target: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Configuration error with a single problem
    pub fn config(problem: impl Into<String>) -> Self {
        Error::Configuration(vec![problem.into()])
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }
}
