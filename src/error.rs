//! Error types
//!
//! Configuration failures are fatal at startup. Store and rewrite failures
//! surface per request and are turned into HTTP responses by the router.

use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid address `{0}`: {1}")]
    Address(String, #[source] std::net::AddrParseError),

    #[error("config validation error: {0}")]
    Validation(String),
}

/// Failures raised by an asset store lookup
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error reading `{0}`: {1}")]
    Io(String, #[source] std::io::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("failed to read upstream body: {0}")]
    Body(#[source] hyper::Error),

    #[error("invalid upstream uri: {0}")]
    Uri(#[from] hyper::http::Error),
}

/// Failures raised while rewriting and delegating a request
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("rewritten path is invalid: {0}")]
    Path(#[from] hyper::http::uri::InvalidUri),

    #[error("rewritten uri is invalid: {0}")]
    Uri(#[from] hyper::http::uri::InvalidUriParts),

    #[error(transparent)]
    Store(#[from] StoreError),
}
