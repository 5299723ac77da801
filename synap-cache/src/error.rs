//! Error types for the cache client

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors raised synchronously by the cache engine.
///
/// Expected domain outcomes (missing keys, write collisions, transport
/// failures mid-operation) are reported through
/// [`CacheOutcome`](crate::CacheOutcome) instead; only construction
/// problems and caller misuse surface here.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The resolved absolute expiration is not after the creation time
    #[error("absolute expiration {expires_at} is not after the creation time {now}")]
    InvalidExpiration {
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    /// Invalid store URL
    #[error("invalid store URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// The one-time hash-command capability probe failed
    #[error("capability probe failed: {0}")]
    CapabilityProbe(#[source] StoreError),

    /// The blocking wrapper could not start its runtime
    #[error("failed to start blocking runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Failures reported by the collaborator store.
///
/// [`StoreError::NoScript`] is the one variant the engine handles itself
/// (the body-fallback of the execution strategy); everything else is
/// wrapped into [`CacheOutcome::Transport`](crate::CacheOutcome) at the
/// engine boundary.
#[derive(Error, Debug)]
pub enum StoreError {
    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The contacted node has no cached script for this digest
    #[error("script {digest} is not cached on the contacted node")]
    NoScript { digest: String },

    /// Server returned an error
    #[error("server error: {0}")]
    Server(String),

    /// Reply did not match the wire contract
    #[error("invalid reply: {0}")]
    Decode(String),
}
