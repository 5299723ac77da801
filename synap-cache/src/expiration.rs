//! Expiration intent and the computed expiration plan

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::CacheError;

/// Wire sentinel for "no value" in expiration arguments and hash fields
pub const NOT_PRESENT: i64 = -1;

/// Source of the current instant, injectable for deterministic tests
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A fixed instant, for tests
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub(crate) fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

/// Expiration intent supplied with a Set call. All fields are optional.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use synap_cache::CacheEntryOptions;
///
/// let options = CacheEntryOptions::new()
///     .with_sliding_expiration(Duration::from_secs(60))
///     .with_absolute_expiration_relative_to_now(Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CacheEntryOptions {
    /// Fixed instant after which the entry is invalid
    pub absolute_expiration: Option<DateTime<Utc>>,
    /// Absolute deadline expressed relative to the write; takes precedence
    /// over `absolute_expiration` when both are set
    pub absolute_expiration_relative_to_now: Option<Duration>,
    /// Window re-applied on every qualifying read or refresh
    pub sliding_expiration: Option<Duration>,
}

impl CacheEntryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a fixed absolute expiration instant
    pub fn with_absolute_expiration(mut self, at: DateTime<Utc>) -> Self {
        self.absolute_expiration = Some(at);
        self
    }

    /// Set the absolute expiration as an offset from the write
    pub fn with_absolute_expiration_relative_to_now(mut self, offset: Duration) -> Self {
        self.absolute_expiration_relative_to_now = Some(offset);
        self
    }

    /// Set the sliding expiration window
    pub fn with_sliding_expiration(mut self, window: Duration) -> Self {
        self.sliding_expiration = Some(window);
        self
    }
}

/// Concrete expiration values for one entry, immutable once computed.
///
/// `ttl_seconds` is what actually lands on the store's per-key timeout;
/// it is never recomputed implicitly. `sliding_seconds` mirrors the raw
/// sliding window so later refreshes can rebuild the TTL from the stored
/// markers without the caller re-supplying options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationPlan {
    pub absolute_expiration_unix_seconds: Option<i64>,
    pub sliding_seconds: Option<i64>,
    pub ttl_seconds: Option<i64>,
}

impl ExpirationPlan {
    /// Resolve the intent against a creation instant.
    ///
    /// The relative offset wins over an explicitly supplied absolute
    /// instant when both are given. Fails with
    /// [`CacheError::InvalidExpiration`] if the resolved deadline is not
    /// strictly after `creation_time`.
    pub fn compute(
        creation_time: DateTime<Utc>,
        options: &CacheEntryOptions,
    ) -> Result<Self, CacheError> {
        let absolute = match (
            options.absolute_expiration_relative_to_now,
            options.absolute_expiration,
        ) {
            (Some(offset), _) => {
                Some(creation_time + TimeDelta::seconds(offset.as_secs() as i64))
            }
            (None, Some(at)) => Some(at),
            (None, None) => None,
        };

        if let Some(at) = absolute {
            if at <= creation_time {
                return Err(CacheError::InvalidExpiration {
                    expires_at: at,
                    now: creation_time,
                });
            }
        }

        let sliding_seconds = options
            .sliding_expiration
            .map(|window| window.as_secs() as i64);
        let absolute_offset_seconds = absolute.map(|at| (at - creation_time).num_seconds());

        let ttl_seconds = match (absolute_offset_seconds, sliding_seconds) {
            (Some(absolute), Some(sliding)) => Some(absolute.min(sliding)),
            (Some(absolute), None) => Some(absolute),
            (None, Some(sliding)) => Some(sliding),
            (None, None) => None,
        };

        Ok(Self {
            absolute_expiration_unix_seconds: absolute.map(|at| at.timestamp()),
            sliding_seconds,
            ttl_seconds,
        })
    }

    pub fn absolute_or_sentinel(&self) -> i64 {
        self.absolute_expiration_unix_seconds.unwrap_or(NOT_PRESENT)
    }

    pub fn sliding_or_sentinel(&self) -> i64 {
        self.sliding_seconds.unwrap_or(NOT_PRESENT)
    }

    pub fn ttl_or_sentinel(&self) -> i64 {
        self.ttl_seconds.unwrap_or(NOT_PRESENT)
    }
}
