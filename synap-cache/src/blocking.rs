//! Blocking forms of the cache operations
//!
//! A thin wrapper owning a current-thread Tokio runtime, for callers
//! without an async context. Every call blocks the calling thread for
//! the duration of the round trip(s); the async engine underneath is
//! unchanged.

use tokio::runtime::{Builder, Runtime};

use crate::cache::CacheConfig;
use crate::client::SynapStore;
use crate::error::{CacheError, Result};
use crate::expiration::CacheEntryOptions;
use crate::types::CacheOutcome;

/// Blocking cache client
///
/// # Example
/// ```no_run
/// use synap_cache::blocking::SynapCache;
/// use synap_cache::{CacheConfig, CacheEntryOptions};
/// use std::time::Duration;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let cache = SynapCache::connect(CacheConfig::new("http://localhost:15500"))?;
///
/// let options = CacheEntryOptions::new().with_sliding_expiration(Duration::from_secs(60));
/// cache.set("user:1", b"profile-bytes", &options, false)?;
/// let outcome = cache.get("user:1");
/// # Ok(())
/// # }
/// ```
pub struct SynapCache {
    inner: crate::cache::SynapCache<SynapStore>,
    runtime: Runtime,
}

impl SynapCache {
    /// Connect to a store; see [`SynapCache::connect`](crate::SynapCache::connect)
    pub fn connect(config: CacheConfig) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(CacheError::Runtime)?;
        let inner = runtime.block_on(crate::cache::SynapCache::connect(config))?;
        Ok(Self { inner, runtime })
    }

    /// Blocking form of [`SynapCache::set`](crate::SynapCache::set)
    pub fn set(
        &self,
        key: &str,
        value: impl AsRef<[u8]>,
        options: &CacheEntryOptions,
        error_if_exists: bool,
    ) -> Result<CacheOutcome> {
        self.runtime
            .block_on(self.inner.set(key, value, options, error_if_exists))
    }

    /// Blocking form of [`SynapCache::get`](crate::SynapCache::get)
    pub fn get(&self, key: &str) -> CacheOutcome {
        self.runtime.block_on(self.inner.get(key))
    }

    /// Blocking form of [`SynapCache::refresh`](crate::SynapCache::refresh)
    pub fn refresh(&self, key: &str, error_if_missing: bool) -> CacheOutcome {
        self.runtime
            .block_on(self.inner.refresh(key, error_if_missing))
    }

    /// Blocking form of [`SynapCache::remove`](crate::SynapCache::remove)
    pub fn remove(&self, key: &str, error_if_missing: bool) -> CacheOutcome {
        self.runtime
            .block_on(self.inner.remove(key, error_if_missing))
    }
}
