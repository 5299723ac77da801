//! # Synap Cache
//!
//! Distributed cache client for Synap-style scriptable key/value stores.
//!
//! ## Features
//!
//! - 🔒 **Atomic operations**: exists-check + write + TTL in one server-side script execution
//! - ⏳ **Sliding & absolute expiration**: TTL re-applied on qualifying reads, bounded by a deadline
//! - 📜 **Digest-first scripts**: EVALSHA-style execution with a single body fallback per node
//! - 🔄 **Async & blocking**: Tokio-native API plus a blocking wrapper
//! - 🛡️ **Typed outcomes**: callers branch on results, not exceptions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use synap_cache::{CacheConfig, CacheEntryOptions, CacheOutcome, SynapCache};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = SynapCache::connect(CacheConfig::new("http://localhost:15500")).await?;
//!
//!     let options = CacheEntryOptions::new()
//!         .with_sliding_expiration(Duration::from_secs(60))
//!         .with_absolute_expiration_relative_to_now(Duration::from_secs(3600));
//!
//!     cache.set("user:1", b"profile-bytes", &options, false).await?;
//!
//!     match cache.get("user:1").await {
//!         CacheOutcome::Hit(payload) => println!("{} bytes", payload.len()),
//!         CacheOutcome::NotFound => println!("expired"),
//!         other => eprintln!("unexpected: {other:?}"),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod blocking;
pub mod cache;
pub mod client;
pub mod error;
pub mod executor;
pub mod expiration;
pub mod scripts;
pub mod store;
pub mod types;

pub use cache::{CacheConfig, DEFAULT_KEY_PREFIX, SynapCache};
pub use client::{StoreConfig, SynapStore};
pub use error::{CacheError, Result, StoreError};
pub use executor::ScriptExecutor;
pub use expiration::{
    CacheEntryOptions, Clock, ExpirationPlan, FixedClock, NOT_PRESENT, SystemClock,
};
pub use scripts::{HashCommandGeneration, ScriptDescriptor, ScriptLibrary};
pub use store::ScriptableStore;
pub use types::{CacheOutcome, Reply, ScriptArg, TransportFailure, UnexpectedReply};
