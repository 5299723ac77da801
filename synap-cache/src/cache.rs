//! Cache operation engine
//!
//! Orchestrates Set/Get/Refresh/Remove over the store boundary: computes
//! the expiration plan, picks the plain or scripted path, runs scripts
//! through the execution strategy and interprets every raw reply into a
//! typed [`CacheOutcome`]. The engine holds only immutable state after
//! construction and is safe for unbounded concurrent callers.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use crate::client::{StoreConfig, SynapStore};
use crate::error::{CacheError, StoreError};
use crate::executor::ScriptExecutor;
use crate::expiration::{CacheEntryOptions, Clock, ExpirationPlan, system_clock};
use crate::scripts::{
    ABSOLUTE_EXPIRATION_FIELD, DATA_FIELD, HashCommandGeneration, NO_EFFECT_SENTINEL,
    SLIDING_EXPIRATION_FIELD, SUCCESS_SENTINEL, ScriptLibrary,
};
use crate::store::ScriptableStore;
use crate::types::{CacheOutcome, Reply, ScriptArg, TransportFailure, UnexpectedReply};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Namespace prefix applied to every key unless overridden
pub const DEFAULT_KEY_PREFIX: &str = "cache:";

/// Cache client configuration
///
/// # Example
/// ```no_run
/// use synap_cache::{CacheConfig, HashCommandGeneration};
/// use std::time::Duration;
///
/// let config = CacheConfig::new("http://localhost:15500")
///     .with_timeout(Duration::from_secs(5))
///     .with_key_prefix("sessions:")
///     .with_hash_command_generation(HashCommandGeneration::Modern);
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Transport settings for the store
    pub store: StoreConfig,
    /// Namespace prefix applied to every key
    pub key_prefix: String,
    /// Hash-command generation; probed from the server when `None`
    pub hash_command_generation: Option<HashCommandGeneration>,
    /// Digest-first script execution (full bodies are always sent when off)
    pub digest_scripts: bool,
}

impl CacheConfig {
    /// Create a new configuration with the given store URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            store: StoreConfig::new(base_url),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            hash_command_generation: None,
            digest_scripts: true,
        }
    }

    /// Set the timeout for store requests
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.store = self.store.with_timeout(timeout);
        self
    }

    /// Set the store authentication token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.store = self.store.with_auth_token(token);
        self
    }

    /// Set the namespace prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Fix the hash-command generation instead of probing the server
    pub fn with_hash_command_generation(mut self, generation: HashCommandGeneration) -> Self {
        self.hash_command_generation = Some(generation);
        self
    }

    /// Toggle digest-first script execution
    pub fn with_digest_scripts(mut self, enabled: bool) -> Self {
        self.digest_scripts = enabled;
        self
    }
}

/// The cache client engine.
///
/// # Example
/// ```no_run
/// use synap_cache::{CacheConfig, CacheEntryOptions, CacheOutcome, SynapCache};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let cache = SynapCache::connect(CacheConfig::new("http://localhost:15500")).await?;
///
/// let options = CacheEntryOptions::new().with_sliding_expiration(Duration::from_secs(60));
/// cache.set("user:1", b"profile-bytes", &options, false).await?;
///
/// if let CacheOutcome::Hit(payload) = cache.get("user:1").await {
///     println!("{} bytes", payload.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct SynapCache<S = SynapStore> {
    store: S,
    clock: Arc<dyn Clock>,
    scripts: ScriptLibrary,
    executor: ScriptExecutor,
    prefix: String,
}

impl SynapCache<SynapStore> {
    /// Connect to a store, probing its hash-command generation unless the
    /// configuration fixes one.
    pub async fn connect(config: CacheConfig) -> Result<Self, CacheError> {
        let store = SynapStore::new(config.store)?;
        let generation = match config.hash_command_generation {
            Some(generation) => generation,
            None => HashCommandGeneration::resolve(&store)
                .await
                .map_err(CacheError::CapabilityProbe)?,
        };
        Ok(Self::with_store(store, generation)
            .with_key_prefix(config.key_prefix)
            .with_digest_scripts(config.digest_scripts))
    }
}

impl<S: ScriptableStore> SynapCache<S> {
    /// Build an engine over an already-constructed store.
    ///
    /// The generation must have been resolved by the caller; it is
    /// immutable for the engine's lifetime.
    pub fn with_store(store: S, generation: HashCommandGeneration) -> Self {
        Self {
            store,
            clock: system_clock(),
            scripts: ScriptLibrary::new(generation),
            executor: ScriptExecutor::new(true),
            prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    /// Set the namespace prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Toggle digest-first script execution
    pub fn with_digest_scripts(mut self, enabled: bool) -> Self {
        self.executor = ScriptExecutor::new(enabled);
        self
    }

    /// Replace the clock (deterministic tests)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The script library in use
    pub fn scripts(&self) -> &ScriptLibrary {
        &self.scripts
    }

    /// Store an entry.
    ///
    /// With `error_if_exists` the write is the atomic conditional-set
    /// script and a collision reports [`CacheOutcome::KeyExists`];
    /// otherwise it is a plain overwrite. An expiration intent that
    /// resolves into the past raises [`CacheError::InvalidExpiration`].
    pub async fn set(
        &self,
        key: &str,
        value: impl AsRef<[u8]>,
        options: &CacheEntryOptions,
        error_if_exists: bool,
    ) -> Result<CacheOutcome, CacheError> {
        let plan = ExpirationPlan::compute(self.clock.now(), options)?;
        let prefixed = self.prefixed(key);

        if !error_if_exists {
            return Ok(self.plain_set(&prefixed, value.as_ref(), &plan).await);
        }

        let args = [
            ScriptArg::Int(plan.absolute_or_sentinel()),
            ScriptArg::Int(plan.sliding_or_sentinel()),
            ScriptArg::Int(plan.ttl_or_sentinel()),
            ScriptArg::Bytes(value.as_ref().to_vec()),
        ];
        let reply = self
            .executor
            .execute(&self.store, self.scripts.conditional_set(), &[prefixed.as_str()], &args)
            .await;

        Ok(match reply {
            Ok(Reply::Integer(SUCCESS_SENTINEL)) => CacheOutcome::Success,
            Ok(Reply::Integer(NO_EFFECT_SENTINEL)) => CacheOutcome::KeyExists,
            Ok(other) => self.unexpected("set", &prefixed, "integer 0 or 1", other),
            Err(err) => self.transport(&prefixed, err),
        })
    }

    /// Read an entry's payload.
    ///
    /// When the entry carries a sliding window, the same retrieval step
    /// re-applies the TTL server-side.
    pub async fn get(&self, key: &str) -> CacheOutcome {
        let prefixed = self.prefixed(key);
        let reply = self
            .executor
            .execute(&self.store, self.scripts.get_refresh(), &[prefixed.as_str()], &[])
            .await;

        match reply {
            Ok(Reply::Nil) => CacheOutcome::NotFound,
            Ok(Reply::Scalar(encoded)) => match BASE64.decode(&encoded) {
                Ok(payload) => CacheOutcome::Hit(payload),
                Err(_) => self.unexpected(
                    "get",
                    &prefixed,
                    "base64 payload or nil",
                    Reply::Scalar(encoded),
                ),
            },
            Ok(other) => self.unexpected("get", &prefixed, "base64 payload or nil", other),
            Err(err) => self.transport(&prefixed, err),
        }
    }

    /// Re-apply an entry's TTL from its stored markers.
    ///
    /// A key stored without a sliding window reports the distinct
    /// [`CacheOutcome::NoSlidingExpiration`]; an absent key is only
    /// [`CacheOutcome::NotFound`] when `error_if_missing` is set.
    pub async fn refresh(&self, key: &str, error_if_missing: bool) -> CacheOutcome {
        let prefixed = self.prefixed(key);
        let reply = self
            .executor
            .execute(&self.store, self.scripts.refresh(), &[prefixed.as_str()], &[])
            .await;

        match reply {
            Ok(Reply::Integer(SUCCESS_SENTINEL)) => CacheOutcome::Success,
            Ok(Reply::Integer(NO_EFFECT_SENTINEL)) => CacheOutcome::NoSlidingExpiration,
            Ok(Reply::Nil) if error_if_missing => CacheOutcome::NotFound,
            Ok(Reply::Nil) => CacheOutcome::Success,
            Ok(other) => self.unexpected("refresh", &prefixed, "nil, 0 or 1", other),
            Err(err) => self.transport(&prefixed, err),
        }
    }

    /// Remove an entry.
    ///
    /// An absent key is only [`CacheOutcome::NotFound`] when
    /// `error_if_missing` is set; otherwise the no-op is a success.
    pub async fn remove(&self, key: &str, error_if_missing: bool) -> CacheOutcome {
        let prefixed = self.prefixed(key);
        let reply = self
            .executor
            .execute(&self.store, self.scripts.remove(), &[prefixed.as_str()], &[])
            .await;

        match reply {
            Ok(Reply::Integer(count)) if count >= 1 => CacheOutcome::Success,
            Ok(Reply::Nil) if error_if_missing => CacheOutcome::NotFound,
            Ok(Reply::Nil) => CacheOutcome::Success,
            Ok(other) => self.unexpected("remove", &prefixed, "nil or positive count", other),
            Err(err) => self.transport(&prefixed, err),
        }
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Plain overwrite: one multi-field hash write of payload + markers,
    /// then the TTL when the plan computed one.
    async fn plain_set(&self, prefixed: &str, value: &[u8], plan: &ExpirationPlan) -> CacheOutcome {
        let fields = [
            (
                ABSOLUTE_EXPIRATION_FIELD,
                ScriptArg::Int(plan.absolute_or_sentinel()),
            ),
            (
                SLIDING_EXPIRATION_FIELD,
                ScriptArg::Int(plan.sliding_or_sentinel()),
            ),
            (DATA_FIELD, ScriptArg::Bytes(value.to_vec())),
        ];

        let write = match self.scripts.generation() {
            HashCommandGeneration::Modern => self.store.hash_set_fields(prefixed, &fields).await,
            HashCommandGeneration::Legacy => self.store.hash_mset(prefixed, &fields).await,
        };
        if let Err(err) = write {
            return self.transport(prefixed, err);
        }

        if let Some(ttl) = plan.ttl_seconds {
            if let Err(err) = self.store.expire(prefixed, ttl).await {
                return self.transport(prefixed, err);
            }
        }

        CacheOutcome::Success
    }

    fn unexpected(
        &self,
        operation: &'static str,
        key: &str,
        expected: &'static str,
        reply: Reply,
    ) -> CacheOutcome {
        warn!(
            operation,
            key,
            expected,
            actual = ?reply,
            "script reply outside the documented contract"
        );
        CacheOutcome::Unexpected(UnexpectedReply {
            operation,
            expected,
            actual: format!("{reply:?}"),
        })
    }

    fn transport(&self, key: &str, err: StoreError) -> CacheOutcome {
        error!(key, error = %err, "store operation failed");
        CacheOutcome::Transport(TransportFailure {
            key: key.to_string(),
            source: Arc::new(err),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expiration::FixedClock;
    use crate::store::testing::{FakeStore, RecordedCall};
    use chrono::{TimeZone, Utc};

    fn fixed_clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
        ))
    }

    fn cache(store: FakeStore) -> SynapCache<FakeStore> {
        SynapCache::with_store(store, HashCommandGeneration::Modern).with_clock(fixed_clock())
    }

    fn sliding(seconds: u64) -> CacheEntryOptions {
        CacheEntryOptions::new().with_sliding_expiration(Duration::from_secs(seconds))
    }

    #[tokio::test]
    async fn test_conditional_set_success_and_collision() {
        let store = FakeStore::new();
        store.push_reply(Ok(Reply::Integer(1)));
        store.push_reply(Ok(Reply::Integer(0)));
        let cache = cache(store);

        let first = cache.set("k", b"v1", &sliding(60), true).await.unwrap();
        assert!(matches!(first, CacheOutcome::Success));

        let second = cache.set("k", b"v2", &sliding(60), true).await.unwrap();
        assert!(matches!(second, CacheOutcome::KeyExists));
    }

    #[tokio::test]
    async fn test_concurrent_conditional_sets_have_single_winner() {
        // The store serializes the script executions; one caller sees the
        // success sentinel, the other the collision sentinel.
        let store = FakeStore::new();
        store.push_reply(Ok(Reply::Integer(1)));
        store.push_reply(Ok(Reply::Integer(0)));
        let cache = cache(store);

        let policy_a = sliding(60);
        let policy_b = sliding(60);
        let (a, b) = tokio::join!(
            cache.set("k", b"v1", &policy_a, true),
            cache.set("k", b"v2", &policy_b, true),
        );
        let outcomes = [a.unwrap(), b.unwrap()];

        let wins = outcomes
            .iter()
            .filter(|o| matches!(o, CacheOutcome::Success))
            .count();
        let collisions = outcomes
            .iter()
            .filter(|o| matches!(o, CacheOutcome::KeyExists))
            .count();
        assert_eq!((wins, collisions), (1, 1));
    }

    #[tokio::test]
    async fn test_conditional_set_marshals_plan_and_payload() {
        let store = FakeStore::new();
        store.push_reply(Ok(Reply::Integer(1)));
        let cache = cache(store);

        let options = CacheEntryOptions::new()
            .with_absolute_expiration_relative_to_now(Duration::from_secs(120))
            .with_sliding_expiration(Duration::from_secs(300));
        cache.set("user:1", b"profile", &options, true).await.unwrap();

        let absexp = Utc.with_ymd_and_hms(2026, 1, 1, 12, 2, 0).unwrap().timestamp();
        let calls = cache.store.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            RecordedCall::EvalSha { digest, keys, args } => {
                assert_eq!(*digest, cache.scripts().conditional_set().digest);
                assert_eq!(keys, &["cache:user:1".to_string()]);
                assert_eq!(
                    args,
                    &vec![
                        ScriptArg::Int(absexp),
                        ScriptArg::Int(300),
                        ScriptArg::Int(120),
                        ScriptArg::Bytes(b"profile".to_vec()),
                    ]
                );
            }
            other => panic!("expected EvalSha, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_conditional_set_unexpected_reply() {
        let store = FakeStore::new();
        store.push_reply(Ok(Reply::Scalar("bogus".to_string())));
        let cache = cache(store);

        let outcome = cache.set("k", b"v", &sliding(60), true).await.unwrap();
        match outcome {
            CacheOutcome::Unexpected(detail) => {
                assert_eq!(detail.operation, "set");
                assert_eq!(detail.expected, "integer 0 or 1");
                assert!(detail.actual.contains("bogus"));
            }
            other => panic!("expected Unexpected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_plain_set_writes_all_fields_then_ttl() {
        let store = FakeStore::new();
        let cache = cache(store);

        let outcome = cache.set("k", b"v", &sliding(60), false).await.unwrap();
        assert!(matches!(outcome, CacheOutcome::Success));

        let calls = cache.store.calls();
        assert_eq!(calls.len(), 2);
        match &calls[0] {
            RecordedCall::HashSetFields(key, fields) => {
                assert_eq!(key, "cache:k");
                assert_eq!(fields.len(), 3);
                assert_eq!(fields[0], ("absexp".to_string(), ScriptArg::Int(-1)));
                assert_eq!(fields[1], ("sldexp".to_string(), ScriptArg::Int(60)));
                assert_eq!(
                    fields[2],
                    ("data".to_string(), ScriptArg::Bytes(b"v".to_vec()))
                );
            }
            other => panic!("expected HashSetFields, got {other:?}"),
        }
        assert_eq!(calls[1], RecordedCall::Expire("cache:k".to_string(), 60));
    }

    #[tokio::test]
    async fn test_plain_set_without_expiry_skips_expire() {
        let store = FakeStore::new();
        let cache = cache(store);

        cache
            .set("k", b"v", &CacheEntryOptions::new(), false)
            .await
            .unwrap();

        let calls = cache.store.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(&calls[0], RecordedCall::HashSetFields(_, _)));
    }

    #[tokio::test]
    async fn test_plain_set_legacy_generation_uses_mset() {
        let store = FakeStore::new();
        let cache = SynapCache::with_store(store, HashCommandGeneration::Legacy)
            .with_clock(fixed_clock());

        cache.set("k", b"v", &sliding(60), false).await.unwrap();

        let calls = cache.store.calls();
        assert!(matches!(&calls[0], RecordedCall::HashMset(key, _) if key == "cache:k"));
    }

    #[tokio::test]
    async fn test_set_invalid_expiration_raises_before_any_call() {
        let store = FakeStore::new();
        let cache = cache(store);

        let options = CacheEntryOptions::new()
            .with_absolute_expiration(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        let err = cache.set("k", b"v", &options, true).await.unwrap_err();

        assert!(matches!(err, CacheError::InvalidExpiration { .. }));
        assert!(cache.store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_hit_decodes_payload() {
        let store = FakeStore::new();
        store.push_reply(Ok(Reply::Scalar("aGVsbG8=".to_string())));
        let cache = cache(store);

        match cache.get("k").await {
            CacheOutcome::Hit(payload) => assert_eq!(payload, b"hello"),
            other => panic!("expected Hit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_empty_payload_round_trips() {
        let store = FakeStore::new();
        store.push_reply(Ok(Reply::Scalar(String::new())));
        let cache = cache(store);

        match cache.get("k").await {
            CacheOutcome::Hit(payload) => assert!(payload.is_empty()),
            other => panic!("expected Hit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let store = FakeStore::new();
        store.push_reply(Ok(Reply::Nil));
        let cache = cache(store);

        assert!(matches!(cache.get("k").await, CacheOutcome::NotFound));
    }

    #[tokio::test]
    async fn test_get_rejects_non_payload_replies() {
        let store = FakeStore::new();
        store.push_reply(Ok(Reply::Integer(7)));
        store.push_reply(Ok(Reply::Scalar("%%%not-base64%%%".to_string())));
        let cache = cache(store);

        assert!(matches!(cache.get("k").await, CacheOutcome::Unexpected(_)));
        assert!(matches!(cache.get("k").await, CacheOutcome::Unexpected(_)));
    }

    #[tokio::test]
    async fn test_refresh_outcomes() {
        let store = FakeStore::new();
        store.push_reply(Ok(Reply::Integer(1)));
        store.push_reply(Ok(Reply::Integer(0)));
        store.push_reply(Ok(Reply::Nil));
        store.push_reply(Ok(Reply::Nil));
        let cache = cache(store);

        assert!(matches!(cache.refresh("k", true).await, CacheOutcome::Success));
        assert!(matches!(
            cache.refresh("k", true).await,
            CacheOutcome::NoSlidingExpiration
        ));
        assert!(matches!(
            cache.refresh("k", true).await,
            CacheOutcome::NotFound
        ));
        assert!(matches!(
            cache.refresh("k", false).await,
            CacheOutcome::Success
        ));
    }

    #[tokio::test]
    async fn test_remove_outcomes() {
        let store = FakeStore::new();
        store.push_reply(Ok(Reply::Integer(1)));
        store.push_reply(Ok(Reply::Nil));
        store.push_reply(Ok(Reply::Nil));
        let cache = cache(store);

        assert!(matches!(cache.remove("k", true).await, CacheOutcome::Success));
        assert!(matches!(
            cache.remove("k", true).await,
            CacheOutcome::NotFound
        ));
        assert!(matches!(
            cache.remove("k", false).await,
            CacheOutcome::Success
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_wraps_prefixed_key() {
        let store = FakeStore::new();
        store.push_reply(Err(StoreError::Server("down".to_string())));
        let cache = cache(store);

        match cache.remove("user:1", true).await {
            CacheOutcome::Transport(failure) => {
                assert_eq!(failure.key, "cache:user:1");
                assert!(matches!(*failure.source, StoreError::Server(_)));
            }
            other => panic!("expected Transport, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_custom_prefix_applies_to_all_operations() {
        let store = FakeStore::new();
        store.push_reply(Ok(Reply::Nil));
        let cache = SynapCache::with_store(store, HashCommandGeneration::Modern)
            .with_key_prefix("sessions:")
            .with_clock(fixed_clock());

        cache.get("abc").await;

        let calls = cache.store.calls();
        assert!(matches!(
            &calls[0],
            RecordedCall::EvalSha { keys, .. } if keys == &["sessions:abc".to_string()]
        ));
    }
}
