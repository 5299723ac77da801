//! Collaborator store boundary
//!
//! The engine consumes a scriptable key/value store through
//! [`ScriptableStore`]: existence check, expire, unlink, the two
//! hash-write generations, script evaluation by digest and by body, and
//! the server-version query feeding the one-time capability probe. The
//! shipped implementation is [`SynapStore`](crate::client::SynapStore);
//! tests substitute their own.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{Reply, ScriptArg};

/// A remote key/value store with server-side scripting.
///
/// Every method performs one round trip and returns the typed [`Reply`].
/// Implementations must report a "script not cached on this node"
/// condition as [`StoreError::NoScript`] so the execution strategy can
/// fall back to the full body exactly once.
#[async_trait]
pub trait ScriptableStore: Send + Sync {
    /// Whether the key exists
    async fn exists(&self, key: &str) -> Result<Reply, StoreError>;

    /// Apply a per-key timeout in seconds
    async fn expire(&self, key: &str, seconds: i64) -> Result<Reply, StoreError>;

    /// Asynchronously delete the key
    async fn unlink(&self, key: &str) -> Result<Reply, StoreError>;

    /// Write several hash fields in one multi-field set command (modern servers)
    async fn hash_set_fields(
        &self,
        key: &str,
        fields: &[(&str, ScriptArg)],
    ) -> Result<Reply, StoreError>;

    /// Write several hash fields with the legacy multi-set command
    async fn hash_mset(&self, key: &str, fields: &[(&str, ScriptArg)])
    -> Result<Reply, StoreError>;

    /// Evaluate a cached script by its hex SHA1 digest
    async fn eval_sha(
        &self,
        digest: &str,
        keys: &[&str],
        args: &[ScriptArg],
    ) -> Result<Reply, StoreError>;

    /// Evaluate a script from its full body.
    ///
    /// `bypass_script_cache` instructs the transport to send the body
    /// verbatim instead of substituting a digest it may have cached; the
    /// contacted node registers the script as a side effect.
    async fn eval(
        &self,
        body: &str,
        keys: &[&str],
        args: &[ScriptArg],
        bypass_script_cache: bool,
    ) -> Result<Reply, StoreError>;

    /// Server version string, queried once by the capability probe
    async fn server_version(&self) -> Result<String, StoreError>;
}
