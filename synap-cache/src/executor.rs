//! Script execution strategy
//!
//! A proxy may front several backend nodes, each with its own script
//! cache. Invoking by digest is the cheap path; a node that has never
//! seen the script answers NOSCRIPT and gets the full body exactly once,
//! which registers the script there as a side effect. Concurrent callers
//! racing on a fresh node may all fall back; the fallback is idempotent,
//! so the redundancy is accepted and never deduplicated.

use crate::error::StoreError;
use crate::scripts::ScriptDescriptor;
use crate::store::ScriptableStore;
use crate::types::{Reply, ScriptArg};

/// Executes scripts digest-first with a single body fallback.
///
/// With the optimization disabled, every invocation sends the full body
/// (correct, just heavier on the wire).
#[derive(Debug, Clone, Copy)]
pub struct ScriptExecutor {
    digest_first: bool,
}

impl ScriptExecutor {
    pub fn new(digest_first: bool) -> Self {
        Self { digest_first }
    }

    pub fn digest_first(&self) -> bool {
        self.digest_first
    }

    /// Run a script: by digest, then on a NOSCRIPT miss by body, once.
    ///
    /// Any failure of the second attempt propagates unchanged; there is
    /// no further retry.
    pub async fn execute<S: ScriptableStore + ?Sized>(
        &self,
        store: &S,
        script: &ScriptDescriptor,
        keys: &[&str],
        args: &[ScriptArg],
    ) -> Result<Reply, StoreError> {
        if !self.digest_first {
            return store.eval(script.body, keys, args, true).await;
        }
        match store.eval_sha(&script.digest, keys, args).await {
            Err(StoreError::NoScript { .. }) => store.eval(script.body, keys, args, true).await,
            other => other,
        }
    }
}
