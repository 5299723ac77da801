//! Canonical script bodies and their digests
//!
//! The scripts are the atomic core of the cache protocol: every
//! multi-step operation (exists-check + write + TTL, read + sliding
//! refresh, marker-based refresh) is a single server-side execution.
//! Bodies are fixed constants; each digest is the hex SHA1 of its body,
//! computed once per [`ScriptLibrary`] and reused for every invocation.

use sha1::{Digest, Sha1};

use crate::error::StoreError;
use crate::store::ScriptableStore;

/// Hash field holding the absolute expiration as unix seconds, or `-1`
pub const ABSOLUTE_EXPIRATION_FIELD: &str = "absexp";
/// Hash field holding the sliding window in seconds, or `-1`
pub const SLIDING_EXPIRATION_FIELD: &str = "sldexp";
/// Hash field holding the payload
pub const DATA_FIELD: &str = "data";

/// Success sentinel returned by the write and refresh scripts
pub const SUCCESS_SENTINEL: i64 = 1;
/// Collision sentinel returned by the conditional set when the key exists;
/// also the refresh script's "no sliding window stored" reply
pub const NO_EFFECT_SENTINEL: i64 = 0;

/// Conditional set, modern generation (multi-field HSET).
///
/// ARGV: absolute-expiration-unix-seconds-or-"-1", sliding-seconds-or-"-1",
/// ttl-seconds-or-"-1", payload. Returns 0 and writes nothing if the key
/// exists; otherwise writes all three markers atomically, applies the TTL
/// when one was computed, and returns 1.
const CONDITIONAL_SET_BODY: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
  return 0
end
redis.call('HSET', KEYS[1], 'absexp', ARGV[1], 'sldexp', ARGV[2], 'data', ARGV[4])
if ARGV[3] ~= '-1' then
  redis.call('EXPIRE', KEYS[1], ARGV[3])
end
return 1
"#;

/// Conditional set, legacy generation (HMSET, pre-4.0 bridges)
const CONDITIONAL_SET_LEGACY_BODY: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
  return 0
end
redis.call('HMSET', KEYS[1], 'absexp', ARGV[1], 'sldexp', ARGV[2], 'data', ARGV[4])
if ARGV[3] ~= '-1' then
  redis.call('EXPIRE', KEYS[1], ARGV[3])
end
return 1
"#;

/// Read the payload and piggyback the sliding refresh in the same step.
///
/// Returns nil when the key is missing. When a sliding window is stored,
/// re-applies the TTL (bounded by the absolute deadline) before returning
/// the payload, so expiration maintenance costs no second round trip.
const GET_REFRESH_BODY: &str = r#"
local entry = redis.call('HMGET', KEYS[1], 'absexp', 'sldexp', 'data')
if entry[1] == false then
  return nil
end
local sldexp = tonumber(entry[2])
if sldexp ~= -1 then
  local ttl = sldexp
  local absexp = tonumber(entry[1])
  if absexp ~= -1 then
    local now = tonumber(redis.call('TIME')[1])
    if absexp - now < ttl then
      ttl = absexp - now
    end
  end
  redis.call('EXPIRE', KEYS[1], ttl)
end
return entry[3]
"#;

/// Re-apply a key's TTL from its stored markers, without the payload.
///
/// nil when missing; 0 when no sliding window is stored (the call has no
/// effect); 1 after the TTL was re-applied.
const REFRESH_BODY: &str = r#"
local entry = redis.call('HMGET', KEYS[1], 'absexp', 'sldexp')
if entry[1] == false then
  return nil
end
local sldexp = tonumber(entry[2])
if sldexp == -1 then
  return 0
end
local ttl = sldexp
local absexp = tonumber(entry[1])
if absexp ~= -1 then
  local now = tonumber(redis.call('TIME')[1])
  if absexp - now < ttl then
    ttl = absexp - now
  end
end
redis.call('EXPIRE', KEYS[1], ttl)
return 1
"#;

/// Unlink the key; the removed count when at least one key went, else nil
const REMOVE_BODY: &str = r#"
local removed = redis.call('UNLINK', KEYS[1])
if removed > 0 then
  return removed
end
return nil
"#;

/// Earliest bridge protocol whose HSET accepts multiple field/value pairs
const MULTI_FIELD_HSET_MIN_VERSION: (u32, u32) = (4, 0);

/// Which hash-write command generation the target server speaks.
///
/// Resolved once per client lifetime, then treated as immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashCommandGeneration {
    /// Multi-field HSET (bridge protocol 4.0 and later)
    Modern,
    /// HMSET
    Legacy,
}

impl HashCommandGeneration {
    /// Probe the server version and pick the generation.
    ///
    /// Call once at construction; the result is cached for the client's
    /// lifetime by whoever constructs the engine.
    pub async fn resolve<S: ScriptableStore + ?Sized>(store: &S) -> Result<Self, StoreError> {
        let version = store.server_version().await?;
        Ok(Self::from_version(&version))
    }

    /// Unparseable versions fall back to the legacy command, which every
    /// bridge generation accepts.
    pub(crate) fn from_version(version: &str) -> Self {
        let mut parts = version.split('.');
        let major: u32 = match parts.next().and_then(|p| p.trim().parse().ok()) {
            Some(major) => major,
            None => return HashCommandGeneration::Legacy,
        };
        let minor: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        if (major, minor) >= MULTI_FIELD_HSET_MIN_VERSION {
            HashCommandGeneration::Modern
        } else {
            HashCommandGeneration::Legacy
        }
    }
}

/// A script body with its content digest
#[derive(Debug, Clone)]
pub struct ScriptDescriptor {
    /// Fixed script body
    pub body: &'static str,
    /// Hex-encoded SHA1 of the body; always matches it exactly
    pub digest: String,
    /// Whether this body uses the legacy hash command
    pub requires_legacy_hash_command: bool,
}

impl ScriptDescriptor {
    fn new(body: &'static str, requires_legacy_hash_command: bool) -> Self {
        Self {
            body,
            digest: sha1_hex(body),
            requires_legacy_hash_command,
        }
    }
}

/// The four canonical scripts, digests precomputed for the selected
/// hash-command generation
#[derive(Debug, Clone)]
pub struct ScriptLibrary {
    generation: HashCommandGeneration,
    conditional_set: ScriptDescriptor,
    get_refresh: ScriptDescriptor,
    refresh: ScriptDescriptor,
    remove: ScriptDescriptor,
}

impl ScriptLibrary {
    pub fn new(generation: HashCommandGeneration) -> Self {
        let conditional_set = match generation {
            HashCommandGeneration::Modern => ScriptDescriptor::new(CONDITIONAL_SET_BODY, false),
            HashCommandGeneration::Legacy => {
                ScriptDescriptor::new(CONDITIONAL_SET_LEGACY_BODY, true)
            }
        };
        Self {
            generation,
            conditional_set,
            get_refresh: ScriptDescriptor::new(GET_REFRESH_BODY, false),
            refresh: ScriptDescriptor::new(REFRESH_BODY, false),
            remove: ScriptDescriptor::new(REMOVE_BODY, false),
        }
    }

    pub fn generation(&self) -> HashCommandGeneration {
        self.generation
    }

    pub fn conditional_set(&self) -> &ScriptDescriptor {
        &self.conditional_set
    }

    pub fn get_refresh(&self) -> &ScriptDescriptor {
        &self.get_refresh
    }

    pub fn refresh(&self) -> &ScriptDescriptor {
        &self.refresh
    }

    pub fn remove(&self) -> &ScriptDescriptor {
        &self.remove
    }
}

fn sha1_hex(body: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}
