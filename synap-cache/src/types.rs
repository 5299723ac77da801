//! Common types for the cache client

use std::fmt;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;

use crate::error::StoreError;

/// A reply from the store, decoded once at the transport boundary.
///
/// Mirrors the Lua-to-wire conversion rules of the scripting bridge:
/// `true` becomes `Integer(1)`, `false` and `nil` become `Nil`, strings
/// stay scalars. Anything else is carried as [`Reply::Other`] so the
/// operation interpreter can surface it as an unexpected result.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Nil,
    Integer(i64),
    Scalar(String),
    Other(Value),
}

impl Reply {
    pub(crate) fn from_wire(value: Value) -> Self {
        match value {
            Value::Null => Reply::Nil,
            Value::Bool(true) => Reply::Integer(1),
            Value::Bool(false) => Reply::Nil,
            Value::Number(n) => match n.as_i64() {
                Some(i) => Reply::Integer(i),
                None => Reply::Other(Value::Number(n)),
            },
            Value::String(s) => Reply::Scalar(s),
            other => Reply::Other(other),
        }
    }
}

/// An argument passed to a script or hash-write command.
///
/// Script arguments travel as strings on the wire (the bodies compare
/// against `'-1'` textually); payload bytes are base64-encoded for the
/// JSON transport.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptArg {
    Int(i64),
    Bytes(Vec<u8>),
}

impl ScriptArg {
    pub(crate) fn to_wire(&self) -> Value {
        match self {
            ScriptArg::Int(n) => Value::String(n.to_string()),
            ScriptArg::Bytes(bytes) => Value::String(BASE64.encode(bytes)),
        }
    }
}

/// Typed outcome of a cache operation.
///
/// Callers branch on the variant; none of these are errors in the Rust
/// sense. Only [`CacheError`](crate::CacheError) (invalid expiration,
/// construction failures) is raised as `Err` from a public operation.
#[derive(Debug, Clone)]
pub enum CacheOutcome {
    /// The operation completed
    Success,
    /// Get found the entry; carries the payload
    Hit(Vec<u8>),
    /// The key does not exist
    NotFound,
    /// Conditional set collided with an existing entry
    KeyExists,
    /// Refresh targeted an entry stored without a sliding window
    NoSlidingExpiration,
    /// The store replied outside the documented script contract
    Unexpected(UnexpectedReply),
    /// The store or transport failed mid-operation
    Transport(TransportFailure),
}

impl CacheOutcome {
    /// True for [`Success`](CacheOutcome::Success) and [`Hit`](CacheOutcome::Hit)
    pub fn is_success(&self) -> bool {
        matches!(self, CacheOutcome::Success | CacheOutcome::Hit(_))
    }

    /// Payload of a [`Hit`](CacheOutcome::Hit), if any
    pub fn into_payload(self) -> Option<Vec<u8>> {
        match self {
            CacheOutcome::Hit(payload) => Some(payload),
            _ => None,
        }
    }
}

/// Details of a reply that violated the script contract
#[derive(Debug, Clone, PartialEq)]
pub struct UnexpectedReply {
    /// Operation that observed the reply
    pub operation: &'static str,
    /// What the contract documents for this operation
    pub expected: &'static str,
    /// The reply actually received, with its type
    pub actual: String,
}

impl fmt::Display for UnexpectedReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} expected {}, got {}",
            self.operation, self.expected, self.actual
        )
    }
}

/// A store failure wrapped with the key it hit; the original cause is preserved
#[derive(Debug, Clone)]
pub struct TransportFailure {
    /// The prefixed key the operation was touching
    pub key: String,
    /// The underlying store error
    pub source: Arc<StoreError>,
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store operation on {:?} failed: {}", self.key, self.source)
    }
}
