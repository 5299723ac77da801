//! HTTP transport for the scriptable store
//!
//! [`SynapStore`] speaks the StreamableHTTP command protocol
//! (`POST /api/v1/command` with a `{command, request_id, payload}`
//! envelope) and implements the [`ScriptableStore`] boundary on top of
//! it. Connection pooling, TLS and timeouts come from reqwest.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

use crate::error::{CacheError, StoreError};
use crate::store::ScriptableStore;
use crate::types::{Reply, ScriptArg};

/// Store transport configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the store server
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Optional authentication token
    pub auth_token: Option<String>,
}

impl StoreConfig {
    /// Create a new configuration with the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            auth_token: None,
        }
    }

    /// Set the timeout for requests
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the authentication token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

/// Reqwest-backed store client
#[derive(Clone)]
pub struct SynapStore {
    http_client: Client,
    base_url: Url,
}

impl SynapStore {
    /// Create a new store client
    pub fn new(config: StoreConfig) -> Result<Self, CacheError> {
        let base_url = Url::parse(&config.base_url)?;

        let mut http_client_builder = Client::builder().timeout(config.timeout);

        if let Some(ref token) = config.auth_token {
            let mut headers = reqwest::header::HeaderMap::new();
            if let Ok(value) = format!("Bearer {}", token).parse() {
                headers.insert(reqwest::header::AUTHORIZATION, value);
            }
            http_client_builder = http_client_builder.default_headers(headers);
        }

        let http_client = http_client_builder.build()?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// Send a StreamableHTTP command and return the reply payload.
    ///
    /// A server error whose message starts with `NOSCRIPT` is surfaced as
    /// [`StoreError::NoScript`] so the execution strategy can react to it.
    async fn send_command(&self, command: &str, payload: Value) -> Result<Value, StoreError> {
        let request_id = uuid::Uuid::new_v4().to_string();

        let body = json!({
            "command": command,
            "request_id": request_id,
            "payload": payload,
        });

        let url = self
            .base_url
            .join("api/v1/command")
            .map_err(|e| StoreError::Server(format!("invalid command URL: {e}")))?;

        let response = self.http_client.post(url).json(&body).send().await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(StoreError::Server(error_text));
        }

        let result: Value = response.json().await?;

        if !result["success"].as_bool().unwrap_or(false) {
            let message = result["error"]
                .as_str()
                .unwrap_or("unknown server error")
                .to_string();
            if let Some(digest) = message.strip_prefix("NOSCRIPT") {
                return Err(StoreError::NoScript {
                    digest: digest.trim().to_string(),
                });
            }
            return Err(StoreError::Server(message));
        }

        Ok(result["payload"].clone())
    }

    fn wire_fields(fields: &[(&str, ScriptArg)]) -> Value {
        let mut map = serde_json::Map::new();
        for (name, value) in fields {
            map.insert(name.to_string(), value.to_wire());
        }
        Value::Object(map)
    }

    fn wire_args(args: &[ScriptArg]) -> Vec<Value> {
        args.iter().map(ScriptArg::to_wire).collect()
    }

    fn eval_reply(payload: Value) -> Reply {
        Reply::from_wire(payload.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ScriptableStore for SynapStore {
    async fn exists(&self, key: &str) -> Result<Reply, StoreError> {
        let response = self.send_command("kv.exists", json!({"key": key})).await?;
        let exists = response
            .get("exists")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Ok(Reply::Integer(exists as i64))
    }

    async fn expire(&self, key: &str, seconds: i64) -> Result<Reply, StoreError> {
        let response = self
            .send_command("kv.expire", json!({"key": key, "ttl": seconds}))
            .await?;
        let expired = response
            .get("expired")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Ok(Reply::Integer(expired as i64))
    }

    async fn unlink(&self, key: &str) -> Result<Reply, StoreError> {
        let response = self.send_command("kv.unlink", json!({"key": key})).await?;
        let unlinked = response
            .get("unlinked")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        Ok(Reply::Integer(unlinked))
    }

    async fn hash_set_fields(
        &self,
        key: &str,
        fields: &[(&str, ScriptArg)],
    ) -> Result<Reply, StoreError> {
        let payload = json!({
            "key": key,
            "fields": Self::wire_fields(fields),
        });
        let response = self.send_command("hash.set", payload).await?;
        let success = response
            .get("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Ok(Reply::Integer(success as i64))
    }

    async fn hash_mset(
        &self,
        key: &str,
        fields: &[(&str, ScriptArg)],
    ) -> Result<Reply, StoreError> {
        let payload = json!({
            "key": key,
            "fields": Self::wire_fields(fields),
        });
        let response = self.send_command("hash.mset", payload).await?;
        let success = response
            .get("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Ok(Reply::Integer(success as i64))
    }

    async fn eval_sha(
        &self,
        digest: &str,
        keys: &[&str],
        args: &[ScriptArg],
    ) -> Result<Reply, StoreError> {
        let payload = json!({
            "sha1": digest,
            "keys": keys,
            "args": Self::wire_args(args),
        });
        let response = self.send_command("script.evalsha", payload).await?;
        Ok(Self::eval_reply(response))
    }

    async fn eval(
        &self,
        body: &str,
        keys: &[&str],
        args: &[ScriptArg],
        bypass_script_cache: bool,
    ) -> Result<Reply, StoreError> {
        let payload = json!({
            "script": body,
            "keys": keys,
            "args": Self::wire_args(args),
            "no_script_cache": bypass_script_cache,
        });
        let response = self.send_command("script.eval", payload).await?;
        Ok(Self::eval_reply(response))
    }

    async fn server_version(&self) -> Result<String, StoreError> {
        let response = self.send_command("server.info", json!({})).await?;
        response
            .get("version")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| StoreError::Decode("server.info reply missing version".to_string()))
    }
}
