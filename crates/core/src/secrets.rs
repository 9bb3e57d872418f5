use std::collections::HashMap;
use std::env;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// One resolved credential. Cached for process lifetime; there is no
/// expiry or rotation path.
#[derive(Clone, Debug)]
pub struct Secret {
    pub name: String,
    pub value: SecretString,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error("secret `{0}` was not found")]
    NotFound(String),
    #[error("access to secret `{0}` was denied")]
    AccessDenied(String),
    #[error("secret `{name}` envelope could not be parsed: {detail}")]
    MalformedEnvelope { name: String, detail: String },
    #[error("secret store transport failure for `{name}`: {detail}")]
    Transport { name: String, detail: String },
}

impl SecretStoreError {
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::AccessDenied(_) => "access_denied",
            Self::MalformedEnvelope { .. } => "malformed_envelope",
            Self::Transport { .. } => "transport",
        }
    }
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<Option<String>, SecretStoreError>;
}

/// Reads secrets directly from process environment variables. The dev
/// credential source; blank values count as absent.
#[derive(Default)]
pub struct EnvSecretStore;

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn fetch(&self, name: &str) -> Result<Option<String>, SecretStoreError> {
        Ok(env::var(name).ok().filter(|value| !value.trim().is_empty()))
    }
}

/// Caching front for a [`SecretStore`]. Writes only happen on first access
/// per key; a race on first populate is harmless since all writers compute
/// the same value.
pub struct SecretProvider {
    store: Box<dyn SecretStore>,
    cache: RwLock<HashMap<String, Secret>>,
}

impl SecretProvider {
    pub fn new(store: Box<dyn SecretStore>) -> Self {
        Self { store, cache: RwLock::new(HashMap::new()) }
    }

    /// Store failures are logged per category and surfaced as an empty
    /// lookup. Callers treat a missing required secret as fatal at
    /// startup; nothing is retried at this layer.
    pub async fn resolve(&self, name: &str) -> Option<Secret> {
        if let Some(secret) = self.cache.read().await.get(name) {
            debug!(
                event_name = "secrets.cache_hit",
                secret_name = name,
                "resolved secret from cache"
            );
            return Some(secret.clone());
        }

        match self.store.fetch(name).await {
            Ok(Some(value)) => {
                let secret = Secret {
                    name: name.to_owned(),
                    value: value.into(),
                    fetched_at: Utc::now(),
                };
                self.cache.write().await.insert(name.to_owned(), secret.clone());
                debug!(
                    event_name = "secrets.fetched",
                    secret_name = name,
                    "resolved secret from store"
                );
                Some(secret)
            }
            Ok(None) => {
                error!(
                    event_name = "secrets.missing",
                    secret_name = name,
                    "secret store returned no value"
                );
                None
            }
            Err(store_error) => {
                error!(
                    event_name = "secrets.fetch_failed",
                    secret_name = name,
                    category = store_error.category(),
                    error = %store_error,
                    "secret lookup failed"
                );
                None
            }
        }
    }
}

/// Parse the store's JSON envelope `{"value": "<secret>"}`. A well-formed
/// envelope without a `value` field is an empty lookup, not an error.
pub fn parse_envelope(name: &str, raw: &str) -> Result<Option<String>, SecretStoreError> {
    let doc: serde_json::Value =
        serde_json::from_str(raw).map_err(|source| SecretStoreError::MalformedEnvelope {
            name: name.to_owned(),
            detail: source.to_string(),
        })?;

    Ok(doc.get("value").and_then(|value| value.as_str()).map(str::to_owned))
}
