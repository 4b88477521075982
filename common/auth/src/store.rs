use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token store backend failure: {0}")]
    Backend(String),
    #[error("token store record is corrupt: {0}")]
    Corrupt(String),
}

/// Durable key-value collaborator used to persist and revoke refresh tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    /// Writes `value` only while the live entry under `key` still equals `expected`.
    ///
    /// Returns whether the write happened. Check and write must be one atomic step.
    async fn replace_if(
        &self,
        key: &str,
        expected: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;
}

/// Process-local [`TokenStore`] with per-entry expiry.
#[derive(Clone, Default)]
pub struct InMemoryTokenStore {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
}

#[derive(Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|guard| guard.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops expired entries and returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let mut guard = self.inner.write().map_err(poisoned)?;
        let before = guard.len();
        let now = Instant::now();
        guard.retain(|_, entry| entry.expires_at > now);
        Ok(before - guard.len())
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut guard = self.inner.write().map_err(poisoned)?;
        guard.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let guard = self.inner.read().map_err(poisoned)?;
        Ok(guard
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone()))
    }

    async fn replace_if(
        &self,
        key: &str,
        expected: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut guard = self.inner.write().map_err(poisoned)?;
        let now = Instant::now();
        let current = guard
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .is_some_and(|entry| entry.value == expected);
        if !current {
            return Ok(false);
        }
        guard.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }
}

/// What the ledger keeps for a user's current refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRecord {
    pub token: String,
    pub username: String,
    pub role: String,
}

/// Tracks the single current refresh token per user on top of a [`TokenStore`].
///
/// Recording a new token rotates out the previous one; revoking overwrites
/// the record with one that matches no token.
pub struct RefreshTokenLedger<S> {
    store: S,
}

impl<S: TokenStore> RefreshTokenLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn key_for(user_id: u64) -> String {
        format!("refresh_token_{user_id}")
    }

    pub async fn record(
        &self,
        user_id: u64,
        record: &RefreshRecord,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let value =
            serde_json::to_string(record).map_err(|err| StoreError::Corrupt(err.to_string()))?;
        self.store.put(&Self::key_for(user_id), &value, ttl).await?;
        debug!(user_id, "recorded refresh token");
        Ok(())
    }

    /// Returns the stored record when `token` is the user's current refresh token.
    pub async fn current(
        &self,
        user_id: u64,
        token: &str,
    ) -> Result<Option<RefreshRecord>, StoreError> {
        let Some(raw) = self.store.get(&Self::key_for(user_id)).await? else {
            return Ok(None);
        };
        let record: RefreshRecord =
            serde_json::from_str(&raw).map_err(|err| StoreError::Corrupt(err.to_string()))?;
        if record.token.is_empty() || record.token != token {
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Swaps `presented` for `next` as the user's current refresh token.
    ///
    /// Returns `false` when `presented` is not current, including when a concurrent
    /// rotation of the same token won.
    pub async fn rotate(
        &self,
        user_id: u64,
        presented: &str,
        next: &RefreshRecord,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let key = Self::key_for(user_id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(false);
        };
        let stored: RefreshRecord =
            serde_json::from_str(&raw).map_err(|err| StoreError::Corrupt(err.to_string()))?;
        if stored.token.is_empty() || stored.token != presented {
            return Ok(false);
        }

        let value =
            serde_json::to_string(next).map_err(|err| StoreError::Corrupt(err.to_string()))?;
        let rotated = self.store.replace_if(&key, &raw, &value, ttl).await?;
        if rotated {
            debug!(user_id, "rotated refresh token");
        } else {
            debug!(user_id, "refresh token rotation lost to a concurrent writer");
        }
        Ok(rotated)
    }

    pub async fn revoke(&self, user_id: u64, ttl: Duration) -> Result<(), StoreError> {
        let tombstone = RefreshRecord {
            token: String::new(),
            username: String::new(),
            role: String::new(),
        };
        let value = serde_json::to_string(&tombstone)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?;
        self.store.put(&Self::key_for(user_id), &value, ttl).await?;
        debug!(user_id, "revoked refresh token");
        Ok(())
    }
}
