use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::passkey::errors::PasskeyError;
use crate::passkey::types::StoredChallenge;

/// Backing store for outstanding challenges, keyed by the challenge value.
///
/// `put_if_not_exists` and `take` must each be a single atomic step on the backend:
/// two concurrent `take` calls for the same value may not both return `Some`.
#[async_trait]
pub trait ChallengeCache: Send + Sync + 'static {
    /// Stores the challenge unless the value is already outstanding.
    /// Returns true if it was stored.
    async fn put_if_not_exists(
        &self,
        value: &str,
        challenge: StoredChallenge,
    ) -> Result<bool, PasskeyError>;

    /// Removes and returns the challenge in one step (test-and-clear).
    async fn take(&self, value: &str) -> Result<Option<StoredChallenge>, PasskeyError>;

    async fn contains(&self, value: &str) -> Result<bool, PasskeyError>;

    /// Drops every entry that expired before `now`, returning how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, PasskeyError>;
}

pub struct InMemoryChallengeCache {
    entries: Mutex<HashMap<String, StoredChallenge>>,
}

impl InMemoryChallengeCache {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory challenge cache");
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryChallengeCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChallengeCache for InMemoryChallengeCache {
    async fn put_if_not_exists(
        &self,
        value: &str,
        challenge: StoredChallenge,
    ) -> Result<bool, PasskeyError> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(value) {
            return Ok(false);
        }
        entries.insert(value.to_string(), challenge);
        Ok(true)
    }

    async fn take(&self, value: &str) -> Result<Option<StoredChallenge>, PasskeyError> {
        Ok(self.entries.lock().await.remove(value))
    }

    async fn contains(&self, value: &str) -> Result<bool, PasskeyError> {
        Ok(self.entries.lock().await.contains_key(value))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, PasskeyError> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, challenge| !challenge.is_expired_at(now));
        Ok(before - entries.len())
    }
}
