use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::passkey::errors::PasskeyError;
use crate::passkey::types::{CounterOutcome, CredentialId, PasskeyCredential, UserId};

/// Persistence for enrolled credentials.
///
/// Credential IDs are unique across all users. `insert` and `update_counter` are
/// check-and-mutate operations and must be atomic on the backend.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<PasskeyCredential>, PasskeyError>;

    /// Global lookup, used when authenticating without a username hint.
    async fn find_by_id(
        &self,
        credential_id: &CredentialId,
    ) -> Result<Option<PasskeyCredential>, PasskeyError>;

    /// Stores the credential. Returns false without touching state if the ID exists.
    async fn insert(&self, credential: PasskeyCredential) -> Result<bool, PasskeyError>;

    /// Compare-and-set of the signature counter.
    ///
    /// The stored counter is only written on `Accepted`. An unknown ID is an
    /// `UnknownCredential` error.
    async fn update_counter(
        &self,
        credential_id: &CredentialId,
        new_counter: u32,
    ) -> Result<CounterOutcome, PasskeyError>;

    async fn list_credentials(&self) -> Result<Vec<PasskeyCredential>, PasskeyError>;
}

#[derive(Default)]
struct CredentialIndex {
    by_id: HashMap<CredentialId, PasskeyCredential>,
    by_user: HashMap<UserId, Vec<CredentialId>>,
}

pub struct InMemoryCredentialStore {
    index: RwLock<CredentialIndex>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory credential store");
        Self {
            index: RwLock::new(CredentialIndex::default()),
        }
    }
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<PasskeyCredential>, PasskeyError> {
        let index = self.index.read().await;
        let credentials = index
            .by_user
            .get(user_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| index.by_id.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(credentials)
    }

    async fn find_by_id(
        &self,
        credential_id: &CredentialId,
    ) -> Result<Option<PasskeyCredential>, PasskeyError> {
        Ok(self.index.read().await.by_id.get(credential_id).cloned())
    }

    async fn insert(&self, credential: PasskeyCredential) -> Result<bool, PasskeyError> {
        let mut index = self.index.write().await;
        if index.by_id.contains_key(&credential.credential_id) {
            tracing::debug!(
                "Credential {} already registered",
                credential.credential_id
            );
            return Ok(false);
        }
        index
            .by_user
            .entry(credential.user_id.clone())
            .or_default()
            .push(credential.credential_id.clone());
        index
            .by_id
            .insert(credential.credential_id.clone(), credential);
        Ok(true)
    }

    async fn update_counter(
        &self,
        credential_id: &CredentialId,
        new_counter: u32,
    ) -> Result<CounterOutcome, PasskeyError> {
        let mut index = self.index.write().await;
        let credential = index
            .by_id
            .get_mut(credential_id)
            .ok_or_else(|| PasskeyError::UnknownCredential(credential_id.to_base64url()))?;

        let outcome = CounterOutcome::evaluate(credential.counter, new_counter);
        match outcome {
            CounterOutcome::Accepted => {
                credential.counter = new_counter;
                credential.last_used_at = Utc::now();
            }
            CounterOutcome::Unchanged => {
                credential.last_used_at = Utc::now();
            }
            CounterOutcome::RegressionDetected => {
                tracing::warn!(
                    "Counter regression for credential {} - stored: {}, received: {}",
                    credential_id,
                    credential.counter,
                    new_counter
                );
            }
        }
        Ok(outcome)
    }

    async fn list_credentials(&self) -> Result<Vec<PasskeyCredential>, PasskeyError> {
        Ok(self.index.read().await.by_id.values().cloned().collect())
    }
}
