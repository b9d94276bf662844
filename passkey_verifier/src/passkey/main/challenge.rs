use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::passkey::config::{MAX_CHALLENGE_TIMEOUT, MIN_CHALLENGE_LENGTH, PasskeyConfig};
use crate::passkey::errors::PasskeyError;
use crate::passkey::storage::ChallengeCache;
use crate::passkey::types::{CeremonyKind, CredentialId, StoredChallenge, User};
use crate::utils::{base64url_decode, gen_random_string};

const MAX_ISSUE_ATTEMPTS: usize = 3;

/// A single-use challenge as handed to the transport layer.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    /// Base64url encoding of the random challenge bytes
    pub value: String,
    pub kind: CeremonyKind,
    pub expires_at: DateTime<Utc>,
}

impl Challenge {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PasskeyError> {
        Ok(base64url_decode(&self.value)?)
    }
}

/// Issues and consumes single-use challenges.
///
/// Every challenge is bound at issuance to the ceremony it was requested for and
/// carries a time-to-live. Consumption removes the entry whether or not the rest
/// of the verification succeeds.
#[derive(Clone)]
pub struct ChallengeStore {
    cache: Arc<dyn ChallengeCache>,
    length: usize,
    ttl: u64,
}

impl ChallengeStore {
    pub fn new(cache: Arc<dyn ChallengeCache>, config: &PasskeyConfig) -> Self {
        Self {
            cache,
            length: config.challenge_length.max(MIN_CHALLENGE_LENGTH),
            ttl: config.challenge_timeout.min(MAX_CHALLENGE_TIMEOUT),
        }
    }

    /// Issues a challenge for `kind` with no pending user or credential restriction.
    pub async fn issue(&self, kind: CeremonyKind) -> Result<Challenge, PasskeyError> {
        self.issue_with(kind, None, Vec::new()).await
    }

    pub(crate) async fn issue_with(
        &self,
        kind: CeremonyKind,
        user: Option<User>,
        allowed_credentials: Vec<CredentialId>,
    ) -> Result<Challenge, PasskeyError> {
        let now = Utc::now();
        let expires_at = i64::try_from(self.ttl)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                PasskeyError::Config(format!("Challenge timeout {} out of range", self.ttl))
            })?;

        let purged = self.cache.purge_expired(now).await?;
        if purged > 0 {
            tracing::debug!("Purged {} expired challenges", purged);
        }

        let stored = StoredChallenge {
            kind,
            user,
            allowed_credentials,
            issued_at: now,
            ttl: self.ttl,
        };

        for _ in 0..MAX_ISSUE_ATTEMPTS {
            let value = gen_random_string(self.length)?;
            if self.cache.put_if_not_exists(&value, stored.clone()).await? {
                tracing::debug!("Issued {} challenge", kind);
                return Ok(Challenge {
                    value,
                    kind,
                    expires_at,
                });
            }
            tracing::warn!("Random challenge collided with an outstanding one, retrying");
        }

        Err(PasskeyError::Crypto(
            "Failed to issue a unique challenge".to_string(),
        ))
    }

    /// Returns whether `value` was outstanding, removing it in the same step.
    pub async fn consume(&self, value: &str) -> Result<bool, PasskeyError> {
        Ok(self.cache.take(value).await?.is_some())
    }

    /// Whether `value` is currently outstanding. Does not consume it.
    pub async fn is_outstanding(&self, value: &str) -> Result<bool, PasskeyError> {
        self.cache.contains(value).await
    }

    /// Consumes `value` and validates it against the ceremony being completed.
    ///
    /// The entry is gone after this call regardless of the result.
    pub(crate) async fn consume_for(
        &self,
        value: &str,
        kind: CeremonyKind,
    ) -> Result<StoredChallenge, PasskeyError> {
        let stored = self
            .cache
            .take(value)
            .await?
            .ok_or(PasskeyError::ChallengeNotOutstanding)?;

        if stored.kind != kind {
            tracing::warn!(
                "Challenge issued for {} presented for {}",
                stored.kind,
                kind
            );
            return Err(PasskeyError::ChallengeNotOutstanding);
        }

        let now = Utc::now();
        if stored.is_expired_at(now) {
            let age = stored.age_at(now);
            tracing::warn!(
                "Challenge expired after {} seconds (timeout: {})",
                age,
                stored.ttl
            );
            return Err(PasskeyError::ChallengeExpired {
                age,
                ttl: stored.ttl,
            });
        }

        Ok(stored)
    }
}
