use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::{base64url_decode, base64url_encode};

use super::errors::PasskeyError;

/// Type-safe wrapper for raw credential identifiers.
///
/// Credential IDs are opaque bytes chosen by the authenticator. They are stored and
/// compared as bytes and only rendered as base64url at the edges.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CredentialId(Vec<u8>);

impl CredentialId {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Parses the base64url form used by browsers for `rawId`.
    pub fn from_base64url(encoded: &str) -> Result<Self, PasskeyError> {
        Ok(Self(base64url_decode(encoded)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64url(&self) -> String {
        base64url_encode(&self.0)
    }
}

impl fmt::Debug for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialId({})", self.to_base64url())
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64url())
    }
}

impl From<CredentialId> for String {
    fn from(id: CredentialId) -> Self {
        id.to_base64url()
    }
}

impl TryFrom<String> for CredentialId {
    type Error = PasskeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_base64url(&value)
    }
}

/// Type-safe wrapper for user identifiers (the WebAuthn user handle).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered identity. Unique by name and never deleted by this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Stable opaque identifier, also sent to authenticators as `user.id`
    pub id: UserId,
    /// Human-chosen name
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: UserId, name: String) -> Self {
        Self {
            id,
            name,
            created_at: Utc::now(),
        }
    }
}

/// Transport hints reported by the authenticator at registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthenticatorTransport {
    Usb,
    Nfc,
    Ble,
    SmartCard,
    Hybrid,
    Internal,
    #[serde(untagged)]
    Other(String),
}

impl From<&str> for AuthenticatorTransport {
    fn from(value: &str) -> Self {
        match value {
            "usb" => Self::Usb,
            "nfc" => Self::Nfc,
            "ble" => Self::Ble,
            "smart-card" => Self::SmartCard,
            "hybrid" => Self::Hybrid,
            "internal" => Self::Internal,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Stored credential information for a passkey.
///
/// Only `counter` and `last_used_at` change after registration.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct PasskeyCredential {
    pub credential_id: CredentialId,
    /// Owner of the credential
    pub user_id: UserId,
    /// COSE-encoded public key exactly as the authenticator sent it
    pub public_key: Vec<u8>,
    /// COSE algorithm identifier of the public key (e.g. -7 for ES256)
    pub algorithm: i64,
    /// Signature counter, used to detect cloned authenticators
    pub counter: u32,
    pub transports: Vec<AuthenticatorTransport>,
    /// AAGUID of the authenticator model, hyphenated
    pub aaguid: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// Result of advancing a stored signature counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CounterOutcome {
    /// The counter advanced, or tracking started from an uninitialised zero
    Accepted,
    /// The counter did not advance while tracking is active; possible clone
    RegressionDetected,
    /// Both values are zero: the authenticator does not implement a counter
    Unchanged,
}

impl CounterOutcome {
    /// Decides the outcome of presenting `received` against `stored`.
    pub fn evaluate(stored: u32, received: u32) -> Self {
        match (stored, received) {
            (0, 0) => Self::Unchanged,
            (0, _) => Self::Accepted,
            (s, r) if r > s => Self::Accepted,
            _ => Self::RegressionDetected,
        }
    }
}

/// The two ceremonies a challenge can be issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CeremonyKind {
    Registration,
    Authentication,
}

impl CeremonyKind {
    /// The `type` value the client data must carry for this ceremony
    pub fn client_data_type(&self) -> &'static str {
        match self {
            Self::Registration => "webauthn.create",
            Self::Authentication => "webauthn.get",
        }
    }
}

impl fmt::Display for CeremonyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registration => f.write_str("registration"),
            Self::Authentication => f.write_str("authentication"),
        }
    }
}

/// Server-side state kept for an outstanding challenge.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct StoredChallenge {
    pub kind: CeremonyKind,
    /// Pending user for a registration ceremony
    pub user: Option<User>,
    /// Credentials acceptable for an authentication ceremony; empty means any
    pub allowed_credentials: Vec<CredentialId>,
    pub issued_at: DateTime<Utc>,
    /// Time-to-live in seconds
    pub ttl: u64,
}

impl StoredChallenge {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        // A TTL beyond i64 seconds never elapses
        i64::try_from(self.ttl).is_ok_and(|ttl| self.age_at(now) > ttl)
    }

    pub fn age_at(&self, now: DateTime<Utc>) -> i64 {
        (now - self.issued_at).num_seconds()
    }
}
