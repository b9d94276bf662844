use serde::{Deserialize, Serialize};
use url::Url;

use super::errors::PasskeyError;

const DEFAULT_TIMEOUT: u32 = 60;
const DEFAULT_CHALLENGE_TIMEOUT: u64 = 60;
/// Upper bound on a challenge lifetime in seconds (one day)
pub(crate) const MAX_CHALLENGE_TIMEOUT: u64 = 86_400;
const DEFAULT_CHALLENGE_LENGTH: usize = 32;
pub(crate) const MIN_CHALLENGE_LENGTH: usize = 16;

/// User verification policy requested from authenticators and enforced on responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserVerification {
    Required,
    Preferred,
    #[default]
    Discouraged,
}

impl UserVerification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Preferred => "preferred",
            Self::Discouraged => "discouraged",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "required" => Some(Self::Required),
            "preferred" => Some(Self::Preferred),
            "discouraged" => Some(Self::Discouraged),
            _ => None,
        }
    }
}

/// Relying party settings for the verification engine.
#[derive(Clone, Debug, PartialEq)]
pub struct PasskeyConfig {
    /// Exact origin (scheme, host and port) the client data must carry
    pub origin: String,
    /// Relying party ID whose SHA-256 hash must lead the authenticator data
    pub rp_id: String,
    pub rp_name: String,
    /// Client-side ceremony timeout in seconds
    pub timeout: u32,
    /// Lifetime of an issued challenge in seconds
    pub challenge_timeout: u64,
    /// Number of random bytes in an issued challenge
    pub challenge_length: usize,
    pub user_verification: UserVerification,
    pub attestation: String,
    pub authenticator_attachment: Option<String>,
    pub resident_key: String,
}

impl PasskeyConfig {
    /// Builds a configuration with defaults, deriving the RP ID from the origin host.
    pub fn new(origin: &str) -> Result<Self, PasskeyError> {
        let (origin, rp_id) = parse_origin(origin)?;
        Ok(Self {
            origin,
            rp_name: rp_id.clone(),
            rp_id,
            timeout: DEFAULT_TIMEOUT,
            challenge_timeout: DEFAULT_CHALLENGE_TIMEOUT,
            challenge_length: DEFAULT_CHALLENGE_LENGTH,
            user_verification: UserVerification::default(),
            attestation: "direct".to_string(),
            authenticator_attachment: Some("platform".to_string()),
            resident_key: "required".to_string(),
        })
    }

    /// Reads the configuration from the process environment (and `.env`, if present).
    pub fn from_env() -> Result<Self, PasskeyError> {
        let origin = dotenvy::var("ORIGIN")
            .map_err(|_| PasskeyError::Config("ORIGIN must be set".to_string()))?;
        let mut config = Self::new(&origin)?;

        if let Ok(rp_id) = dotenvy::var("PASSKEY_RP_ID") {
            config.rp_id = rp_id;
        }
        config.rp_name = dotenvy::var("PASSKEY_RP_NAME").unwrap_or_else(|_| config.rp_id.clone());
        config.timeout = parse_or("PASSKEY_TIMEOUT", DEFAULT_TIMEOUT);
        let challenge_timeout = parse_or("PASSKEY_CHALLENGE_TIMEOUT", DEFAULT_CHALLENGE_TIMEOUT);
        config.challenge_timeout = if challenge_timeout > MAX_CHALLENGE_TIMEOUT {
            tracing::warn!(
                "PASSKEY_CHALLENGE_TIMEOUT {} above maximum {}. Using default {}",
                challenge_timeout,
                MAX_CHALLENGE_TIMEOUT,
                DEFAULT_CHALLENGE_TIMEOUT
            );
            DEFAULT_CHALLENGE_TIMEOUT
        } else {
            challenge_timeout
        };

        let length = parse_or("PASSKEY_CHALLENGE_LENGTH", DEFAULT_CHALLENGE_LENGTH);
        config.challenge_length = if length < MIN_CHALLENGE_LENGTH {
            tracing::warn!(
                "PASSKEY_CHALLENGE_LENGTH {} below minimum {}. Using default {}",
                length,
                MIN_CHALLENGE_LENGTH,
                DEFAULT_CHALLENGE_LENGTH
            );
            DEFAULT_CHALLENGE_LENGTH
        } else {
            length
        };

        if let Ok(v) = dotenvy::var("PASSKEY_USER_VERIFICATION") {
            config.user_verification = UserVerification::parse(&v).unwrap_or_else(|| {
                tracing::warn!("Invalid user verification: {}. Using default 'discouraged'", v);
                UserVerification::Discouraged
            });
        }

        if let Ok(v) = dotenvy::var("PASSKEY_ATTESTATION") {
            config.attestation = match v.to_lowercase().as_str() {
                valid @ ("none" | "direct" | "indirect" | "enterprise") => valid.to_string(),
                invalid => {
                    tracing::warn!("Invalid attestation: {}. Using default 'direct'", invalid);
                    "direct".to_string()
                }
            };
        }

        if let Ok(v) = dotenvy::var("PASSKEY_AUTHENTICATOR_ATTACHMENT") {
            config.authenticator_attachment = match v.to_lowercase().as_str() {
                valid @ ("platform" | "cross-platform") => Some(valid.to_string()),
                "none" => None,
                invalid => {
                    tracing::warn!(
                        "Invalid authenticator attachment: {}. Using default 'platform'",
                        invalid
                    );
                    Some("platform".to_string())
                }
            };
        }

        if let Ok(v) = dotenvy::var("PASSKEY_RESIDENT_KEY") {
            config.resident_key = match v.to_lowercase().as_str() {
                valid @ ("required" | "preferred" | "discouraged") => valid.to_string(),
                invalid => {
                    tracing::warn!("Invalid resident key: {}. Using default 'required'", invalid);
                    "required".to_string()
                }
            };
        }

        tracing::debug!("Passkey configuration: {:?}", config);
        Ok(config)
    }

    /// Sets the challenge lifetime, capped at one day.
    pub fn with_challenge_timeout(mut self, seconds: u64) -> Self {
        if seconds > MAX_CHALLENGE_TIMEOUT {
            tracing::warn!(
                "Challenge timeout {} above maximum {}. Capping",
                seconds,
                MAX_CHALLENGE_TIMEOUT
            );
        }
        self.challenge_timeout = seconds.min(MAX_CHALLENGE_TIMEOUT);
        self
    }

    pub fn with_user_verification(mut self, policy: UserVerification) -> Self {
        self.user_verification = policy;
        self
    }

    pub(crate) fn require_resident_key(&self) -> bool {
        self.resident_key == "required"
    }
}

/// Returns the serialized origin and the RP ID (its host).
///
/// Browsers report the origin as scheme, host and non-default port only, so a
/// path, query or fragment here could never match and is rejected.
fn parse_origin(origin: &str) -> Result<(String, String), PasskeyError> {
    let url = Url::parse(origin)
        .map_err(|e| PasskeyError::Config(format!("Invalid ORIGIN {origin}: {e}")))?;
    let rp_id = url
        .host_str()
        .map(|h| h.to_string())
        .ok_or_else(|| PasskeyError::Config(format!("Could not extract RP ID from {origin}")))?;
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(PasskeyError::Config(format!(
            "ORIGIN {origin} must not carry a path, query or fragment"
        )));
    }
    Ok((url.origin().ascii_serialization(), rp_id))
}

fn parse_or<T: std::str::FromStr + std::fmt::Display + Copy>(key: &str, default: T) -> T {
    match dotenvy::var(key) {
        Ok(v) => v.parse::<T>().unwrap_or_else(|_| {
            tracing::warn!("Invalid {}: {}. Using default {}", key, v, default);
            default
        }),
        Err(_) => default,
    }
}
