use thiserror::Error;

use crate::utils::UtilError;

/// Errors that can occur while verifying a passkey ceremony.
///
/// Every rejection produced by this crate carries exactly one of these kinds, so a
/// caller can tell an ordinary failure apart from a security event such as a
/// signature counter regression.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PasskeyError {
    /// The client data envelope could not be decoded or is missing fields
    #[error("Malformed client data: {0}")]
    MalformedEnvelope(String),

    /// The ceremony type in the client data does not match the ceremony being completed
    #[error("Ceremony type mismatch. Expected: {expected}, Got: {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// The origin in the client data is not the configured origin
    #[error("Origin mismatch. Expected: {expected}, Got: {actual}")]
    OriginMismatch { expected: String, actual: String },

    /// The challenge embedded in the client data is not the one issued for this session
    #[error("Challenge mismatch")]
    ChallengeMismatch,

    /// Authenticator data shorter than its fixed-size prefix
    #[error("Authenticator data truncated: {0}")]
    TruncatedInput(String),

    /// Declared credential ID length runs past the end of the authenticator data
    #[error("Credential ID truncated: declared {declared} bytes, {available} available")]
    TruncatedCredentialId { declared: usize, available: usize },

    /// The credential public key is not a valid COSE key
    #[error("Invalid public key encoding: {0}")]
    InvalidPublicKeyEncoding(String),

    /// The attestation object is not CBOR or lacks `fmt`/`authData`
    #[error("Malformed attestation object: {0}")]
    MalformedAttestationObject(String),

    /// The credential ID is already registered, possibly to another user
    #[error("Credential already registered: {0}")]
    DuplicateCredential(String),

    /// No stored credential matches the submitted credential ID
    #[error("Unknown credential: {0}")]
    UnknownCredential(String),

    /// The signature counter did not advance; the authenticator may be cloned
    #[error("Signature counter regression. Stored: {stored}, Received: {received}")]
    RegressionDetected { stored: u32, received: u32 },

    /// The assertion signature does not verify against the stored public key
    #[error("Signature verification failed: {0}")]
    SignatureInvalid(String),

    /// The challenge was never issued or has already been consumed
    #[error("Challenge is not outstanding")]
    ChallengeNotOutstanding,

    /// The challenge was consumed after its time-to-live elapsed
    #[error("Challenge expired after {age} seconds (timeout: {ttl})")]
    ChallengeExpired { age: i64, ttl: u64 },

    /// The authenticator data was produced for a different relying party
    #[error("RP ID hash mismatch")]
    RpIdHashMismatch,

    #[error("User presence flag not set")]
    UserNotPresent,

    #[error("User verification required but flag not set")]
    UserVerificationRequired,

    /// Registration authenticator data without the attested credential data block
    #[error("No attested credential data present")]
    MissingAttestedCredentialData,

    #[error("Invalid credential ID length: {0}")]
    InvalidCredentialIdLength(usize),

    #[error("Unsupported public key algorithm: {0}")]
    UnsupportedAlgorithm(i64),

    /// The submitted response JSON is structurally inconsistent
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The attestation statement does not have the fields its format requires
    #[error("Invalid attestation statement: {0}")]
    AttestationStatement(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),
}

impl PasskeyError {
    /// Whether the caller should apply stricter policy than for an ordinary failure,
    /// e.g. disable the credential pending review.
    pub fn is_security_event(&self) -> bool {
        matches!(self, Self::RegressionDetected { .. })
    }

    /// Short stable name of the error kind, suitable for metrics labels and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedEnvelope(_) => "malformed_envelope",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::OriginMismatch { .. } => "origin_mismatch",
            Self::ChallengeMismatch => "challenge_mismatch",
            Self::TruncatedInput(_) => "truncated_input",
            Self::TruncatedCredentialId { .. } => "truncated_credential_id",
            Self::InvalidPublicKeyEncoding(_) => "invalid_public_key_encoding",
            Self::MalformedAttestationObject(_) => "malformed_attestation_object",
            Self::DuplicateCredential(_) => "duplicate_credential",
            Self::UnknownCredential(_) => "unknown_credential",
            Self::RegressionDetected { .. } => "regression_detected",
            Self::SignatureInvalid(_) => "signature_invalid",
            Self::ChallengeNotOutstanding => "challenge_not_outstanding",
            Self::ChallengeExpired { .. } => "challenge_expired",
            Self::RpIdHashMismatch => "rp_id_hash_mismatch",
            Self::UserNotPresent => "user_not_present",
            Self::UserVerificationRequired => "user_verification_required",
            Self::MissingAttestedCredentialData => "missing_attested_credential_data",
            Self::InvalidCredentialIdLength(_) => "invalid_credential_id_length",
            Self::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            Self::InvalidResponse(_) => "invalid_response",
            Self::AttestationStatement(_) => "attestation_statement",
            Self::Config(_) => "config",
            Self::Storage(_) => "storage",
            Self::Crypto(_) => "crypto",
            Self::Utils(_) => "utils",
        }
    }

    /// Log the error and return self
    ///
    /// Security events are logged at warn level, everything else at info since a
    /// rejected ceremony is an expected outcome, not a server fault.
    pub fn log(self) -> Self {
        if self.is_security_event() {
            tracing::warn!(kind = self.kind(), "Security event: {}", self);
        } else {
            tracing::info!(kind = self.kind(), "Ceremony rejected: {}", self);
        }
        self
    }
}
