use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::passkey::errors::PasskeyError;
use crate::passkey::types::CeremonyKind;
use crate::utils::{base64url_decode, sha256};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ClientDataEnvelope {
    #[serde(rename = "type")]
    type_: String,
    challenge: String,
    origin: String,
    #[serde(default)]
    cross_origin: Option<bool>,
}

/// Client data that passed type, origin and challenge checks.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundClientData {
    pub kind: CeremonyKind,
    pub origin: String,
    pub challenge: Vec<u8>,
    pub cross_origin: bool,
    raw: Vec<u8>,
}

impl BoundClientData {
    /// The exact bytes the client signed over (after base64 decoding)
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// SHA-256 of the raw client data, the second half of an assertion's signed payload
    pub fn hash(&self) -> [u8; 32] {
        sha256(&self.raw)
    }
}

/// Validates the client's signed envelope against what the server expects.
///
/// 1. Decodes the base64 transport encoding and parses the JSON
/// 2. Verifies `type` is the one for `expected`
/// 3. Verifies `origin` is exactly `expected_origin`
/// 4. Decodes the embedded challenge and compares it byte-for-byte
///
/// Challenge consumption is the caller's responsibility and must happen whatever
/// this returns.
pub fn bind(
    raw_envelope: &str,
    expected: CeremonyKind,
    expected_origin: &str,
    expected_challenge: &[u8],
) -> Result<BoundClientData, PasskeyError> {
    let raw = base64url_decode(raw_envelope)
        .map_err(|e| PasskeyError::MalformedEnvelope(format!("Failed to decode: {e}")))?;

    let envelope: ClientDataEnvelope = serde_json::from_slice(&raw)
        .map_err(|e| PasskeyError::MalformedEnvelope(format!("Invalid client data JSON: {e}")))?;

    tracing::debug!("Client data: {:?}", envelope);

    let expected_type = expected.client_data_type();
    if envelope.type_ != expected_type {
        return Err(PasskeyError::TypeMismatch {
            expected: expected_type.to_string(),
            actual: envelope.type_,
        });
    }

    if envelope.origin != expected_origin {
        return Err(PasskeyError::OriginMismatch {
            expected: expected_origin.to_string(),
            actual: envelope.origin,
        });
    }

    let challenge = base64url_decode(&envelope.challenge).map_err(|e| {
        PasskeyError::MalformedEnvelope(format!("Undecodable challenge: {e}"))
    })?;

    if !bool::from(challenge.as_slice().ct_eq(expected_challenge)) {
        tracing::debug!(
            "Challenge mismatch: client sent {}, expected a different value",
            envelope.challenge
        );
        return Err(PasskeyError::ChallengeMismatch);
    }

    let cross_origin = envelope.cross_origin.unwrap_or(false);
    if cross_origin {
        tracing::debug!("Client data reports a cross-origin ceremony");
    }

    Ok(BoundClientData {
        kind: expected,
        origin: envelope.origin,
        challenge,
        cross_origin,
        raw,
    })
}
