use ciborium::value::Value as CborValue;
use std::io::Cursor;

use crate::passkey::config::UserVerification;
use crate::passkey::errors::PasskeyError;
use crate::passkey::types::CredentialId;
use crate::utils::sha256;

use super::cose::CosePublicKey;

/// Flags for AuthenticatorData as defined in WebAuthn Level 2
pub(crate) mod auth_data_flags {
    /// User Present (UP) - Bit 0
    pub(crate) const UP: u8 = 1 << 0;
    /// User Verified (UV) - Bit 2
    pub(crate) const UV: u8 = 1 << 2;
    /// Backup Eligibility (BE) - Bit 3
    pub(crate) const BE: u8 = 1 << 3;
    /// Backup State (BS) - Bit 4
    pub(crate) const BS: u8 = 1 << 4;
    /// Attested Credential Data Present - Bit 6
    pub(crate) const AT: u8 = 1 << 6;
    /// Extension Data Present - Bit 7
    pub(crate) const ED: u8 = 1 << 7;
}

/// rpIdHash (32) + flags (1) + counter (4)
const FIXED_LEN: usize = 37;
/// FIXED_LEN + AAGUID (16) + credential ID length (2)
const ATTESTED_HEADER_END: usize = 55;
const MAX_CREDENTIAL_ID_LENGTH: usize = 1023;

/// The credential block present when the AT flag is set.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestedCredentialData {
    pub aaguid: [u8; 16],
    pub credential_id: CredentialId,
    pub public_key: CosePublicKey,
    /// The COSE key exactly as it appeared in the authenticator data
    pub public_key_bytes: Vec<u8>,
}

/// Parsed authenticator data.
///
/// Layout:
/// - RP ID Hash (32 bytes)
/// - Flags (1 byte)
/// - Counter (4 bytes, big-endian)
/// - Optional: Attested Credential Data (AAGUID, 2-byte length L, credential ID, COSE key)
/// - Optional: Extensions (CBOR map)
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; 32],
    pub flags: u8,
    pub counter: u32,
    pub attested_credential: Option<AttestedCredentialData>,
    pub extensions: Option<CborValue>,
    raw: Vec<u8>,
}

impl AuthenticatorData {
    /// Parses raw authenticator data without reading past the end of `data`.
    pub fn parse(data: &[u8]) -> Result<Self, PasskeyError> {
        if data.len() < FIXED_LEN {
            return Err(PasskeyError::TruncatedInput(format!(
                "{} bytes, at least {FIXED_LEN} required",
                data.len()
            )));
        }

        let mut rp_id_hash = [0u8; 32];
        rp_id_hash.copy_from_slice(&data[..32]);
        let flags = data[32];
        let counter = u32::from_be_bytes([data[33], data[34], data[35], data[36]]);

        let mut offset = FIXED_LEN;
        let mut attested_credential = None;

        if flags & auth_data_flags::AT != 0 {
            let (attested, consumed) = parse_attested_credential(data)?;
            attested_credential = Some(attested);
            offset = consumed;
        }

        let mut extensions = None;
        if flags & auth_data_flags::ED != 0 {
            let rest = &data[offset..];
            if rest.is_empty() {
                return Err(PasskeyError::TruncatedInput(
                    "Extension data flag set but no extension data present".to_string(),
                ));
            }
            let mut cursor = Cursor::new(rest);
            let value: CborValue = ciborium::de::from_reader(&mut cursor).map_err(|e| {
                PasskeyError::InvalidResponse(format!("Invalid extension data: {e}"))
            })?;
            offset += cursor.position() as usize;
            extensions = Some(value);
        }

        if offset != data.len() {
            if attested_credential.is_some() {
                return Err(PasskeyError::InvalidPublicKeyEncoding(format!(
                    "{} unexpected bytes after public key",
                    data.len() - offset
                )));
            }
            tracing::debug!(
                "Ignoring {} trailing bytes in authenticator data",
                data.len() - offset
            );
        }

        Ok(Self {
            rp_id_hash,
            flags,
            counter,
            attested_credential,
            extensions,
            raw: data.to_vec(),
        })
    }

    /// The exact bytes that were parsed, the first half of an assertion's signed payload
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn is_user_present(&self) -> bool {
        (self.flags & auth_data_flags::UP) != 0
    }

    pub fn is_user_verified(&self) -> bool {
        (self.flags & auth_data_flags::UV) != 0
    }

    /// Check if the credential may be synced to other devices
    pub fn is_backup_eligible(&self) -> bool {
        (self.flags & auth_data_flags::BE) != 0
    }

    /// Check if this credential is backed up
    pub fn is_backed_up(&self) -> bool {
        (self.flags & auth_data_flags::BS) != 0
    }

    pub fn has_attested_credential_data(&self) -> bool {
        (self.flags & auth_data_flags::AT) != 0
    }

    pub fn has_extension_data(&self) -> bool {
        (self.flags & auth_data_flags::ED) != 0
    }

    /// AAGUID of the attested credential as a hyphenated UUID
    pub fn aaguid_string(&self) -> Option<String> {
        self.attested_credential
            .as_ref()
            .map(|c| uuid::Uuid::from_bytes(c.aaguid).hyphenated().to_string())
    }

    /// Verifies the RP ID hash and the user presence/verification flags.
    pub fn verify(&self, rp_id: &str, policy: UserVerification) -> Result<(), PasskeyError> {
        if self.rp_id_hash != sha256(rp_id.as_bytes()) {
            tracing::debug!("RP ID hash does not match SHA-256 of {}", rp_id);
            return Err(PasskeyError::RpIdHashMismatch);
        }

        if !self.is_user_present() {
            return Err(PasskeyError::UserNotPresent);
        }

        if policy == UserVerification::Required && !self.is_user_verified() {
            tracing::debug!("User verification required. Flags: {:02x}", self.flags);
            return Err(PasskeyError::UserVerificationRequired);
        }

        tracing::debug!(
            "Authenticator data verified. UP: {}, UV: {}, BE: {}, BS: {}, AT: {}, ED: {}",
            self.is_user_present(),
            self.is_user_verified(),
            self.is_backup_eligible(),
            self.is_backed_up(),
            self.has_attested_credential_data(),
            self.has_extension_data()
        );

        Ok(())
    }
}

/// Returns the attested credential and the offset just past its public key.
fn parse_attested_credential(
    data: &[u8],
) -> Result<(AttestedCredentialData, usize), PasskeyError> {
    if data.len() < ATTESTED_HEADER_END {
        return Err(PasskeyError::TruncatedInput(format!(
            "{} bytes, attested credential data requires at least {ATTESTED_HEADER_END}",
            data.len()
        )));
    }

    let mut aaguid = [0u8; 16];
    aaguid.copy_from_slice(&data[FIXED_LEN..FIXED_LEN + 16]);

    let declared = u16::from_be_bytes([data[53], data[54]]) as usize;
    if declared == 0 || declared > MAX_CREDENTIAL_ID_LENGTH {
        return Err(PasskeyError::InvalidCredentialIdLength(declared));
    }

    let available = data.len() - ATTESTED_HEADER_END;
    if available < declared {
        return Err(PasskeyError::TruncatedCredentialId {
            declared,
            available,
        });
    }

    let key_start = ATTESTED_HEADER_END + declared;
    let credential_id = CredentialId::new(data[ATTESTED_HEADER_END..key_start].to_vec());

    let key_region = &data[key_start..];
    let mut cursor = Cursor::new(key_region);
    let value: CborValue = ciborium::de::from_reader(&mut cursor)
        .map_err(|e| PasskeyError::InvalidPublicKeyEncoding(format!("Invalid CBOR: {e}")))?;
    let key_len = cursor.position() as usize;
    let public_key = CosePublicKey::from_value(&value)?;

    tracing::debug!(
        "Attested credential: id length {}, public key {} bytes, algorithm {}",
        declared,
        key_len,
        public_key.algorithm
    );

    Ok((
        AttestedCredentialData {
            aaguid,
            credential_id,
            public_key,
            public_key_bytes: key_region[..key_len].to_vec(),
        },
        key_start + key_len,
    ))
}
