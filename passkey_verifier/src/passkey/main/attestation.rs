use ciborium::value::Value as CborValue;
use std::fmt;

use crate::passkey::errors::PasskeyError;

/// Attestation statement formats registered for WebAuthn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationFormat {
    None,
    Packed,
    FidoU2f,
    Tpm,
    AndroidKey,
    AndroidSafetynet,
    Apple,
    Other(String),
}

impl From<&str> for AttestationFormat {
    fn from(value: &str) -> Self {
        match value {
            "none" => Self::None,
            "packed" => Self::Packed,
            "fido-u2f" => Self::FidoU2f,
            "tpm" => Self::Tpm,
            "android-key" => Self::AndroidKey,
            "android-safetynet" => Self::AndroidSafetynet,
            "apple" => Self::Apple,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for AttestationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Packed => "packed",
            Self::FidoU2f => "fido-u2f",
            Self::Tpm => "tpm",
            Self::AndroidKey => "android-key",
            Self::AndroidSafetynet => "android-safetynet",
            Self::Apple => "apple",
            Self::Other(name) => name,
        };
        f.write_str(name)
    }
}

/// The outer CBOR structure returned by the authenticator at registration.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationObject {
    pub fmt: AttestationFormat,
    pub auth_data: Vec<u8>,
    pub att_stmt: Vec<(CborValue, CborValue)>,
}

impl AttestationObject {
    /// Decodes the CBOR map and looks up `fmt`, `authData` and `attStmt`.
    ///
    /// A missing `attStmt` is treated as an empty statement.
    pub fn parse(bytes: &[u8]) -> Result<Self, PasskeyError> {
        let value: CborValue = ciborium::de::from_reader(bytes).map_err(|e| {
            PasskeyError::MalformedAttestationObject(format!("Invalid CBOR data: {e}"))
        })?;

        let CborValue::Map(map) = value else {
            return Err(PasskeyError::MalformedAttestationObject(
                "Attestation object is not a map".to_string(),
            ));
        };

        let mut fmt = None;
        let mut auth_data = None;
        let mut att_stmt = None;

        for (key, value) in map {
            let CborValue::Text(k) = key else { continue };
            match (k.as_str(), value) {
                ("fmt", CborValue::Text(f)) => fmt = Some(f),
                ("authData", CborValue::Bytes(d)) => auth_data = Some(d),
                ("attStmt", CborValue::Map(s)) => att_stmt = Some(s),
                _ => {}
            }
        }

        let fmt = fmt.ok_or_else(|| {
            PasskeyError::MalformedAttestationObject("Missing fmt".to_string())
        })?;
        let auth_data = auth_data.ok_or_else(|| {
            PasskeyError::MalformedAttestationObject("Missing authData".to_string())
        })?;

        tracing::debug!(
            "Attestation format: {}, auth data: {} bytes",
            fmt,
            auth_data.len()
        );

        Ok(Self {
            fmt: AttestationFormat::from(fmt.as_str()),
            auth_data,
            att_stmt: att_stmt.unwrap_or_default(),
        })
    }

    /// Checks the attestation statement has the fields its format requires.
    ///
    /// Certificate chains and statement signatures are not verified.
    pub fn check_statement(&self) -> Result<(), PasskeyError> {
        match &self.fmt {
            AttestationFormat::None => {
                if !self.att_stmt.is_empty() {
                    return Err(PasskeyError::AttestationStatement(
                        "attStmt must be empty for none attestation".to_string(),
                    ));
                }
            }
            AttestationFormat::Packed => {
                self.require_integer("alg")?;
                self.require_bytes("sig")?;
            }
            AttestationFormat::FidoU2f => {
                self.require_bytes("sig")?;
                match self.statement_field("x5c") {
                    Some(CborValue::Array(certs)) if !certs.is_empty() => {}
                    _ => {
                        return Err(PasskeyError::AttestationStatement(
                            "fido-u2f attestation requires a non-empty x5c".to_string(),
                        ));
                    }
                }
            }
            other => {
                tracing::debug!("No structural checks for {} attestation", other);
            }
        }
        Ok(())
    }

    fn statement_field(&self, name: &str) -> Option<&CborValue> {
        self.att_stmt
            .iter()
            .find(|(k, _)| k.as_text() == Some(name))
            .map(|(_, v)| v)
    }

    fn require_integer(&self, name: &str) -> Result<(), PasskeyError> {
        match self.statement_field(name) {
            Some(CborValue::Integer(_)) => Ok(()),
            _ => Err(PasskeyError::AttestationStatement(format!(
                "{} attestation requires {name}",
                self.fmt
            ))),
        }
    }

    fn require_bytes(&self, name: &str) -> Result<(), PasskeyError> {
        match self.statement_field(name) {
            Some(CborValue::Bytes(_)) => Ok(()),
            _ => Err(PasskeyError::AttestationStatement(format!(
                "{} attestation requires {name}",
                self.fmt
            ))),
        }
    }
}
