use ciborium::value::{Integer, Value as CborValue};

use crate::passkey::errors::PasskeyError;

/// COSE algorithm identifiers accepted for credential public keys
pub mod cose_alg {
    pub const ES256: i64 = -7;
    pub const EDDSA: i64 = -8;
    pub const ES384: i64 = -35;
    pub const PS256: i64 = -37;
    pub const RS256: i64 = -257;
}

const KTY_OKP: i64 = 1;
const KTY_EC2: i64 = 2;
const KTY_RSA: i64 = 3;

/// Curve identifiers from the COSE registry
pub(crate) const CRV_P256: i64 = 1;
pub(crate) const CRV_P384: i64 = 2;
pub(crate) const CRV_ED25519: i64 = 6;

#[derive(Debug, Clone, PartialEq)]
pub enum CoseKeyParams {
    Ec2 { curve: i64, x: Vec<u8>, y: Vec<u8> },
    Okp { curve: i64, x: Vec<u8> },
    Rsa { n: Vec<u8>, e: Vec<u8> },
}

/// A credential public key decoded from its COSE_Key map.
#[derive(Debug, Clone, PartialEq)]
pub struct CosePublicKey {
    pub algorithm: i64,
    pub params: CoseKeyParams,
}

impl CosePublicKey {
    /// Decodes a standalone COSE key; trailing bytes are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PasskeyError> {
        let mut cursor = std::io::Cursor::new(bytes);
        let value: CborValue = ciborium::de::from_reader(&mut cursor)
            .map_err(|e| PasskeyError::InvalidPublicKeyEncoding(format!("Invalid CBOR: {e}")))?;
        if cursor.position() as usize != bytes.len() {
            return Err(PasskeyError::InvalidPublicKeyEncoding(
                "Trailing bytes after COSE key".to_string(),
            ));
        }
        Self::from_value(&value)
    }

    pub fn from_value(value: &CborValue) -> Result<Self, PasskeyError> {
        let map = value.as_map().ok_or_else(|| {
            PasskeyError::InvalidPublicKeyEncoding("COSE key is not a map".to_string())
        })?;

        let kty = int_param(map, 1)
            .ok_or_else(|| PasskeyError::InvalidPublicKeyEncoding("Missing kty".to_string()))?;
        let algorithm = int_param(map, 3)
            .ok_or_else(|| PasskeyError::InvalidPublicKeyEncoding("Missing alg".to_string()))?;

        let params = match kty {
            KTY_EC2 => CoseKeyParams::Ec2 {
                curve: int_param(map, -1).ok_or_else(|| missing("crv"))?,
                x: bytes_param(map, -2).ok_or_else(|| missing("x"))?,
                y: bytes_param(map, -3).ok_or_else(|| missing("y"))?,
            },
            KTY_OKP => CoseKeyParams::Okp {
                curve: int_param(map, -1).ok_or_else(|| missing("crv"))?,
                x: bytes_param(map, -2).ok_or_else(|| missing("x"))?,
            },
            KTY_RSA => CoseKeyParams::Rsa {
                n: bytes_param(map, -1).ok_or_else(|| missing("n"))?,
                e: bytes_param(map, -2).ok_or_else(|| missing("e"))?,
            },
            other => {
                return Err(PasskeyError::InvalidPublicKeyEncoding(format!(
                    "Unsupported key type {other}"
                )));
            }
        };

        Ok(Self { algorithm, params })
    }

    /// Encodes the key back into a COSE_Key map.
    pub fn to_value(&self) -> CborValue {
        let int = |v: i64| CborValue::Integer(Integer::from(v));
        let mut entries = vec![];
        match &self.params {
            CoseKeyParams::Ec2 { curve, x, y } => {
                entries.push((int(1), int(KTY_EC2)));
                entries.push((int(3), int(self.algorithm)));
                entries.push((int(-1), int(*curve)));
                entries.push((int(-2), CborValue::Bytes(x.clone())));
                entries.push((int(-3), CborValue::Bytes(y.clone())));
            }
            CoseKeyParams::Okp { curve, x } => {
                entries.push((int(1), int(KTY_OKP)));
                entries.push((int(3), int(self.algorithm)));
                entries.push((int(-1), int(*curve)));
                entries.push((int(-2), CborValue::Bytes(x.clone())));
            }
            CoseKeyParams::Rsa { n, e } => {
                entries.push((int(1), int(KTY_RSA)));
                entries.push((int(3), int(self.algorithm)));
                entries.push((int(-1), CborValue::Bytes(n.clone())));
                entries.push((int(-2), CborValue::Bytes(e.clone())));
            }
        }
        CborValue::Map(entries)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PasskeyError> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(&self.to_value(), &mut out)
            .map_err(|e| PasskeyError::InvalidPublicKeyEncoding(e.to_string()))?;
        Ok(out)
    }
}

fn missing(name: &str) -> PasskeyError {
    PasskeyError::InvalidPublicKeyEncoding(format!("Missing or invalid key parameter {name}"))
}

fn find(map: &[(CborValue, CborValue)], label: i64) -> Option<&CborValue> {
    map.iter()
        .find(|(k, _)| {
            k.as_integer()
                .and_then(|i| i64::try_from(i).ok())
                .is_some_and(|k| k == label)
        })
        .map(|(_, v)| v)
}

fn int_param(map: &[(CborValue, CborValue)], label: i64) -> Option<i64> {
    find(map, label)?
        .as_integer()
        .and_then(|i| i64::try_from(i).ok())
}

fn bytes_param(map: &[(CborValue, CborValue)], label: i64) -> Option<Vec<u8>> {
    find(map, label)?.as_bytes().cloned()
}
