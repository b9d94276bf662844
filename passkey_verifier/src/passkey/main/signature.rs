use ring::signature::{
    self, RsaPublicKeyComponents, UnparsedPublicKey, VerificationAlgorithm,
};

use super::cose::{CRV_ED25519, CRV_P256, CRV_P384, CoseKeyParams, CosePublicKey, cose_alg};

/// Algorithms offered to authenticators, in order of preference
pub const SUPPORTED_ALGORITHMS: [i64; 5] = [
    cose_alg::ES256,
    cose_alg::EDDSA,
    cose_alg::ES384,
    cose_alg::RS256,
    cose_alg::PS256,
];

/// Checks an assertion signature over `message` with a stored COSE public key.
///
/// `message` is `authenticatorData || SHA-256(clientDataJSON)`.
pub trait SignatureVerifier: Send + Sync + 'static {
    fn verify(
        &self,
        algorithm: i64,
        cose_public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> bool;
}

/// Verifier backed by `ring::signature`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RingSignatureVerifier;

impl SignatureVerifier for RingSignatureVerifier {
    fn verify(
        &self,
        algorithm: i64,
        cose_public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> bool {
        let key = match CosePublicKey::from_bytes(cose_public_key) {
            Ok(key) => key,
            Err(e) => {
                tracing::error!("Stored public key could not be decoded: {}", e);
                return false;
            }
        };

        if key.algorithm != algorithm {
            tracing::debug!(
                "Key algorithm {} does not match credential algorithm {}",
                key.algorithm,
                algorithm
            );
            return false;
        }

        let result = match (algorithm, &key.params) {
            (cose_alg::ES256, CoseKeyParams::Ec2 { curve, x, y }) if *curve == CRV_P256 => {
                verify_ec2(&signature::ECDSA_P256_SHA256_ASN1, x, y, message, signature)
            }
            (cose_alg::ES384, CoseKeyParams::Ec2 { curve, x, y }) if *curve == CRV_P384 => {
                verify_ec2(&signature::ECDSA_P384_SHA384_ASN1, x, y, message, signature)
            }
            (cose_alg::EDDSA, CoseKeyParams::Okp { curve, x }) if *curve == CRV_ED25519 => {
                UnparsedPublicKey::new(&signature::ED25519, x).verify(message, signature)
            }
            (cose_alg::RS256, CoseKeyParams::Rsa { n, e }) => RsaPublicKeyComponents { n, e }
                .verify(&signature::RSA_PKCS1_2048_8192_SHA256, message, signature),
            (cose_alg::PS256, CoseKeyParams::Rsa { n, e }) => RsaPublicKeyComponents { n, e }
                .verify(&signature::RSA_PSS_2048_8192_SHA256, message, signature),
            _ => {
                tracing::warn!("Unsupported key type for algorithm {}", algorithm);
                return false;
            }
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Signature verification failed: {:?}", e);
                false
            }
        }
    }
}

/// Whether `key` is a shape the ring verifier can use for its declared algorithm.
pub(crate) fn is_supported_key(key: &CosePublicKey) -> bool {
    match (key.algorithm, &key.params) {
        (cose_alg::ES256, CoseKeyParams::Ec2 { curve, x, y }) => {
            *curve == CRV_P256 && x.len() == 32 && y.len() == 32
        }
        (cose_alg::ES384, CoseKeyParams::Ec2 { curve, x, y }) => {
            *curve == CRV_P384 && x.len() == 48 && y.len() == 48
        }
        (cose_alg::EDDSA, CoseKeyParams::Okp { curve, x }) => {
            *curve == CRV_ED25519 && x.len() == 32
        }
        (cose_alg::RS256 | cose_alg::PS256, CoseKeyParams::Rsa { n, e }) => {
            !n.is_empty() && !e.is_empty()
        }
        _ => false,
    }
}

fn verify_ec2(
    algorithm: &'static dyn VerificationAlgorithm,
    x: &[u8],
    y: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), ring::error::Unspecified> {
    // Uncompressed SEC1 point: 0x04 || x || y
    let mut point = Vec::with_capacity(1 + x.len() + y.len());
    point.push(0x04);
    point.extend_from_slice(x);
    point.extend_from_slice(y);
    UnparsedPublicKey::new(algorithm, &point).verify(message, signature)
}
