use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ciborium::value::Value as CborValue;
use ring::digest;
use ring::rand::SystemRandom;
use ring::signature::{ECDSA_P256_SHA256_ASN1_SIGNING, EcdsaKeyPair, KeyPair};
use serde_json::json;
use std::sync::Once;

use passkey_verifier::{
    AuthenticationResponse, CoseKeyParams, CosePublicKey, PasskeyConfig, PasskeyCoordinator,
    RegistrationResponse, cose_alg,
};

pub const ORIGIN: &str = "https://example.com";
pub const RP_ID: &str = "example.com";

pub const FLAG_UP: u8 = 0x01;
pub const FLAG_UV: u8 = 0x04;
pub const FLAG_AT: u8 = 0x40;

static TRACING: Once = Once::new();

/// Install a tracing subscriber once; honours RUST_LOG
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn test_config() -> PasskeyConfig {
    PasskeyConfig::new(ORIGIN).expect("test origin is valid")
}

pub fn coordinator() -> PasskeyCoordinator {
    init_tracing();
    PasskeyCoordinator::in_memory(test_config())
}

pub fn b64(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn client_data_json(type_: &str, origin: &str, challenge: &str) -> String {
    b64(json!({
        "type": type_,
        "challenge": challenge,
        "origin": origin,
        "crossOrigin": false
    })
    .to_string())
}

/// Authenticator data: rpIdHash | flags | counter | [aaguid | L | credential id | key]
pub fn auth_data(flags: u8, counter: u32, attested: Option<(&[u8], &[u8])>) -> Vec<u8> {
    let mut data = digest::digest(&digest::SHA256, RP_ID.as_bytes())
        .as_ref()
        .to_vec();
    data.push(flags);
    data.extend_from_slice(&counter.to_be_bytes());
    if let Some((credential_id, public_key)) = attested {
        data.extend_from_slice(&[0u8; 16]);
        data.extend_from_slice(&(credential_id.len() as u16).to_be_bytes());
        data.extend_from_slice(credential_id);
        data.extend_from_slice(public_key);
    }
    data
}

pub fn attestation_object(fmt: &str, auth_data: &[u8]) -> Vec<u8> {
    let value = CborValue::Map(vec![
        (CborValue::Text("fmt".into()), CborValue::Text(fmt.into())),
        (CborValue::Text("attStmt".into()), CborValue::Map(vec![])),
        (
            CborValue::Text("authData".into()),
            CborValue::Bytes(auth_data.to_vec()),
        ),
    ]);
    let mut out = Vec::new();
    ciborium::ser::into_writer(&value, &mut out).expect("CBOR encoding");
    out
}

/// A software authenticator holding one P-256 credential
pub struct MockAuthenticator {
    pub credential_id: Vec<u8>,
    key_pair: EcdsaKeyPair,
    rng: SystemRandom,
}

impl MockAuthenticator {
    pub fn new(credential_id: &[u8]) -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
            .expect("key generation");
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8.as_ref(), &rng)
                .expect("key parsing");
        Self {
            credential_id: credential_id.to_vec(),
            key_pair,
            rng,
        }
    }

    pub fn credential_id_b64(&self) -> String {
        b64(&self.credential_id)
    }

    pub fn cose_key_bytes(&self) -> Vec<u8> {
        let point = self.key_pair.public_key().as_ref();
        CosePublicKey {
            algorithm: cose_alg::ES256,
            params: CoseKeyParams::Ec2 {
                curve: 1,
                x: point[1..33].to_vec(),
                y: point[33..65].to_vec(),
            },
        }
        .to_bytes()
        .expect("COSE encoding")
    }

    pub fn registration(&self, challenge: &str) -> RegistrationResponse {
        self.registration_with(challenge, "webauthn.create", ORIGIN)
    }

    pub fn registration_with(
        &self,
        challenge: &str,
        type_: &str,
        origin: &str,
    ) -> RegistrationResponse {
        let data = auth_data(
            FLAG_UP | FLAG_UV | FLAG_AT,
            0,
            Some((&self.credential_id, &self.cose_key_bytes())),
        );
        let id = self.credential_id_b64();
        serde_json::from_value(json!({
            "id": id,
            "rawId": id,
            "type": "public-key",
            "response": {
                "clientDataJSON": client_data_json(type_, origin, challenge),
                "attestationObject": b64(attestation_object("none", &data)),
                "transports": ["internal"]
            },
            "authenticatorAttachment": "platform"
        }))
        .expect("registration response JSON")
    }

    pub fn assertion(&self, challenge: &str, counter: u32) -> AuthenticationResponse {
        self.assertion_with(challenge, counter, FLAG_UP | FLAG_UV, ORIGIN, None)
    }

    pub fn assertion_with(
        &self,
        challenge: &str,
        counter: u32,
        flags: u8,
        origin: &str,
        user_handle: Option<&str>,
    ) -> AuthenticationResponse {
        let client_data = client_data_json("webauthn.get", origin, challenge);
        let data = auth_data(flags, counter, None);

        let client_data_raw = URL_SAFE_NO_PAD
            .decode(&client_data)
            .expect("client data is base64url");
        let mut signed = data.clone();
        signed.extend_from_slice(digest::digest(&digest::SHA256, &client_data_raw).as_ref());
        let signature = self
            .key_pair
            .sign(&self.rng, &signed)
            .expect("signing");

        let id = self.credential_id_b64();
        serde_json::from_value(json!({
            "id": id,
            "rawId": id,
            "type": "public-key",
            "response": {
                "clientDataJSON": client_data,
                "authenticatorData": b64(&data),
                "signature": b64(signature.as_ref()),
                "userHandle": user_handle
            }
        }))
        .expect("authentication response JSON")
    }
}

/// Registers `authenticator` for `username` and asserts success
pub async fn register(
    coordinator: &PasskeyCoordinator,
    username: &str,
    authenticator: &MockAuthenticator,
) {
    let options = coordinator
        .begin_registration(username)
        .await
        .expect("begin registration");
    let response = authenticator.registration(&options.challenge);
    let outcome = coordinator
        .complete_registration(&options.challenge, &response)
        .await;
    assert!(outcome.is_verified(), "registration failed: {outcome:?}");
}
