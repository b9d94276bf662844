use chrono::Utc;

use crate::passkey::config::PasskeyConfig;
use crate::passkey::errors::PasskeyError;
use crate::passkey::types::{PasskeyCredential, User};
use crate::utils::base64url_decode;

use super::attestation::AttestationObject;
use super::auth_data::AuthenticatorData;
use super::challenge::Challenge;
use super::signature::{SUPPORTED_ALGORITHMS, is_supported_key};
use super::types::{
    AuthenticatorSelection, CredentialDescriptor, PubKeyCredParam, PublicKeyCredentialUserEntity,
    RegistrationOptions, RegistrationResponse, RelyingParty,
};

/// Builds the `navigator.credentials.create()` options for `user`.
///
/// Credentials the user already holds are listed in `excludeCredentials` so the
/// authenticator does not create a second one for the same account.
pub(crate) fn registration_options(
    config: &PasskeyConfig,
    challenge: &Challenge,
    user: &User,
    existing: &[PasskeyCredential],
) -> RegistrationOptions {
    RegistrationOptions {
        challenge: challenge.value.clone(),
        rp: RelyingParty {
            id: config.rp_id.clone(),
            name: config.rp_name.clone(),
        },
        user: PublicKeyCredentialUserEntity {
            id: user.id.as_str().to_string(),
            name: user.name.clone(),
            display_name: user.name.clone(),
        },
        pub_key_cred_params: SUPPORTED_ALGORITHMS
            .iter()
            .map(|alg| PubKeyCredParam::public_key(*alg))
            .collect(),
        timeout: config.timeout.saturating_mul(1000),
        attestation: config.attestation.clone(),
        authenticator_selection: AuthenticatorSelection {
            authenticator_attachment: config.authenticator_attachment.clone(),
            resident_key: config.resident_key.clone(),
            require_resident_key: config.require_resident_key(),
            user_verification: config.user_verification.as_str().to_string(),
        },
        exclude_credentials: existing.iter().map(CredentialDescriptor::from).collect(),
    }
}

/// Extracts the new credential from a registration response whose client data
/// has already been bound.
///
/// 1. Checks the outer envelope (`id`, `rawId`, `type`)
/// 2. Decodes the attestation object and checks its statement structure
/// 3. Parses the authenticator data and checks RP ID hash and flags
/// 4. Requires attested credential data whose credential ID equals `rawId`
/// 5. Requires a public key of a supported algorithm
pub(crate) fn extract_credential(
    config: &PasskeyConfig,
    response: &RegistrationResponse,
    user: &User,
) -> Result<PasskeyCredential, PasskeyError> {
    let credential_id = response.credential_id()?;

    let attestation_bytes = base64url_decode(&response.response.attestation_object).map_err(|e| {
        PasskeyError::MalformedAttestationObject(format!("Failed to decode: {e}"))
    })?;
    let attestation = AttestationObject::parse(&attestation_bytes)?;
    attestation.check_statement()?;

    let auth_data = AuthenticatorData::parse(&attestation.auth_data)?;
    auth_data.verify(&config.rp_id, config.user_verification)?;

    let aaguid = auth_data.aaguid_string();
    let attested = auth_data
        .attested_credential
        .ok_or(PasskeyError::MissingAttestedCredentialData)?;

    if attested.credential_id != credential_id {
        return Err(PasskeyError::InvalidResponse(format!(
            "Credential id in authenticator data ({}) does not match rawId ({})",
            attested.credential_id, credential_id
        )));
    }

    if !is_supported_key(&attested.public_key) {
        return Err(PasskeyError::UnsupportedAlgorithm(
            attested.public_key.algorithm,
        ));
    }

    tracing::debug!(
        "Extracted credential {} (alg {}, aaguid {:?}, fmt {})",
        credential_id,
        attested.public_key.algorithm,
        aaguid,
        attestation.fmt
    );

    let now = Utc::now();
    Ok(PasskeyCredential {
        credential_id,
        user_id: user.id.clone(),
        algorithm: attested.public_key.algorithm,
        public_key: attested.public_key_bytes,
        counter: auth_data.counter,
        transports: response.transports(),
        aaguid,
        created_at: now,
        last_used_at: now,
    })
}
