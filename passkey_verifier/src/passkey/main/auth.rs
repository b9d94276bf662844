use crate::passkey::config::PasskeyConfig;
use crate::passkey::errors::PasskeyError;
use crate::passkey::types::{PasskeyCredential, UserId};
use crate::utils::base64url_decode;

use super::auth_data::AuthenticatorData;
use super::challenge::Challenge;
use super::client_data::BoundClientData;
use super::signature::SignatureVerifier;
use super::types::{AuthenticationOptions, AuthenticationResponse, CredentialDescriptor};

/// Builds the `navigator.credentials.get()` options.
///
/// `allowed` is empty for a username-less ceremony.
pub(crate) fn authentication_options(
    config: &PasskeyConfig,
    challenge: &Challenge,
    allowed: &[PasskeyCredential],
) -> AuthenticationOptions {
    AuthenticationOptions {
        challenge: challenge.value.clone(),
        timeout: config.timeout.saturating_mul(1000),
        rp_id: config.rp_id.clone(),
        allow_credentials: allowed.iter().map(CredentialDescriptor::from).collect(),
        user_verification: config.user_verification.as_str().to_string(),
    }
}

/// Verifies that the user handle in the response, if any, names the credential owner.
///
/// Both values are compared as decoded bytes when they are base64url, which is
/// how browsers transport the handle.
pub(crate) fn verify_user_handle(
    response: &AuthenticationResponse,
    owner: &UserId,
) -> Result<(), PasskeyError> {
    let Some(handle) = response.response.user_handle.as_deref() else {
        tracing::debug!("No user handle provided");
        return Ok(());
    };

    if handle.is_empty() {
        tracing::debug!("Empty user handle provided");
        return Ok(());
    }

    let matches = match (base64url_decode(handle), base64url_decode(owner.as_str())) {
        (Ok(received), Ok(expected)) => received == expected,
        _ => handle == owner.as_str(),
    };

    if !matches {
        tracing::warn!("User handle mismatch: {} != {}", handle, owner);
        return Err(PasskeyError::InvalidResponse(
            "User handle does not match credential owner".to_string(),
        ));
    }

    tracing::debug!("User handle verified successfully");
    Ok(())
}

/// Verifies the assertion against the stored credential.
///
/// 1. Parses the authenticator data and checks RP ID hash and flags
/// 2. Verifies the signature over `authenticatorData || SHA-256(clientDataJSON)`
///
/// Returns the parsed authenticator data so the caller can advance the counter.
pub(crate) fn verify_assertion(
    config: &PasskeyConfig,
    client_data: &BoundClientData,
    response: &AuthenticationResponse,
    credential: &PasskeyCredential,
    verifier: &dyn SignatureVerifier,
) -> Result<AuthenticatorData, PasskeyError> {
    let raw_auth_data = base64url_decode(&response.response.authenticator_data).map_err(|e| {
        PasskeyError::InvalidResponse(format!("Undecodable authenticator data: {e}"))
    })?;
    let auth_data = AuthenticatorData::parse(&raw_auth_data)?;
    auth_data.verify(&config.rp_id, config.user_verification)?;

    let signature = base64url_decode(&response.response.signature)
        .map_err(|e| PasskeyError::InvalidResponse(format!("Undecodable signature: {e}")))?;

    let mut signed_data = Vec::with_capacity(auth_data.raw().len() + 32);
    signed_data.extend_from_slice(auth_data.raw());
    signed_data.extend_from_slice(&client_data.hash());

    tracing::debug!(
        "Signed data length: {}, signature length: {}",
        signed_data.len(),
        signature.len()
    );

    if !verifier.verify(
        credential.algorithm,
        &credential.public_key,
        &signed_data,
        &signature,
    ) {
        return Err(PasskeyError::SignatureInvalid(format!(
            "Assertion signature does not verify for credential {}",
            credential.credential_id
        )));
    }

    tracing::debug!("Signature verification successful");
    Ok(auth_data)
}
