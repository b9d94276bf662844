use serde::{Deserialize, Serialize};

use crate::passkey::errors::PasskeyError;
use crate::passkey::types::{AuthenticatorTransport, CredentialId, PasskeyCredential};

const PUBLIC_KEY_CREDENTIAL_TYPE: &str = "public-key";

/// Options for `navigator.credentials.create()`.
///
/// The challenge here is the only copy the client gets; the server keeps its own
/// record in the challenge store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOptions {
    pub challenge: String,
    pub rp: RelyingParty,
    pub user: PublicKeyCredentialUserEntity,
    pub pub_key_cred_params: Vec<PubKeyCredParam>,
    /// Milliseconds
    pub timeout: u32,
    pub attestation: String,
    pub authenticator_selection: AuthenticatorSelection,
    pub exclude_credentials: Vec<CredentialDescriptor>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RelyingParty {
    pub id: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PublicKeyCredentialUserEntity {
    /// The user handle, echoed back by discoverable credentials as `userHandle`
    pub id: String,
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PubKeyCredParam {
    #[serde(rename = "type")]
    pub type_: String,
    pub alg: i64,
}

impl PubKeyCredParam {
    pub(crate) fn public_key(alg: i64) -> Self {
        Self {
            type_: PUBLIC_KEY_CREDENTIAL_TYPE.to_string(),
            alg,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<String>,
    pub resident_key: String,
    pub require_resident_key: bool,
    pub user_verification: String,
}

/// A credential reference in `excludeCredentials` / `allowCredentials`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CredentialDescriptor {
    #[serde(rename = "type")]
    pub type_: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transports: Vec<AuthenticatorTransport>,
}

impl From<&PasskeyCredential> for CredentialDescriptor {
    fn from(credential: &PasskeyCredential) -> Self {
        Self {
            type_: PUBLIC_KEY_CREDENTIAL_TYPE.to_string(),
            id: credential.credential_id.to_base64url(),
            transports: credential.transports.clone(),
        }
    }
}

/// Options for `navigator.credentials.get()`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationOptions {
    pub challenge: String,
    /// Milliseconds
    pub timeout: u32,
    pub rp_id: String,
    /// Empty when no username was given, letting the authenticator offer any
    /// discoverable credential for the RP
    pub allow_credentials: Vec<CredentialDescriptor>,
    pub user_verification: String,
}

/// Credential data received from the browser after `navigator.credentials.create()`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub id: String,
    pub raw_id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub response: AuthenticatorAttestationResponse,
    #[serde(default)]
    pub authenticator_attachment: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAttestationResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub attestation_object: String,
    #[serde(default)]
    pub transports: Vec<String>,
}

/// Assertion received from the browser after `navigator.credentials.get()`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResponse {
    pub id: String,
    pub raw_id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub response: AuthenticatorAssertionResponse,
    #[serde(default)]
    pub authenticator_attachment: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAssertionResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub authenticator_data: String,
    pub signature: String,
    #[serde(default)]
    pub user_handle: Option<String>,
}

impl RegistrationResponse {
    /// Checks the outer envelope and returns the decoded `rawId`.
    pub fn credential_id(&self) -> Result<CredentialId, PasskeyError> {
        validate_envelope(&self.id, &self.raw_id, &self.type_)
    }

    pub fn transports(&self) -> Vec<AuthenticatorTransport> {
        self.response
            .transports
            .iter()
            .map(|t| AuthenticatorTransport::from(t.as_str()))
            .collect()
    }
}

impl AuthenticationResponse {
    /// Checks the outer envelope and returns the decoded `rawId`.
    pub fn credential_id(&self) -> Result<CredentialId, PasskeyError> {
        validate_envelope(&self.id, &self.raw_id, &self.type_)
    }
}

fn validate_envelope(id: &str, raw_id: &str, type_: &str) -> Result<CredentialId, PasskeyError> {
    if id.is_empty() {
        return Err(PasskeyError::InvalidResponse(
            "Missing credential id".to_string(),
        ));
    }
    if id != raw_id {
        return Err(PasskeyError::InvalidResponse(
            "Credential id does not match rawId".to_string(),
        ));
    }
    if type_ != PUBLIC_KEY_CREDENTIAL_TYPE {
        return Err(PasskeyError::InvalidResponse(format!(
            "Credential type must be {PUBLIC_KEY_CREDENTIAL_TYPE}, got {type_}"
        )));
    }
    CredentialId::from_base64url(raw_id)
        .map_err(|e| PasskeyError::InvalidResponse(format!("Undecodable rawId: {e}")))
}
