mod attestation;
mod auth;
mod auth_data;
mod challenge;
mod client_data;
mod cose;
mod register;
mod signature;
mod types;

pub use attestation::{AttestationFormat, AttestationObject};
pub use auth_data::{AttestedCredentialData, AuthenticatorData};
pub use challenge::{Challenge, ChallengeStore};
pub use client_data::{BoundClientData, bind};
pub use cose::{CoseKeyParams, CosePublicKey, cose_alg};
pub use signature::{RingSignatureVerifier, SUPPORTED_ALGORITHMS, SignatureVerifier};

pub use types::{
    AuthenticationOptions, AuthenticationResponse, AuthenticatorAssertionResponse,
    AuthenticatorAttestationResponse, AuthenticatorSelection, CredentialDescriptor,
    PubKeyCredParam, PublicKeyCredentialUserEntity, RegistrationOptions, RegistrationResponse,
    RelyingParty,
};

pub(crate) use auth::{authentication_options, verify_assertion, verify_user_handle};
pub(crate) use register::{extract_credential, registration_options};
