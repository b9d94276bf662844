mod config;
mod errors;
mod main;
mod storage;
mod types;

pub use config::{PasskeyConfig, UserVerification};
pub use errors::PasskeyError;

pub use main::{
    AttestationFormat, AttestationObject, AttestedCredentialData, AuthenticationOptions,
    AuthenticationResponse, AuthenticatorAssertionResponse, AuthenticatorAttestationResponse,
    AuthenticatorData, AuthenticatorSelection, BoundClientData, Challenge, ChallengeStore,
    CoseKeyParams, CosePublicKey, CredentialDescriptor, PubKeyCredParam,
    PublicKeyCredentialUserEntity, RegistrationOptions, RegistrationResponse, RelyingParty,
    RingSignatureVerifier, SUPPORTED_ALGORITHMS, SignatureVerifier, bind, cose_alg,
};

pub use storage::{
    ChallengeCache, CredentialStore, InMemoryChallengeCache, InMemoryCredentialStore,
    InMemoryUserStore, UserStore,
};

pub use types::{
    AuthenticatorTransport, CeremonyKind, CounterOutcome, CredentialId, PasskeyCredential,
    StoredChallenge, User, UserId,
};

pub(crate) use main::{
    authentication_options, extract_credential, registration_options, verify_assertion,
    verify_user_handle,
};

#[cfg(test)]
pub(crate) use main::test_utils;
