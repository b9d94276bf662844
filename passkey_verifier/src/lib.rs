//! passkey-verifier - server-side WebAuthn/Passkey ceremony verification
//!
//! This crate verifies registration and authentication ceremonies: it issues
//! single-use challenges, binds the client's signed envelope to them, parses
//! authenticator data and attestation objects, and tracks signature counters to
//! detect cloned authenticators. Transport, sessions and persistence backends are
//! left to the caller through the store traits.

mod coordination;
mod passkey;
mod utils;

pub use coordination::{AuthenticatedUser, CeremonyOutcome, CeremonyState, PasskeyCoordinator};

pub use passkey::{
    AttestationFormat, AttestationObject, AttestedCredentialData, AuthenticationOptions,
    AuthenticationResponse, AuthenticatorAssertionResponse, AuthenticatorAttestationResponse,
    AuthenticatorData, AuthenticatorSelection, AuthenticatorTransport, BoundClientData,
    CeremonyKind, Challenge, ChallengeCache, ChallengeStore, CoseKeyParams, CosePublicKey,
    CounterOutcome, CredentialDescriptor, CredentialId, CredentialStore, InMemoryChallengeCache,
    InMemoryCredentialStore, InMemoryUserStore, PasskeyConfig, PasskeyCredential, PasskeyError,
    PubKeyCredParam, PublicKeyCredentialUserEntity, RegistrationOptions, RegistrationResponse,
    RelyingParty, RingSignatureVerifier, SUPPORTED_ALGORITHMS, SignatureVerifier, StoredChallenge,
    User, UserId, UserStore, UserVerification, bind, cose_alg,
};

pub use utils::UtilError;
