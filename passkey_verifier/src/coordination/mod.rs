//! Ceremony coordination
//!
//! Composes the challenge store, client data binding, authenticator data parsing
//! and the credential store into the two WebAuthn ceremonies.
//!
//! - `ceremony`: ceremony states and the per-transition trace
//! - `passkey`: the `PasskeyCoordinator` entry points

mod ceremony;
mod passkey;

pub use ceremony::CeremonyState;
pub use passkey::{AuthenticatedUser, CeremonyOutcome, PasskeyCoordinator};
