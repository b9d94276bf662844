mod challenge_cache;
mod credential_store;
mod user_store;

pub use challenge_cache::{ChallengeCache, InMemoryChallengeCache};
pub use credential_store::{CredentialStore, InMemoryCredentialStore};
pub use user_store::{InMemoryUserStore, UserStore};
