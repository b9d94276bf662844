use std::sync::Arc;

use crate::passkey::{
    AuthenticationOptions, AuthenticationResponse, CeremonyKind, ChallengeCache, ChallengeStore,
    CounterOutcome, CredentialId, CredentialStore, InMemoryChallengeCache,
    InMemoryCredentialStore, InMemoryUserStore, PasskeyConfig, PasskeyCredential, PasskeyError,
    RegistrationOptions, RegistrationResponse, RingSignatureVerifier, SignatureVerifier, User,
    UserStore, authentication_options, bind, extract_credential, registration_options,
    verify_assertion, verify_user_handle,
};
use crate::utils::base64url_decode;

use super::ceremony::{CeremonyState, CeremonyTrace};

/// Result of completing a ceremony.
///
/// A rejection is an expected outcome and carries exactly one error kind; check
/// [`PasskeyError::is_security_event`] to tell a possible cloned authenticator apart
/// from an ordinary failure.
#[derive(Debug, Clone, PartialEq)]
pub enum CeremonyOutcome<T> {
    Verified(T),
    Rejected(PasskeyError),
}

impl<T> CeremonyOutcome<T> {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified(_))
    }

    pub fn verified(&self) -> Option<&T> {
        match self {
            Self::Verified(value) => Some(value),
            Self::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&PasskeyError> {
        match self {
            Self::Verified(_) => None,
            Self::Rejected(error) => Some(error),
        }
    }

    pub fn into_result(self) -> Result<T, PasskeyError> {
        match self {
            Self::Verified(value) => Ok(value),
            Self::Rejected(error) => Err(error),
        }
    }
}

/// The identity proven by a successful authentication.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub user: User,
    pub credential_id: CredentialId,
    /// Counter value reported by the authenticator
    pub counter: u32,
    pub counter_outcome: CounterOutcome,
}

/// Runs registration and authentication ceremonies over injected stores.
///
/// Each `complete_*` call consumes the presented challenge before anything else,
/// so the challenge is gone whatever the outcome.
#[derive(Clone)]
pub struct PasskeyCoordinator {
    config: Arc<PasskeyConfig>,
    challenges: ChallengeStore,
    credentials: Arc<dyn CredentialStore>,
    users: Arc<dyn UserStore>,
    verifier: Arc<dyn SignatureVerifier>,
}

impl PasskeyCoordinator {
    pub fn new(
        config: PasskeyConfig,
        challenge_cache: Arc<dyn ChallengeCache>,
        credentials: Arc<dyn CredentialStore>,
        users: Arc<dyn UserStore>,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Self {
        let challenges = ChallengeStore::new(challenge_cache, &config);
        Self {
            config: Arc::new(config),
            challenges,
            credentials,
            users,
            verifier,
        }
    }

    /// Coordinator over in-memory stores and the ring signature verifier.
    pub fn in_memory(config: PasskeyConfig) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryChallengeCache::new()),
            Arc::new(InMemoryCredentialStore::new()),
            Arc::new(InMemoryUserStore::new()),
            Arc::new(RingSignatureVerifier),
        )
    }

    pub fn config(&self) -> &PasskeyConfig {
        &self.config
    }

    pub fn challenge_store(&self) -> &ChallengeStore {
        &self.challenges
    }

    /// Starts a registration for `username`, creating the user if absent.
    ///
    /// The returned options carry the challenge; the transport layer must hand the
    /// same value back to [`Self::complete_registration`].
    pub async fn begin_registration(
        &self,
        username: &str,
    ) -> Result<RegistrationOptions, PasskeyError> {
        let mut trace = CeremonyTrace::start(CeremonyKind::Registration);
        let username = validate_username(username).map_err(|e| trace.reject(e))?;

        let user = self
            .users
            .get_or_create(username)
            .await
            .map_err(|e| trace.reject(e))?;
        let existing = self
            .credentials
            .find_by_user(&user.id)
            .await
            .map_err(|e| trace.reject(e))?;

        let challenge = self
            .challenges
            .issue_with(CeremonyKind::Registration, Some(user.clone()), Vec::new())
            .await
            .map_err(|e| trace.reject(e))?;
        trace.advance(CeremonyState::ChallengeIssued);

        tracing::info!("Registration started for user {}", user.name);
        Ok(registration_options(
            &self.config,
            &challenge,
            &user,
            &existing,
        ))
    }

    /// Verifies a registration response and stores the new credential.
    pub async fn complete_registration(
        &self,
        challenge: &str,
        response: &RegistrationResponse,
    ) -> CeremonyOutcome<PasskeyCredential> {
        let mut trace = CeremonyTrace::resume(CeremonyKind::Registration);
        match self.finish_registration(challenge, response, &mut trace).await {
            Ok(credential) => {
                trace.advance(CeremonyState::Verified);
                tracing::info!(
                    "Registered credential {} for user {}",
                    credential.credential_id,
                    credential.user_id
                );
                CeremonyOutcome::Verified(credential)
            }
            Err(e) => CeremonyOutcome::Rejected(trace.reject(e)),
        }
    }

    async fn finish_registration(
        &self,
        challenge: &str,
        response: &RegistrationResponse,
        trace: &mut CeremonyTrace,
    ) -> Result<PasskeyCredential, PasskeyError> {
        let stored = self
            .challenges
            .consume_for(challenge, CeremonyKind::Registration)
            .await?;
        let user = stored.user.ok_or_else(|| {
            tracing::warn!("Registration challenge was issued without a pending user");
            PasskeyError::ChallengeNotOutstanding
        })?;

        let challenge_bytes = base64url_decode(challenge)?;
        bind(
            &response.response.client_data_json,
            CeremonyKind::Registration,
            &self.config.origin,
            &challenge_bytes,
        )?;
        trace.advance(CeremonyState::EnvelopeBound);

        let credential = extract_credential(&self.config, response, &user)?;
        trace.advance(CeremonyState::CredentialExtracted);

        if !self.credentials.insert(credential.clone()).await? {
            return Err(PasskeyError::DuplicateCredential(
                credential.credential_id.to_base64url(),
            ));
        }
        trace.advance(CeremonyState::Stored);

        Ok(credential)
    }

    /// Starts an authentication.
    ///
    /// With a username the ceremony is restricted to that user's credentials, which
    /// are disclosed in `allowCredentials`. Without one any registered credential
    /// for this RP is accepted.
    pub async fn begin_authentication(
        &self,
        username: Option<&str>,
    ) -> Result<AuthenticationOptions, PasskeyError> {
        let mut trace = CeremonyTrace::start(CeremonyKind::Authentication);

        let allowed = match username {
            Some(name) => self
                .credentials_for_username(name)
                .await
                .map_err(|e| trace.reject(e))?,
            None => Vec::new(),
        };

        let allowed_ids = allowed.iter().map(|c| c.credential_id.clone()).collect();
        let challenge = self
            .challenges
            .issue_with(CeremonyKind::Authentication, None, allowed_ids)
            .await
            .map_err(|e| trace.reject(e))?;
        trace.advance(CeremonyState::ChallengeIssued);

        Ok(authentication_options(&self.config, &challenge, &allowed))
    }

    async fn credentials_for_username(
        &self,
        username: &str,
    ) -> Result<Vec<PasskeyCredential>, PasskeyError> {
        let username = validate_username(username)?;
        let user = self
            .users
            .find_by_name(username)
            .await?
            .ok_or_else(|| {
                PasskeyError::UnknownCredential(format!("No credentials for user {username}"))
            })?;
        let credentials = self.credentials.find_by_user(&user.id).await?;
        if credentials.is_empty() {
            return Err(PasskeyError::UnknownCredential(format!(
                "No credentials for user {username}"
            )));
        }
        Ok(credentials)
    }

    /// Verifies an assertion and advances the credential's signature counter.
    pub async fn complete_authentication(
        &self,
        challenge: &str,
        response: &AuthenticationResponse,
    ) -> CeremonyOutcome<AuthenticatedUser> {
        let mut trace = CeremonyTrace::resume(CeremonyKind::Authentication);
        match self
            .finish_authentication(challenge, response, &mut trace)
            .await
        {
            Ok(authenticated) => {
                trace.advance(CeremonyState::Verified);
                tracing::info!(
                    "User {} authenticated with credential {}",
                    authenticated.user.name,
                    authenticated.credential_id
                );
                CeremonyOutcome::Verified(authenticated)
            }
            Err(e) => CeremonyOutcome::Rejected(trace.reject(e)),
        }
    }

    async fn finish_authentication(
        &self,
        challenge: &str,
        response: &AuthenticationResponse,
        trace: &mut CeremonyTrace,
    ) -> Result<AuthenticatedUser, PasskeyError> {
        let stored = self
            .challenges
            .consume_for(challenge, CeremonyKind::Authentication)
            .await?;

        let challenge_bytes = base64url_decode(challenge)?;
        let client_data = bind(
            &response.response.client_data_json,
            CeremonyKind::Authentication,
            &self.config.origin,
            &challenge_bytes,
        )?;
        trace.advance(CeremonyState::EnvelopeBound);

        let credential_id = response.credential_id()?;
        if !stored.allowed_credentials.is_empty()
            && !stored.allowed_credentials.contains(&credential_id)
        {
            tracing::warn!(
                "Credential {} is not in the allow list for this challenge",
                credential_id
            );
            return Err(PasskeyError::UnknownCredential(credential_id.to_base64url()));
        }

        let credential = self
            .credentials
            .find_by_id(&credential_id)
            .await?
            .ok_or_else(|| PasskeyError::UnknownCredential(credential_id.to_base64url()))?;
        trace.advance(CeremonyState::CredentialLocated);

        verify_user_handle(response, &credential.user_id)?;

        let auth_data = verify_assertion(
            &self.config,
            &client_data,
            response,
            &credential,
            self.verifier.as_ref(),
        )?;

        let counter_outcome = self
            .credentials
            .update_counter(&credential_id, auth_data.counter)
            .await?;
        if counter_outcome == CounterOutcome::RegressionDetected {
            let stored_counter = self
                .credentials
                .find_by_id(&credential_id)
                .await?
                .map(|c| c.counter)
                .unwrap_or(credential.counter);
            return Err(PasskeyError::RegressionDetected {
                stored: stored_counter,
                received: auth_data.counter,
            });
        }
        trace.advance(CeremonyState::CounterUpdated);

        let user = self
            .users
            .find_by_id(&credential.user_id)
            .await?
            .ok_or_else(|| {
                PasskeyError::Storage(format!(
                    "Owner {} of credential {} not found",
                    credential.user_id, credential_id
                ))
            })?;

        Ok(AuthenticatedUser {
            user,
            credential_id,
            counter: auth_data.counter,
            counter_outcome,
        })
    }

    /// Credentials registered to `username`; empty for an unknown user.
    pub async fn list_credentials(
        &self,
        username: &str,
    ) -> Result<Vec<PasskeyCredential>, PasskeyError> {
        match self.users.find_by_name(username).await? {
            Some(user) => self.credentials.find_by_user(&user.id).await,
            None => Ok(Vec::new()),
        }
    }
}

fn validate_username(username: &str) -> Result<&str, PasskeyError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(PasskeyError::InvalidResponse(
            "Username must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}
