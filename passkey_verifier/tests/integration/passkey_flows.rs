use std::time::Duration;

use passkey_verifier::{
    CounterOutcome, PasskeyCoordinator, PasskeyError, UserVerification,
};

use crate::common::{
    FLAG_UP, MockAuthenticator, ORIGIN, b64, coordinator, init_tracing, register, test_config,
};

/// Scenario A: happy-path registration
///
/// Given a fresh coordinator and a challenge issued for alice
/// When a registration response carrying credential ID 0xAABB is completed
/// Then the credential is stored under alice and the challenge is gone
#[tokio::test]
async fn test_registration_happy_path() {
    let coordinator = coordinator();
    let authenticator = MockAuthenticator::new(&[0xAA, 0xBB]);

    let options = coordinator.begin_registration("alice").await.unwrap();
    let challenge = options.challenge.clone();
    assert!(
        coordinator
            .challenge_store()
            .is_outstanding(&challenge)
            .await
            .unwrap()
    );

    let outcome = coordinator
        .complete_registration(&challenge, &authenticator.registration(&challenge))
        .await;

    let credential = outcome.into_result().unwrap();
    assert_eq!(credential.credential_id.as_bytes(), &[0xAA, 0xBB]);
    assert_eq!(credential.public_key, authenticator.cose_key_bytes());
    assert_eq!(credential.user_id.as_str(), options.user.id);

    let stored = coordinator.list_credentials("alice").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].credential_id, credential.credential_id);

    assert!(
        !coordinator
            .challenge_store()
            .is_outstanding(&challenge)
            .await
            .unwrap()
    );
}

/// Scenario B: replaying an accepted registration
#[tokio::test]
async fn test_registration_replay_rejected() {
    let coordinator = coordinator();
    let authenticator = MockAuthenticator::new(&[0xAA, 0xBB]);

    let options = coordinator.begin_registration("alice").await.unwrap();
    let response = authenticator.registration(&options.challenge);

    let first = coordinator
        .complete_registration(&options.challenge, &response)
        .await;
    assert!(first.is_verified());

    let replay = coordinator
        .complete_registration(&options.challenge, &response)
        .await;
    assert_eq!(
        replay.rejection(),
        Some(&PasskeyError::ChallengeNotOutstanding)
    );
}

/// Scenario C: origin mismatch still consumes the challenge
#[tokio::test]
async fn test_origin_mismatch_consumes_challenge() {
    let coordinator = coordinator();
    let authenticator = MockAuthenticator::new(&[0xAA, 0xBB]);

    let options = coordinator.begin_registration("alice").await.unwrap();
    let bad = authenticator.registration_with(
        &options.challenge,
        "webauthn.create",
        "https://evil.example.com",
    );

    let outcome = coordinator
        .complete_registration(&options.challenge, &bad)
        .await;
    assert!(matches!(
        outcome.rejection(),
        Some(PasskeyError::OriginMismatch { .. })
    ));

    // A correct response for the same challenge is now too late
    let good = authenticator.registration(&options.challenge);
    let retry = coordinator
        .complete_registration(&options.challenge, &good)
        .await;
    assert_eq!(
        retry.rejection(),
        Some(&PasskeyError::ChallengeNotOutstanding)
    );
    assert!(coordinator.list_credentials("alice").await.unwrap().is_empty());
}

/// Scenario D: the same credential ID cannot be registered to a second user
#[tokio::test]
async fn test_duplicate_credential_across_users() {
    let coordinator = coordinator();
    let authenticator = MockAuthenticator::new(&[0xAA, 0xBB]);
    register(&coordinator, "alice", &authenticator).await;

    let options = coordinator.begin_registration("bob").await.unwrap();
    let outcome = coordinator
        .complete_registration(
            &options.challenge,
            &authenticator.registration(&options.challenge),
        )
        .await;

    assert!(matches!(
        outcome.rejection(),
        Some(PasskeyError::DuplicateCredential(id)) if id == &b64([0xAA, 0xBB])
    ));
    assert!(coordinator.list_credentials("bob").await.unwrap().is_empty());
    assert_eq!(coordinator.list_credentials("alice").await.unwrap().len(), 1);
}

/// Scenario E: a counter that does not advance is treated as a cloned authenticator
///
/// Given a credential whose stored counter is 10
/// When an assertion with a valid signature reports counter 10
/// Then the authentication is rejected as a security event
#[tokio::test]
async fn test_counter_regression_detected() {
    let coordinator = coordinator();
    let authenticator = MockAuthenticator::new(&[0xAA, 0xBB]);
    register(&coordinator, "alice", &authenticator).await;

    let options = coordinator.begin_authentication(Some("alice")).await.unwrap();
    let response = authenticator.assertion(&options.challenge, 10);
    let first = coordinator
        .complete_authentication(&options.challenge, &response)
        .await;
    assert_eq!(
        first.verified().map(|u| u.counter_outcome),
        Some(CounterOutcome::Accepted)
    );

    let options = coordinator.begin_authentication(Some("alice")).await.unwrap();
    let response = authenticator.assertion(&options.challenge, 10);
    let second = coordinator
        .complete_authentication(&options.challenge, &response)
        .await;

    let error = second.rejection().unwrap();
    assert_eq!(
        error,
        &PasskeyError::RegressionDetected {
            stored: 10,
            received: 10
        }
    );
    assert!(error.is_security_event());

    let stored = coordinator.list_credentials("alice").await.unwrap();
    assert_eq!(stored[0].counter, 10);
}

#[tokio::test]
async fn test_counter_lower_than_stored_rejected() {
    let coordinator = coordinator();
    let authenticator = MockAuthenticator::new(&[0x01]);
    register(&coordinator, "alice", &authenticator).await;

    for (counter, verified) in [(5, true), (3, false), (0, false), (6, true)] {
        let options = coordinator.begin_authentication(None).await.unwrap();
        let outcome = coordinator
            .complete_authentication(
                &options.challenge,
                &authenticator.assertion(&options.challenge, counter),
            )
            .await;
        assert_eq!(outcome.is_verified(), verified, "counter {counter}");
    }
}

/// Authenticators that never increment report 0 every time and are accepted
#[tokio::test]
async fn test_zero_counter_authenticator() {
    let coordinator = coordinator();
    let authenticator = MockAuthenticator::new(&[0x02]);
    register(&coordinator, "alice", &authenticator).await;

    for _ in 0..3 {
        let options = coordinator.begin_authentication(None).await.unwrap();
        let outcome = coordinator
            .complete_authentication(
                &options.challenge,
                &authenticator.assertion(&options.challenge, 0),
            )
            .await;
        let user = outcome.into_result().unwrap();
        assert_eq!(user.counter_outcome, CounterOutcome::Unchanged);
    }
}

/// Username-less authentication with a user handle, as with discoverable credentials
#[tokio::test]
async fn test_discoverable_authentication_with_user_handle() {
    let coordinator = coordinator();
    let authenticator = MockAuthenticator::new(&[0x03, 0x04]);

    let registration = coordinator.begin_registration("carol").await.unwrap();
    let user_handle = registration.user.id.clone();
    coordinator
        .complete_registration(
            &registration.challenge,
            &authenticator.registration(&registration.challenge),
        )
        .await
        .into_result()
        .unwrap();

    let options = coordinator.begin_authentication(None).await.unwrap();
    assert!(options.allow_credentials.is_empty());

    let response = authenticator.assertion_with(
        &options.challenge,
        1,
        FLAG_UP,
        ORIGIN,
        Some(&user_handle),
    );
    let outcome = coordinator
        .complete_authentication(&options.challenge, &response)
        .await;

    let authenticated = outcome.into_result().unwrap();
    assert_eq!(authenticated.user.name, "carol");
    assert_eq!(authenticated.credential_id.as_bytes(), &[0x03, 0x04]);
    assert_eq!(authenticated.counter, 1);
}

#[tokio::test]
async fn test_user_handle_mismatch_rejected() {
    let coordinator = coordinator();
    let authenticator = MockAuthenticator::new(&[0x05]);
    register(&coordinator, "alice", &authenticator).await;

    let options = coordinator.begin_authentication(None).await.unwrap();
    let response = authenticator.assertion_with(
        &options.challenge,
        1,
        FLAG_UP,
        ORIGIN,
        Some(&b64(b"somebody else")),
    );
    let outcome = coordinator
        .complete_authentication(&options.challenge, &response)
        .await;
    assert!(matches!(
        outcome.rejection(),
        Some(PasskeyError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_unknown_credential_rejected() {
    let coordinator = coordinator();
    register(&coordinator, "alice", &MockAuthenticator::new(&[0x06])).await;

    let stranger = MockAuthenticator::new(&[0x07]);
    let options = coordinator.begin_authentication(None).await.unwrap();
    let outcome = coordinator
        .complete_authentication(&options.challenge, &stranger.assertion(&options.challenge, 1))
        .await;
    assert!(matches!(
        outcome.rejection(),
        Some(PasskeyError::UnknownCredential(_))
    ));
}

/// A valid signature from a different key is rejected
#[tokio::test]
async fn test_signature_from_wrong_key_rejected() {
    let coordinator = coordinator();
    register(&coordinator, "alice", &MockAuthenticator::new(&[0x08])).await;

    // Same credential ID, different private key
    let impostor = MockAuthenticator::new(&[0x08]);
    let options = coordinator.begin_authentication(None).await.unwrap();
    let outcome = coordinator
        .complete_authentication(&options.challenge, &impostor.assertion(&options.challenge, 1))
        .await;
    assert!(matches!(
        outcome.rejection(),
        Some(PasskeyError::SignatureInvalid(_))
    ));

    let stored = coordinator.list_credentials("alice").await.unwrap();
    assert_eq!(stored[0].counter, 0);
}

#[tokio::test]
async fn test_ceremony_type_mismatch() {
    let coordinator = coordinator();
    let authenticator = MockAuthenticator::new(&[0x09]);

    let options = coordinator.begin_registration("alice").await.unwrap();
    let response =
        authenticator.registration_with(&options.challenge, "webauthn.get", ORIGIN);
    let outcome = coordinator
        .complete_registration(&options.challenge, &response)
        .await;
    assert!(matches!(
        outcome.rejection(),
        Some(PasskeyError::TypeMismatch { .. })
    ));
}

/// Client data signed over a different challenge than the one presented
#[tokio::test]
async fn test_challenge_mismatch() {
    let coordinator = coordinator();
    let authenticator = MockAuthenticator::new(&[0x0A]);
    register(&coordinator, "alice", &authenticator).await;

    let first = coordinator.begin_authentication(None).await.unwrap();
    let second = coordinator.begin_authentication(None).await.unwrap();

    let outcome = coordinator
        .complete_authentication(&second.challenge, &authenticator.assertion(&first.challenge, 1))
        .await;
    assert_eq!(outcome.rejection(), Some(&PasskeyError::ChallengeMismatch));

    // The first challenge is untouched and still usable
    let outcome = coordinator
        .complete_authentication(&first.challenge, &authenticator.assertion(&first.challenge, 1))
        .await;
    assert!(outcome.is_verified());
}

#[tokio::test]
async fn test_user_verification_required() {
    init_tracing();
    let config = test_config().with_user_verification(UserVerification::Required);
    let coordinator = PasskeyCoordinator::in_memory(config);
    let authenticator = MockAuthenticator::new(&[0x0B]);
    register(&coordinator, "alice", &authenticator).await;

    let options = coordinator.begin_authentication(None).await.unwrap();
    assert_eq!(options.user_verification, "required");

    let response = authenticator.assertion_with(&options.challenge, 1, FLAG_UP, ORIGIN, None);
    let outcome = coordinator
        .complete_authentication(&options.challenge, &response)
        .await;
    assert_eq!(
        outcome.rejection(),
        Some(&PasskeyError::UserVerificationRequired)
    );
}

#[tokio::test]
async fn test_expired_challenge_rejected() {
    init_tracing();
    let config = test_config().with_challenge_timeout(0);
    let coordinator = PasskeyCoordinator::in_memory(config);
    let authenticator = MockAuthenticator::new(&[0x0C]);

    let options = coordinator.begin_registration("alice").await.unwrap();
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let outcome = coordinator
        .complete_registration(&options.challenge, &authenticator.registration(&options.challenge))
        .await;
    assert!(matches!(
        outcome.rejection(),
        Some(PasskeyError::ChallengeExpired { ttl: 0, .. })
    ));
    assert!(
        !coordinator
            .challenge_store()
            .is_outstanding(&options.challenge)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_never_issued_challenge() {
    let coordinator = coordinator();
    let authenticator = MockAuthenticator::new(&[0x0D]);
    let challenge = b64([1u8; 32]);

    let outcome = coordinator
        .complete_registration(&challenge, &authenticator.registration(&challenge))
        .await;
    assert_eq!(
        outcome.rejection(),
        Some(&PasskeyError::ChallengeNotOutstanding)
    );
}
