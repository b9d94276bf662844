use passkey_verifier::PasskeyError;

use crate::common::{MockAuthenticator, coordinator, register};

/// Concurrent completions of one registration
///
/// Given one issued registration challenge
/// When the same response is submitted from several tasks at once
/// Then exactly one succeeds and every other sees the challenge as consumed
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_single_winner() {
    let coordinator = coordinator();
    let authenticator = MockAuthenticator::new(&[0xAA, 0xBB]);

    let options = coordinator.begin_registration("alice").await.unwrap();
    let response = authenticator.registration(&options.challenge);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let coordinator = coordinator.clone();
            let challenge = options.challenge.clone();
            let response = response.clone();
            tokio::spawn(async move {
                coordinator
                    .complete_registration(&challenge, &response)
                    .await
            })
        })
        .collect();

    let mut verified = 0;
    for handle in handles {
        let outcome = handle.await.unwrap();
        match outcome.rejection() {
            None => verified += 1,
            Some(error) => assert_eq!(error, &PasskeyError::ChallengeNotOutstanding),
        }
    }

    assert_eq!(verified, 1);
    assert_eq!(coordinator.list_credentials("alice").await.unwrap().len(), 1);
}

/// Two assertions carrying the same counter, each with its own challenge
///
/// The counter compare-and-set lets exactly one through; the other is reported as
/// a possible clone.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_authentication_same_counter() {
    let coordinator = coordinator();
    let authenticator = MockAuthenticator::new(&[0x01, 0x02]);
    register(&coordinator, "alice", &authenticator).await;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let options = coordinator.begin_authentication(Some("alice")).await.unwrap();
        let response = authenticator.assertion(&options.challenge, 7);
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move {
            coordinator
                .complete_authentication(&options.challenge, &response)
                .await
        }));
    }

    let mut verified = 0;
    let mut regressions = 0;
    for handle in handles {
        match handle.await.unwrap().rejection() {
            None => verified += 1,
            Some(PasskeyError::RegressionDetected { received: 7, .. }) => regressions += 1,
            Some(other) => panic!("unexpected rejection: {other:?}"),
        }
    }

    assert_eq!(verified, 1);
    assert_eq!(regressions, 1);
    assert_eq!(
        coordinator.list_credentials("alice").await.unwrap()[0].counter,
        7
    );
}

/// Concurrent registrations of one credential ID for two different users
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_registration() {
    let coordinator = coordinator();
    let authenticator = MockAuthenticator::new(&[0xCC]);

    let mut handles = Vec::new();
    for username in ["alice", "bob"] {
        let options = coordinator.begin_registration(username).await.unwrap();
        let response = authenticator.registration(&options.challenge);
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move {
            coordinator
                .complete_registration(&options.challenge, &response)
                .await
        }));
    }

    let mut verified = 0;
    for handle in handles {
        match handle.await.unwrap().rejection() {
            None => verified += 1,
            Some(error) => assert!(matches!(error, PasskeyError::DuplicateCredential(_))),
        }
    }
    assert_eq!(verified, 1);
}
