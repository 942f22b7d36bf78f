// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ConnectionOrchestrator end-to-end flows

use crate::common::{test_host, CountingSigner, Harness, ScriptedVerifier, STAKE};
use secure_wallet_session::auth::VerificationResult;
use secure_wallet_session::session::now_millis;
use secure_wallet_session::storage::slots;
use secure_wallet_session::{
    AuthError, ConnectRequest, ConnectionPhase, MemorySlotStorage, Platform, SessionStatus, SlotStorage,
};
use std::time::Duration;

fn request() -> ConnectRequest {
    ConnectRequest::new(STAKE, "eternl")
        .with_wallet_address("addr1qxy")
        .with_platform(Platform::MobileAndroid)
}

#[tokio::test]
async fn test_connect_walks_the_happy_path() {
    let h = Harness::new(ScriptedVerifier::default(), CountingSigner::default());
    let orchestrator = h.orchestrator();

    let session = orchestrator.connect(&request()).await.unwrap();

    assert_eq!(
        orchestrator.phase_history(),
        vec![
            ConnectionPhase::Idle,
            ConnectionPhase::GeneratingNonce,
            ConnectionPhase::AwaitingSignature,
            ConnectionPhase::VerifyingSignature,
            ConnectionPhase::EncryptingSession,
            ConnectionPhase::Connected,
        ]
    );
    assert_eq!(session.stake_address, STAKE);
    assert_eq!(session.wallet_address, "addr1qxy");
    assert_eq!(session.nonce, "N1");
    assert_eq!(session.platform, Platform::MobileAndroid);
    assert!(session.session_id.starts_with("session_"));

    let state = orchestrator.state();
    assert_eq!(state.phase, ConnectionPhase::Connected);
    assert!(!state.is_encrypting);

    match orchestrator.restore_session().await {
        SessionStatus::Connected(restored) => assert_eq!(restored, session),
        SessionStatus::Disconnected => panic!("session should have been restored"),
    }
}

#[tokio::test]
async fn test_session_lasts_a_day_by_default() {
    let h = Harness::new(ScriptedVerifier::default(), CountingSigner::default());
    let session = h.orchestrator().connect(&request()).await.unwrap();

    let lifetime = session.expires_at - session.created_at;
    assert_eq!(lifetime, 24 * 60 * 60 * 1000);
}

#[tokio::test]
async fn test_verifier_expiry_is_honoured() {
    let expires_at = now_millis() + 3_600_000;
    let h = Harness::new(
        ScriptedVerifier::new(vec![Ok(VerificationResult::verified(Some(expires_at)))]),
        CountingSigner::default(),
    );
    let session = h.orchestrator().connect(&request()).await.unwrap();
    assert_eq!(session.expires_at, expires_at);
}

#[tokio::test]
async fn test_nonce_race_passes_through_retry_phase() {
    let h = Harness::new(
        ScriptedVerifier::new(vec![
            Ok(VerificationResult::failed("Nonce already consumed")),
            Ok(VerificationResult::verified(None)),
        ]),
        CountingSigner::default(),
    );
    let orchestrator = h.orchestrator();
    let session = orchestrator.connect(&request()).await.unwrap();

    let history = orchestrator.phase_history();
    let retry_at = history
        .iter()
        .position(|p| *p == ConnectionPhase::RetryNonce)
        .unwrap();
    assert_eq!(history[retry_at - 1], ConnectionPhase::VerifyingSignature);
    assert_eq!(history[retry_at + 1], ConnectionPhase::GeneratingNonce);
    assert_eq!(history.last(), Some(&ConnectionPhase::Connected));
    assert_eq!(session.nonce, "N2");
    assert_eq!(h.issuer.issued(), 2);
}

#[tokio::test]
async fn test_cancellation_fails_without_retry() {
    let h = Harness::new(ScriptedVerifier::default(), CountingSigner::cancelling());
    let orchestrator = h.orchestrator();

    let err = orchestrator.connect(&request()).await.unwrap_err();
    assert!(err.is_user_cancelled());

    let history = orchestrator.phase_history();
    assert!(!history.contains(&ConnectionPhase::RetryNonce));
    assert!(matches!(history.last(), Some(ConnectionPhase::Failed(_))));
    assert_eq!(h.issuer.issued(), 1);
    assert!(!h.storage.contains(slots::SESSION).await);
}

#[tokio::test]
async fn test_overlapping_connect_is_rejected() {
    let h = Harness::new(
        ScriptedVerifier::default(),
        CountingSigner::slow(Duration::from_millis(300)),
    );
    let orchestrator = h.orchestrator();
    let req = request();

    let (first, second) = tokio::join!(orchestrator.connect(&req), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        orchestrator.connect(&req).await
    });

    assert!(first.is_ok());
    assert!(matches!(second, Err(AuthError::ConnectionInProgress)));
    assert_eq!(h.issuer.issued(), 1);
}

#[tokio::test]
async fn test_progress_is_observable() {
    let h = Harness::new(
        ScriptedVerifier::default(),
        CountingSigner::slow(Duration::from_millis(200)),
    );
    let orchestrator = h.orchestrator();
    let mut rx = orchestrator.subscribe();
    let req = request();

    let (result, saw_awaiting) = tokio::join!(orchestrator.connect(&req), async {
        loop {
            if rx.borrow_and_update().is_awaiting_signature {
                return true;
            }
            if rx.changed().await.is_err() {
                return false;
            }
        }
    });

    assert!(result.is_ok());
    assert!(saw_awaiting);
    assert_eq!(orchestrator.state().max_retries, h.config.max_retries);
}

#[tokio::test]
async fn test_disconnect_purges_and_resets() {
    let h = Harness::new(ScriptedVerifier::default(), CountingSigner::default());
    let orchestrator = h.orchestrator();
    orchestrator.connect(&request()).await.unwrap();

    orchestrator.disconnect().await.unwrap();

    assert_eq!(orchestrator.state().phase, ConnectionPhase::Idle);
    assert_eq!(orchestrator.phase_history(), vec![ConnectionPhase::Idle]);
    assert_eq!(orchestrator.restore_session().await, SessionStatus::Disconnected);
    assert!(!h.storage.contains(slots::SESSION).await);
}

#[tokio::test]
async fn test_insecure_host_fails_before_any_nonce() {
    let h = Harness::with_host(
        test_host().insecure(),
        MemorySlotStorage::new(),
        ScriptedVerifier::default(),
        CountingSigner::default(),
    );
    let orchestrator = h.orchestrator();

    let err = orchestrator.connect(&request()).await.unwrap_err();
    assert!(matches!(err, AuthError::CryptoUnavailable { .. }));
    assert!(err.user_message().contains("HTTPS"));
    assert_eq!(h.issuer.issued(), 0);
    assert!(matches!(orchestrator.state().phase, ConnectionPhase::Failed(_)));
}

#[tokio::test]
async fn test_reconnect_after_failure() {
    let h = Harness::new(
        ScriptedVerifier::new(vec![Ok(VerificationResult::failed("Invalid signature"))]),
        CountingSigner::default(),
    );
    let orchestrator = h.orchestrator();

    let err = orchestrator.connect(&request()).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidSignature));

    // The script is exhausted, so the next attempt verifies
    assert!(orchestrator.connect(&request()).await.is_ok());
    assert_eq!(orchestrator.phase_history().first(), Some(&ConnectionPhase::Idle));
}

#[tokio::test]
async fn test_disconnect_during_signing_abandons_connect() {
    let h = Harness::new(
        ScriptedVerifier::default(),
        CountingSigner::slow(Duration::from_millis(200)),
    );
    let orchestrator = h.orchestrator();
    let req = request();

    let (result, disconnected) = tokio::join!(orchestrator.connect(&req), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        orchestrator.disconnect().await
    });

    assert!(disconnected.is_ok());
    assert!(matches!(result, Err(AuthError::DisconnectedDuringConnect)));
    assert!(!h.storage.contains(slots::SESSION).await);
    assert_eq!(orchestrator.restore_session().await, SessionStatus::Disconnected);
    assert_eq!(orchestrator.state().phase, ConnectionPhase::Idle);

    // A fresh attempt after the disconnect is unaffected
    assert!(orchestrator.connect(&req).await.is_ok());
    assert!(h.storage.contains(slots::SESSION).await);
}
