// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Foreground/background revalidation

use crate::common::{sample_session, CountingSigner, Harness, ScriptedVerifier};
use secure_wallet_session::session::VisibilityEvent;
use secure_wallet_session::storage::slots;
use secure_wallet_session::{VisibilitySignal, VisibilityValidator};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

fn harness() -> Harness {
    Harness::new(ScriptedVerifier::default(), CountingSigner::default())
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<VisibilityEvent>) -> VisibilityEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no visibility event within 5s")
        .expect("event channel closed")
}

async fn wait_for_listeners(signal: &VisibilitySignal, expected: usize) {
    for _ in 0..100 {
        if signal.listener_count() == expected {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {} listeners, still have {}",
        expected,
        signal.listener_count()
    );
}

#[tokio::test]
async fn test_background_reports_without_revalidating() {
    let h = harness();
    let signal = VisibilitySignal::new();
    let validator = VisibilityValidator::new(signal.clone(), h.store.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = validator.on_visibility_change(move |e| {
        let _ = tx.send(e);
    });
    validator.start();

    signal.set_hidden(true);
    assert_eq!(
        next_event(&mut rx).await,
        VisibilityEvent {
            visible: false,
            session_valid: true
        }
    );
    validator.stop();
}

#[tokio::test]
async fn test_foreground_with_live_session_is_valid() {
    let h = harness();
    let session = sample_session(&h.cipher, 60_000).await;
    h.store.save(&session).await.unwrap();

    let signal = VisibilitySignal::new();
    let validator = VisibilityValidator::new(signal.clone(), h.store.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = validator.on_visibility_change(move |e| {
        let _ = tx.send(e);
    });
    validator.start();

    signal.set_hidden(true);
    next_event(&mut rx).await;
    signal.set_hidden(false);

    assert_eq!(
        next_event(&mut rx).await,
        VisibilityEvent {
            visible: true,
            session_valid: true
        }
    );
    let reloaded = h.store.load().await.unwrap();
    assert!(reloaded.last_validated.is_some());
    validator.stop();
}

#[tokio::test]
async fn test_session_expiring_in_background_is_invalidated() {
    let h = harness();
    let session = sample_session(&h.cipher, 150).await;
    h.store.save(&session).await.unwrap();

    let signal = VisibilitySignal::new();
    let validator = VisibilityValidator::new(signal.clone(), h.store.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = validator.on_visibility_change(move |e| {
        let _ = tx.send(e);
    });
    validator.start();

    signal.set_hidden(true);
    assert!(!next_event(&mut rx).await.visible);

    // Expires while the user is in the wallet app
    sleep(Duration::from_millis(300)).await;
    signal.set_hidden(false);

    assert_eq!(
        next_event(&mut rx).await,
        VisibilityEvent {
            visible: true,
            session_valid: false
        }
    );
    assert!(!h.storage.contains(slots::SESSION).await);
    assert!(!h.storage.contains(slots::LEGACY_SESSION).await);
    validator.stop();
}

#[tokio::test]
async fn test_dropped_subscription_stops_callbacks() {
    let h = harness();
    let signal = VisibilitySignal::new();
    let validator = VisibilityValidator::new(signal.clone(), h.store.clone());

    let (kept_tx, mut kept_rx) = mpsc::unbounded_channel();
    let (dropped_tx, mut dropped_rx) = mpsc::unbounded_channel::<VisibilityEvent>();
    let _kept = validator.on_visibility_change(move |e| {
        let _ = kept_tx.send(e);
    });
    let dropped = validator.on_visibility_change(move |e| {
        let _ = dropped_tx.send(e);
    });
    assert_eq!(validator.observer_count(), 2);

    dropped.dispose();
    assert_eq!(validator.observer_count(), 1);

    validator.start();
    signal.set_hidden(true);
    next_event(&mut kept_rx).await;

    // The disposed observer's sender was dropped with it
    assert!(dropped_rx.recv().await.is_none());
    validator.stop();
}

#[tokio::test]
async fn test_start_stop_cycles_do_not_leak_listeners() {
    let h = harness();
    let signal = VisibilitySignal::new();
    let validator = VisibilityValidator::new(signal.clone(), h.store.clone());

    for _ in 0..5 {
        validator.start();
        validator.start();
        assert_eq!(signal.listener_count(), 1);
        assert!(validator.is_running());

        validator.stop();
        wait_for_listeners(&signal, 0).await;
    }
    assert!(!validator.is_running());
}

#[tokio::test]
async fn test_dropping_validator_releases_listener() {
    let h = harness();
    let signal = VisibilitySignal::new();
    {
        let validator = VisibilityValidator::new(signal.clone(), h.store.clone());
        validator.start();
        assert_eq!(signal.listener_count(), 1);
    }
    wait_for_listeners(&signal, 0).await;
}

#[tokio::test]
async fn test_revalidate_without_session() {
    let h = harness();
    let validator = VisibilityValidator::new(VisibilitySignal::new(), h.store.clone());
    assert!(!validator.revalidate().await);
}
