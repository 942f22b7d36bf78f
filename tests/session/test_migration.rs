// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Legacy plaintext → encrypted session migration

use crate::common::{CountingSigner, Harness, ScriptedVerifier};
use secure_wallet_session::session::{now_millis, MigrationOutcome};
use secure_wallet_session::storage::slots;
use secure_wallet_session::SlotStorage;

fn harness() -> Harness {
    Harness::new(ScriptedVerifier::default(), CountingSigner::default())
}

fn legacy(expires_at: i64) -> String {
    serde_json::json!({
        "walletName": "eternl",
        "stakeAddress": "stake1legacy",
        "paymentAddress": "addr1legacy",
        "nonce": "old-nonce",
        "sessionId": "session_legacy",
        "expiresAt": expires_at,
        "createdAt": now_millis() - 10_000,
        "platform": "mobile_android",
    })
    .to_string()
}

#[tokio::test]
async fn test_legacy_slot_is_migrated() {
    let h = harness();
    h.storage
        .set(slots::LEGACY_SESSION, &legacy(now_millis() + 60_000))
        .await
        .unwrap();

    let session = h.store.load().await.unwrap();
    assert_eq!(session.stake_address, "stake1legacy");
    assert_eq!(session.wallet_address, "addr1legacy");
    assert_eq!(session.device_id, h.cipher.device_id().await.unwrap());

    // Re-sealed, legacy copy gone, outcome recorded
    let raw = h.storage.get(slots::SESSION).await.unwrap().unwrap();
    assert!(raw.contains("\"ciphertext\""));
    assert!(!h.storage.contains(slots::LEGACY_SESSION).await);
    let record = h.store.migration().status().await.unwrap().unwrap();
    assert_eq!(record.outcome, MigrationOutcome::Migrated);

    // Loads normally from now on
    assert_eq!(h.store.load().await, Some(session));
}

#[tokio::test]
async fn test_plaintext_in_primary_slot_is_migrated() {
    let h = harness();
    h.storage
        .set(slots::SESSION, &legacy(now_millis() + 60_000))
        .await
        .unwrap();

    let session = h.store.load().await.unwrap();
    assert_eq!(session.session_id, "session_legacy");
    assert!(h.cipher.decrypt_stored(&h.storage.get(slots::SESSION).await.unwrap().unwrap()).await.is_ok());
}

#[tokio::test]
async fn test_expired_legacy_is_discarded() {
    let h = harness();
    h.storage
        .set(slots::LEGACY_SESSION, &legacy(now_millis() - 1))
        .await
        .unwrap();

    assert_eq!(h.store.load().await, None);
    assert!(!h.storage.contains(slots::LEGACY_SESSION).await);
    assert!(!h.storage.contains(slots::SESSION).await);
    let record = h.store.migration().status().await.unwrap().unwrap();
    assert_eq!(record.outcome, MigrationOutcome::Expired);
}

#[tokio::test]
async fn test_untrusted_legacy_is_rejected() {
    let h = harness();
    let forged = serde_json::json!({
        "walletName": "eternl",
        "stakeAddress": "addr1notastakeaddress",
        "nonce": "n",
        "expiresAt": now_millis() + 60_000,
    });
    h.storage.set(slots::LEGACY_SESSION, &forged.to_string()).await.unwrap();

    assert_eq!(h.store.load().await, None);
    let record = h.store.migration().status().await.unwrap().unwrap();
    assert_eq!(record.outcome, MigrationOutcome::Rejected);
    assert!(record.reason.unwrap().contains("stakeAddress"));
}

#[tokio::test]
async fn test_migration_is_attempted_only_once() {
    let h = harness();
    h.storage.set(slots::LEGACY_SESSION, "garbage").await.unwrap();
    assert_eq!(h.store.load().await, None);

    // A valid legacy value appearing later is not migrated again
    h.storage
        .set(slots::LEGACY_SESSION, &legacy(now_millis() + 60_000))
        .await
        .unwrap();
    assert_eq!(h.store.load().await, None);
    assert!(!h.storage.contains(slots::LEGACY_SESSION).await);
    assert!(!h.storage.contains(slots::SESSION).await);
}
