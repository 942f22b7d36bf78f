// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Encrypted session persistence
//!
//! One durable slot holds the sealed envelope. `load()` never fails loudly:
//! a session that cannot be opened here, is malformed, or has expired is
//! purged and reported as absent. Storage and crypto-availability failures
//! are logged and also reported as absent, but leave the slot untouched.
//!
//! Every operation that reads the slot and may then write or purge it runs
//! under one lock, so a purge only ever removes the value it inspected.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use super::migration::{LegacySession, MigrationError, MigrationOutcome, MigrationTracker};
use super::types::{now_millis, Session, SessionValidationError};
use crate::crypto::{CryptoError, SessionCipher};
use crate::storage::{slots, SlotStorage, StorageError};

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("Refusing to store invalid session: {0}")]
    Invalid(#[from] SessionValidationError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct SessionStore {
    storage: Arc<dyn SlotStorage>,
    cipher: Arc<SessionCipher>,
    migration: MigrationTracker,
    slot_lock: Mutex<()>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SlotStorage>, cipher: Arc<SessionCipher>) -> Self {
        Self {
            migration: MigrationTracker::new(storage.clone()),
            storage,
            cipher,
            slot_lock: Mutex::new(()),
        }
    }

    pub fn cipher(&self) -> &Arc<SessionCipher> {
        &self.cipher
    }

    pub fn migration(&self) -> &MigrationTracker {
        &self.migration
    }

    /// Seal and persist `session`, replacing whatever was stored.
    pub async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        let _guard = self.slot_lock.lock().await;
        self.write_sealed(session).await
    }

    async fn write_sealed(&self, session: &Session) -> Result<(), SessionStoreError> {
        session.validate()?;

        let device_id = self.cipher.device_id().await?;
        if session.device_id != device_id {
            return Err(CryptoError::DeviceMismatch {
                expected: session.device_id.clone(),
                actual: device_id,
            }
            .into());
        }

        let envelope = self.cipher.encrypt(session).await?;
        self.storage.set(slots::SESSION, &envelope.to_json()?).await?;
        tracing::debug!("Session {} sealed and stored", session.session_id);
        Ok(())
    }

    /// Load, decrypt and validate the stored session.
    pub async fn load(&self) -> Option<Session> {
        let _guard = self.slot_lock.lock().await;
        self.load_locked().await
    }

    /// Caller holds `slot_lock`.
    async fn load_locked(&self) -> Option<Session> {
        let raw = match self.storage.get(slots::SESSION).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return self.migrate_legacy_slot().await,
            Err(e) => {
                tracing::error!("Failed to read session slot: {}", e);
                return None;
            }
        };

        let session = match self.cipher.decrypt_stored(&raw).await {
            Ok(session) => session,
            Err(CryptoError::LegacyFormat { reason }) => {
                tracing::info!("Stored session is not an envelope ({}), trying migration", reason);
                return self.migrate(&raw).await;
            }
            Err(e) if e.invalidates_session() => {
                tracing::warn!("Discarding stored session: {}", e);
                self.purge().await;
                return None;
            }
            Err(e) => {
                tracing::error!("Could not open stored session: {}", e);
                return None;
            }
        };

        if let Err(e) = session.validate() {
            tracing::warn!("Discarding malformed session: {}", e);
            self.purge().await;
            return None;
        }

        if session.is_expired() {
            tracing::info!("⏰ Session {} expired, purging", session.session_id);
            self.purge().await;
            return None;
        }

        Some(session)
    }

    /// Remove the session and its legacy mirror.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.slot_lock.lock().await;
        self.remove_slots().await?;
        tracing::info!("🗑️  Wallet session cleared");
        Ok(())
    }

    async fn remove_slots(&self) -> Result<(), StorageError> {
        self.storage.remove(slots::SESSION).await?;
        self.storage.remove(slots::LEGACY_SESSION).await
    }

    /// Whether anything occupies the session slot, without decrypting it.
    pub async fn has_stored_session(&self) -> bool {
        matches!(self.storage.get(slots::SESSION).await, Ok(Some(_)))
    }

    /// Refresh `last_validated` on the stored session.
    pub async fn touch(&self) -> Result<Option<Session>, SessionStoreError> {
        let _guard = self.slot_lock.lock().await;
        let Some(mut session) = self.load_locked().await else {
            return Ok(None);
        };
        session.last_validated = Some(now_millis());
        self.write_sealed(&session).await?;
        Ok(Some(session))
    }

    /// Push expiry to at least `now + by`. Never shortens a session.
    pub async fn extend(&self, by: Duration) -> Result<Option<Session>, SessionStoreError> {
        let _guard = self.slot_lock.lock().await;
        let Some(mut session) = self.load_locked().await else {
            return Ok(None);
        };
        let requested = now_millis() + by.as_millis() as i64;
        session.expires_at = session.expires_at.max(requested);
        self.write_sealed(&session).await?;
        tracing::info!("Session {} extended to {}", session.session_id, session.expires_at);
        Ok(Some(session))
    }

    /// Foreground check: refresh `last_validated` on a live session, or
    /// empty both slots when none survives. One critical section, so a
    /// session saved concurrently is never purged by a stale check.
    pub async fn revalidate(&self) -> Result<Option<Session>, SessionStoreError> {
        let _guard = self.slot_lock.lock().await;
        match self.load_locked().await {
            Some(mut session) => {
                session.last_validated = Some(now_millis());
                self.write_sealed(&session).await?;
                Ok(Some(session))
            }
            None => {
                self.remove_slots().await?;
                Ok(None)
            }
        }
    }

    async fn purge(&self) {
        for slot in [slots::SESSION, slots::LEGACY_SESSION] {
            if let Err(e) = self.storage.remove(slot).await {
                tracing::error!("Failed to purge slot {}: {}", slot, e);
            }
        }
    }

    async fn migrate_legacy_slot(&self) -> Option<Session> {
        match self.storage.get(slots::LEGACY_SESSION).await {
            Ok(Some(raw)) => self.migrate(&raw).await,
            Ok(None) => None,
            Err(e) => {
                tracing::error!("Failed to read legacy session slot: {}", e);
                None
            }
        }
    }

    async fn migrate(&self, raw: &str) -> Option<Session> {
        match self.migration.already_attempted().await {
            Ok(false) => {}
            Ok(true) => {
                tracing::debug!("{}; discarding legacy value", MigrationError::AlreadyAttempted);
                self.purge().await;
                return None;
            }
            Err(e) => {
                tracing::error!("Failed to read migration status: {}", e);
                return None;
            }
        }

        let device_id = match self.cipher.device_id().await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("Cannot migrate without a device id: {}", e);
                return None;
            }
        };

        let candidate = LegacySession::parse(raw).and_then(|legacy| legacy.validate(&device_id, now_millis()));
        let (outcome, reason, session) = match candidate {
            Ok(session) => match self.write_sealed(&session).await {
                Ok(()) => (MigrationOutcome::Migrated, None, Some(session)),
                Err(e) => (MigrationOutcome::Rejected, Some(e.to_string()), None),
            },
            Err(MigrationError::Expired) => (MigrationOutcome::Expired, None, None),
            Err(e) => (MigrationOutcome::Rejected, Some(e.to_string()), None),
        };

        if let Err(e) = self.migration.record(outcome, reason.clone()).await {
            tracing::error!("Failed to record migration outcome: {}", e);
        }

        match session {
            Some(session) => {
                if let Err(e) = self.storage.remove(slots::LEGACY_SESSION).await {
                    tracing::warn!("Migrated, but legacy slot could not be removed: {}", e);
                }
                tracing::info!("🔐 Legacy session {} migrated to encrypted storage", session.session_id);
                Some(session)
            }
            None => {
                tracing::warn!(
                    "Legacy session not migrated ({:?}{})",
                    outcome,
                    reason.map(|r| format!(": {}", r)).unwrap_or_default()
                );
                self.purge().await;
                None
            }
        }
    }
}
