// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Legacy plaintext session migration
//!
//! Older clients stored the session as plain JSON. Anything in the session
//! slots that is not an encrypted envelope goes through [`LegacySession`]
//! validation before a single field is trusted; only a structurally valid,
//! unexpired legacy session is re-sealed. The outcome is written once to the
//! migration-status slot so a bad value cannot trigger a migration loop.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use super::types::{generate_session_id, now_millis, Session};
use crate::platform::Platform;
use crate::storage::{slots, SlotStorage, StorageError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    #[error("Legacy session is not valid JSON: {0}")]
    Unparseable(String),

    #[error("Legacy session field '{0}' is missing or invalid")]
    InvalidField(&'static str),

    #[error("Legacy session already expired")]
    Expired,

    #[error("Legacy migration already attempted")]
    AlreadyAttempted,
}

/// The plaintext shape older clients wrote. Every field is optional here;
/// [`LegacySession::validate`] decides what is acceptable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacySession {
    pub wallet_name: Option<String>,
    pub wallet_type: Option<String>,
    pub stake_address: Option<String>,
    pub wallet_address: Option<String>,
    pub payment_address: Option<String>,
    pub nonce: Option<String>,
    pub session_id: Option<String>,
    pub expires_at: Option<i64>,
    pub created_at: Option<i64>,
    pub platform: Option<Platform>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl LegacySession {
    pub fn parse(raw: &str) -> Result<Self, MigrationError> {
        serde_json::from_str(raw).map_err(|e| MigrationError::Unparseable(e.to_string()))
    }

    /// Turn a legacy record into a session bound to `device_id`.
    pub fn validate(&self, device_id: &str, now_ms: i64) -> Result<Session, MigrationError> {
        let stake_address = non_empty(&self.stake_address)
            .filter(|s| s.starts_with("stake"))
            .ok_or(MigrationError::InvalidField("stakeAddress"))?;
        let wallet_name = non_empty(&self.wallet_name).ok_or(MigrationError::InvalidField("walletName"))?;
        let nonce = non_empty(&self.nonce).ok_or(MigrationError::InvalidField("nonce"))?;
        let wallet_address = non_empty(&self.wallet_address)
            .or_else(|| non_empty(&self.payment_address))
            .unwrap_or(stake_address);
        let expires_at = self.expires_at.ok_or(MigrationError::InvalidField("expiresAt"))?;
        if expires_at <= now_ms {
            return Err(MigrationError::Expired);
        }
        let created_at = self.created_at.filter(|c| *c > 0 && *c < expires_at).unwrap_or(now_ms);

        Ok(Session {
            wallet_address: wallet_address.to_string(),
            stake_address: stake_address.to_string(),
            session_id: non_empty(&self.session_id)
                .map(str::to_string)
                .unwrap_or_else(generate_session_id),
            nonce: nonce.to_string(),
            expires_at,
            wallet_type: non_empty(&self.wallet_type).unwrap_or(wallet_name).to_string(),
            wallet_name: wallet_name.to_string(),
            platform: self.platform.unwrap_or_default(),
            device_id: device_id.to_string(),
            created_at,
            last_validated: Some(now_ms),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationOutcome {
    Migrated,
    Rejected,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    pub attempted: bool,
    pub outcome: MigrationOutcome,
    pub at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Lazily-loaded handle over the migration-status slot.
pub struct MigrationTracker {
    storage: Arc<dyn SlotStorage>,
    cached: Mutex<Option<Option<MigrationRecord>>>,
}

impl MigrationTracker {
    pub fn new(storage: Arc<dyn SlotStorage>) -> Self {
        Self {
            storage,
            cached: Mutex::new(None),
        }
    }

    pub async fn status(&self) -> Result<Option<MigrationRecord>, StorageError> {
        let mut cached = self.cached.lock().await;
        if let Some(record) = cached.as_ref() {
            return Ok(record.clone());
        }
        let record = match self.storage.get(slots::MIGRATION_STATUS).await? {
            Some(raw) => serde_json::from_str::<MigrationRecord>(&raw).ok(),
            None => None,
        };
        *cached = Some(record.clone());
        Ok(record)
    }

    pub async fn already_attempted(&self) -> Result<bool, StorageError> {
        Ok(self.status().await?.map(|r| r.attempted).unwrap_or(false))
    }

    pub async fn record(&self, outcome: MigrationOutcome, reason: Option<String>) -> Result<(), StorageError> {
        let record = MigrationRecord {
            attempted: true,
            outcome,
            at: now_millis(),
            reason,
        };
        let raw = serde_json::to_string(&record).map_err(|e| StorageError::Corrupt {
            slot: slots::MIGRATION_STATUS.to_string(),
            reason: e.to_string(),
        })?;
        self.storage.set(slots::MIGRATION_STATUS, &raw).await?;
        *self.cached.lock().await = Some(Some(record));
        tracing::info!("Legacy session migration recorded: {:?}", outcome);
        Ok(())
    }
}
