// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::platform::Platform;

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Unique local session id, e.g. `session_3f2a...`.
pub fn generate_session_id() -> String {
    format!("session_{}", Uuid::new_v4().simple())
}

/// An authenticated wallet session.
///
/// Missing fields deserialize to empty values so that [`Session::validate`]
/// can report exactly which one is absent instead of failing the parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    pub wallet_address: String,
    pub stake_address: String,
    pub session_id: String,
    pub nonce: String,
    /// Unix milliseconds
    pub expires_at: i64,
    pub wallet_type: String,
    pub wallet_name: String,
    pub platform: Platform,
    pub device_id: String,
    /// Unix milliseconds
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_validated: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionValidationError {
    #[error("Session field '{0}' is missing or empty")]
    MissingField(&'static str),

    #[error("Session expiry {expires_at} is not after creation {created_at}")]
    InvalidLifetime { created_at: i64, expires_at: i64 },
}

impl Session {
    /// Structural check: every required field present and a positive lifetime.
    pub fn validate(&self) -> Result<(), SessionValidationError> {
        let required: [(&'static str, &str); 7] = [
            ("walletAddress", self.wallet_address.as_str()),
            ("stakeAddress", self.stake_address.as_str()),
            ("sessionId", self.session_id.as_str()),
            ("nonce", self.nonce.as_str()),
            ("walletType", self.wallet_type.as_str()),
            ("walletName", self.wallet_name.as_str()),
            ("deviceId", self.device_id.as_str()),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(SessionValidationError::MissingField(*name));
        }
        if self.created_at <= 0 {
            return Err(SessionValidationError::MissingField("createdAt"));
        }
        if self.expires_at <= self.created_at {
            return Err(SessionValidationError::InvalidLifetime {
                created_at: self.created_at,
                expires_at: self.expires_at,
            });
        }
        Ok(())
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires_at <= now_ms
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    /// Milliseconds until expiry, zero once expired.
    pub fn remaining_ms(&self) -> i64 {
        (self.expires_at - now_millis()).max(0)
    }
}
