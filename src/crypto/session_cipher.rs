// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session envelope encryption
//!
//! A [`Session`] is serialized to JSON, sealed with the device key under a
//! fresh IV, and wrapped in an [`EncryptedEnvelope`] that records where it was
//! sealed. The device id and origin are also bound as AEAD associated data,
//! so rewriting the envelope metadata breaks authentication.
//!
//! ## Decrypt checks (in order)
//!
//! 1. Envelope device id equals the current device id, else `DeviceMismatch`
//! 2. Envelope origin equals the current origin, else `OriginMismatch`
//! 3. User-agent hash, handled by [`UserAgentPolicy`]
//! 4. AEAD open + JSON parse, else `DecryptionFailed`

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::aes_gcm::generate_iv;
use super::device_key::DeviceKeyDeriver;
use super::error::CryptoError;
use super::installation::{DeviceIdentity, InstallSalt};
use crate::config::SecurityConfig;
use crate::host::HostEnvironment;
use crate::session::Session;
use crate::storage::SlotStorage;

/// What to do when the user agent changed since the envelope was sealed.
///
/// Browsers update silently, so the default only logs the drift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserAgentPolicy {
    #[default]
    Warn,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedEnvelope {
    /// Base64 ciphertext with the GCM tag appended
    pub ciphertext: String,
    /// Base64 12-byte IV
    pub iv: String,
    pub device_id: String,
    pub origin: String,
    /// Hex SHA-256 of the user agent at seal time
    pub user_agent_hash: String,
    /// Seal time, Unix milliseconds
    pub timestamp: i64,
}

impl EncryptedEnvelope {
    /// Parse a stored value. Anything that is not an envelope is `LegacyFormat`.
    pub fn parse(raw: &str) -> Result<Self, CryptoError> {
        serde_json::from_str(raw).map_err(|e| CryptoError::LegacyFormat {
            reason: e.to_string(),
        })
    }

    pub fn to_json(&self) -> Result<String, CryptoError> {
        serde_json::to_string(self).map_err(|e| CryptoError::EncryptionFailed {
            reason: format!("envelope serialization failed: {}", e),
        })
    }
}

pub fn user_agent_hash(user_agent: &str) -> String {
    hex::encode(Sha256::digest(user_agent.as_bytes()))
}

fn binding_aad(device_id: &str, origin: &str) -> Vec<u8> {
    format!("{}|{}", device_id, origin).into_bytes()
}

pub struct SessionCipher {
    host: Arc<dyn HostEnvironment>,
    deriver: DeviceKeyDeriver,
    user_agent_policy: UserAgentPolicy,
}

impl SessionCipher {
    /// Wire up identity, salt and key derivation over one slot storage.
    pub fn new(host: Arc<dyn HostEnvironment>, storage: Arc<dyn SlotStorage>, config: &SecurityConfig) -> Self {
        let identity = Arc::new(DeviceIdentity::new(storage.clone(), host.clone()));
        let salt = Arc::new(InstallSalt::new(storage));
        let deriver = DeviceKeyDeriver::new(host.clone(), identity, salt, config.pbkdf2_iterations);
        Self::from_parts(host, deriver, config.user_agent_policy)
    }

    pub fn from_parts(
        host: Arc<dyn HostEnvironment>,
        deriver: DeviceKeyDeriver,
        user_agent_policy: UserAgentPolicy,
    ) -> Self {
        Self {
            host,
            deriver,
            user_agent_policy,
        }
    }

    pub fn with_user_agent_policy(mut self, policy: UserAgentPolicy) -> Self {
        self.user_agent_policy = policy;
        self
    }

    pub fn identity(&self) -> &Arc<DeviceIdentity> {
        self.deriver.identity()
    }

    pub fn host(&self) -> &Arc<dyn HostEnvironment> {
        &self.host
    }

    pub async fn device_id(&self) -> Result<String, CryptoError> {
        Ok(self.identity().device_id().await?)
    }

    pub async fn encrypt(&self, session: &Session) -> Result<EncryptedEnvelope, CryptoError> {
        let key = self.deriver.derive_key().await?;
        let device_id = self.device_id().await?;
        let origin = key.origin().to_string();

        let plaintext = serde_json::to_vec(session).map_err(|e| CryptoError::EncryptionFailed {
            reason: format!("session serialization failed: {}", e),
        })?;

        let iv = generate_iv();
        let ciphertext = key.seal(&iv, &plaintext, &binding_aad(&device_id, &origin))?;

        Ok(EncryptedEnvelope {
            ciphertext: BASE64.encode(ciphertext),
            iv: BASE64.encode(iv),
            device_id,
            origin,
            user_agent_hash: user_agent_hash(&self.host.user_agent()),
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
    }

    pub async fn decrypt(&self, envelope: &EncryptedEnvelope) -> Result<Session, CryptoError> {
        let current_device = self.device_id().await?;
        if envelope.device_id != current_device {
            tracing::warn!("Envelope sealed on a different device, refusing to decrypt");
            return Err(CryptoError::DeviceMismatch {
                expected: envelope.device_id.clone(),
                actual: current_device,
            });
        }

        let current_origin = self.host.origin();
        if envelope.origin != current_origin {
            tracing::warn!(
                "Envelope sealed for origin {}, current origin is {}",
                envelope.origin,
                current_origin
            );
            return Err(CryptoError::OriginMismatch {
                expected: envelope.origin.clone(),
                actual: current_origin,
            });
        }

        if envelope.user_agent_hash != user_agent_hash(&self.host.user_agent()) {
            match self.user_agent_policy {
                UserAgentPolicy::Warn => {
                    tracing::warn!("User agent changed since session was sealed (browser update?), continuing")
                }
                UserAgentPolicy::Reject => return Err(CryptoError::UserAgentMismatch),
            }
        }

        let iv = BASE64.decode(&envelope.iv).map_err(|e| CryptoError::DecryptionFailed {
            reason: format!("iv is not base64: {}", e),
        })?;
        let ciphertext = BASE64
            .decode(&envelope.ciphertext)
            .map_err(|e| CryptoError::DecryptionFailed {
                reason: format!("ciphertext is not base64: {}", e),
            })?;

        let key = self.deriver.derive_key().await?;
        let plaintext = key.open(&iv, &ciphertext, &binding_aad(&envelope.device_id, &envelope.origin))?;

        serde_json::from_slice(&plaintext).map_err(|e| CryptoError::DecryptionFailed {
            reason: format!("decrypted payload is not a session: {}", e),
        })
    }

    /// Decrypt a raw stored value; non-envelopes surface as `LegacyFormat`.
    pub async fn decrypt_stored(&self, raw: &str) -> Result<Session, CryptoError> {
        let envelope = EncryptedEnvelope::parse(raw)?;
        self.decrypt(&envelope).await
    }
}
