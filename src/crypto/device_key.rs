// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Device-bound key derivation
//!
//! `PBKDF2-HMAC-SHA256(device_id | origin, install_salt, iterations)` produces
//! a 256-bit AES-GCM key. The raw key bytes only exist inside the blocking
//! task that derives them; afterwards the key lives on as an initialized
//! cipher inside [`DeviceKey`] and cannot be read back out.

use aes_gcm::{Aes256Gcm, KeyInit};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::aes_gcm::{decrypt_aes_gcm, encrypt_aes_gcm};
use super::error::CryptoError;
use super::installation::{DeviceIdentity, InstallSalt};
use crate::config::MIN_PBKDF2_ITERATIONS;
use crate::host::{check_security_support, HostEnvironment};

/// Non-extractable session key.
#[derive(Clone)]
pub struct DeviceKey {
    cipher: Arc<Aes256Gcm>,
    origin: String,
}

impl DeviceKey {
    /// Origin the key was derived for.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub(crate) fn seal(&self, iv: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        encrypt_aes_gcm(&self.cipher, iv, plaintext, aad).map_err(|e| CryptoError::EncryptionFailed {
            reason: e.to_string(),
        })
    }

    pub(crate) fn open(&self, iv: &[u8], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        decrypt_aes_gcm(&self.cipher, iv, ciphertext, aad).map_err(|e| CryptoError::DecryptionFailed {
            reason: e.to_string(),
        })
    }
}

impl fmt::Debug for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceKey")
            .field("origin", &self.origin)
            .field("key", &"<non-extractable>")
            .finish()
    }
}

pub struct DeviceKeyDeriver {
    host: Arc<dyn HostEnvironment>,
    identity: Arc<DeviceIdentity>,
    salt: Arc<InstallSalt>,
    iterations: u32,
    cached: Mutex<Option<DeviceKey>>,
}

impl DeviceKeyDeriver {
    pub fn new(
        host: Arc<dyn HostEnvironment>,
        identity: Arc<DeviceIdentity>,
        salt: Arc<InstallSalt>,
        iterations: u32,
    ) -> Self {
        Self {
            host,
            identity,
            salt,
            iterations,
            cached: Mutex::new(None),
        }
    }

    /// Derive (or reuse) the key for the host's current origin.
    pub async fn derive_key(&self) -> Result<DeviceKey, CryptoError> {
        ensure_crypto_available(self.host.as_ref())?;
        if self.iterations < MIN_PBKDF2_ITERATIONS {
            return Err(CryptoError::KeyDerivationFailed {
                reason: format!(
                    "{} PBKDF2 iterations is below the minimum of {}",
                    self.iterations, MIN_PBKDF2_ITERATIONS
                ),
            });
        }

        let origin = self.host.origin();
        let mut cached = self.cached.lock().await;
        if let Some(key) = cached.as_ref() {
            if key.origin == origin {
                return Ok(key.clone());
            }
        }

        let device_id = self.identity.device_id().await?;
        let salt = self.salt.salt().await?;
        let iterations = self.iterations;
        let password = format!("{}|{}", device_id, origin);

        let cipher = tokio::task::spawn_blocking(move || {
            let mut key_bytes = [0u8; 32];
            pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut key_bytes);
            let cipher = Aes256Gcm::new_from_slice(&key_bytes);
            key_bytes.fill(0);
            cipher
        })
        .await
        .map_err(|e| CryptoError::KeyDerivationFailed {
            reason: format!("derivation task failed: {}", e),
        })?
        .map_err(|e| CryptoError::KeyDerivationFailed {
            reason: e.to_string(),
        })?;

        tracing::debug!("🔑 Derived device key ({} PBKDF2 iterations)", iterations);

        let key = DeviceKey {
            cipher: Arc::new(cipher),
            origin,
        };
        *cached = Some(key.clone());
        Ok(key)
    }

    pub fn identity(&self) -> &Arc<DeviceIdentity> {
        &self.identity
    }
}

/// Fail with `CryptoUnavailable` when the host cannot hold encrypted sessions.
pub fn ensure_crypto_available(host: &dyn HostEnvironment) -> Result<(), CryptoError> {
    let support = check_security_support(host);
    if support.supported {
        Ok(())
    } else {
        Err(CryptoError::CryptoUnavailable {
            missing: support.missing.join(", "),
        })
    }
}
