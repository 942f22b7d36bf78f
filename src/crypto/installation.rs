// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Installation-scoped identity material
//!
//! Two lazily-created handles back the device key:
//!
//! - [`DeviceIdentity`]: the device fingerprint, generated once from host
//!   characteristics plus randomness and persisted in the device-id slot
//! - [`InstallSalt`]: 32 random bytes persisted in the salt slot
//!
//! Both are created on first access and never torn down or rotated. They
//! assume a single writer.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::host::HostEnvironment;
use crate::storage::{slots, SlotStorage, StorageError};

pub const SALT_LEN: usize = 32;
const DEVICE_ID_PREFIX: &str = "device_";

pub struct DeviceIdentity {
    storage: Arc<dyn SlotStorage>,
    host: Arc<dyn HostEnvironment>,
    cached: OnceCell<String>,
}

impl DeviceIdentity {
    pub fn new(storage: Arc<dyn SlotStorage>, host: Arc<dyn HostEnvironment>) -> Self {
        Self {
            storage,
            host,
            cached: OnceCell::new(),
        }
    }

    /// The persisted device id, generating it on first use.
    pub async fn device_id(&self) -> Result<String, StorageError> {
        self.cached
            .get_or_try_init(|| self.load_or_generate())
            .await
            .cloned()
    }

    async fn load_or_generate(&self) -> Result<String, StorageError> {
        if let Some(existing) = self.storage.get(slots::DEVICE_ID).await? {
            if is_valid_device_id(&existing) {
                return Ok(existing);
            }
            tracing::warn!("Stored device id is malformed, generating a new one");
        }

        let device_id = generate_device_id(self.host.as_ref());
        self.storage.set(slots::DEVICE_ID, &device_id).await?;
        tracing::info!("🆔 Generated device id {}", device_id);
        Ok(device_id)
    }
}

fn is_valid_device_id(value: &str) -> bool {
    value
        .strip_prefix(DEVICE_ID_PREFIX)
        .map(|rest| rest.len() == 32 && rest.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

fn generate_device_id(host: &dyn HostEnvironment) -> String {
    let mut entropy = [0u8; 16];
    OsRng.fill_bytes(&mut entropy);

    let mut hasher = Sha256::new();
    hasher.update(host.device_traits().fingerprint_material().as_bytes());
    hasher.update(b"|");
    hasher.update(host.user_agent().as_bytes());
    hasher.update(b"|");
    hasher.update(entropy);
    let digest = hasher.finalize();

    format!("{}{}", DEVICE_ID_PREFIX, hex::encode(&digest[..16]))
}

pub struct InstallSalt {
    storage: Arc<dyn SlotStorage>,
    cached: OnceCell<[u8; SALT_LEN]>,
}

impl InstallSalt {
    pub fn new(storage: Arc<dyn SlotStorage>) -> Self {
        Self {
            storage,
            cached: OnceCell::new(),
        }
    }

    pub async fn salt(&self) -> Result<[u8; SALT_LEN], StorageError> {
        self.cached
            .get_or_try_init(|| self.load_or_generate())
            .await
            .copied()
    }

    async fn load_or_generate(&self) -> Result<[u8; SALT_LEN], StorageError> {
        if let Some(encoded) = self.storage.get(slots::INSTALL_SALT).await? {
            match BASE64.decode(encoded.trim()) {
                Ok(bytes) if bytes.len() == SALT_LEN => {
                    let mut salt = [0u8; SALT_LEN];
                    salt.copy_from_slice(&bytes);
                    return Ok(salt);
                }
                // A damaged salt cannot be recovered; sessions sealed with it are lost.
                _ => tracing::warn!("Install salt unreadable, generating a replacement"),
            }
        }

        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        self.storage
            .set(slots::INSTALL_SALT, &BASE64.encode(salt))
            .await?;
        tracing::info!("🧂 Generated install salt");
        Ok(salt)
    }
}
