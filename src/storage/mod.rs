// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod file_storage;
pub mod slot_storage;

pub use file_storage::FileSlotStorage;
pub use slot_storage::{MemorySlotStorage, SlotStorage, StorageError};

/// Names of the durable slots this crate owns.
pub mod slots {
    /// JSON-encoded `EncryptedEnvelope`.
    pub const SESSION: &str = "wallet_session_secure";
    /// Plaintext session written by older clients; read only for migration.
    pub const LEGACY_SESSION: &str = "wallet_session";
    /// Base64 install salt, generated once.
    pub const INSTALL_SALT: &str = "wallet_session_salt";
    /// One-shot legacy migration record.
    pub const MIGRATION_STATUS: &str = "wallet_session_migration";
    /// Persisted device fingerprint.
    pub const DEVICE_ID: &str = "wallet_device_id";
}
