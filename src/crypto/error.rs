// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Crypto Error Types
//!
//! Errors raised while deriving the device key or sealing/opening a session
//! envelope.
//!
//! ## Error Variants
//!
//! - **CryptoUnavailable**: host has no secure primitives or no secure context (fatal)
//! - **DeviceMismatch** / **OriginMismatch**: envelope was sealed elsewhere; session is invalid here
//! - **UserAgentMismatch**: only raised under `UserAgentPolicy::Reject`
//! - **DecryptionFailed**: envelope parsed but could not be opened (tampered, wrong key, garbage)
//! - **LegacyFormat**: stored value is not an envelope at all; candidate for migration
//! - **KeyDerivationFailed** / **EncryptionFailed**: primitive failures
//! - **Storage**: the salt or device-id slot could not be read or written

use crate::storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Secure crypto unavailable: missing {missing}")]
    CryptoUnavailable { missing: String },

    #[error("Session bound to different device (expected {expected}, current {actual})")]
    DeviceMismatch { expected: String, actual: String },

    #[error("Session bound to different origin (expected {expected}, current {actual})")]
    OriginMismatch { expected: String, actual: String },

    #[error("Session bound to different user agent")]
    UserAgentMismatch,

    #[error("Failed to decrypt session: {reason}")]
    DecryptionFailed { reason: String },

    #[error("Stored session is not an encrypted envelope: {reason}")]
    LegacyFormat { reason: String },

    #[error("Key derivation failed: {reason}")]
    KeyDerivationFailed { reason: String },

    #[error("Session encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CryptoError {
    /// Errors that mean "this stored session cannot be used here" rather than
    /// "something is broken". Callers treat them as logged-out.
    pub fn invalidates_session(&self) -> bool {
        matches!(
            self,
            CryptoError::DeviceMismatch { .. }
                | CryptoError::OriginMismatch { .. }
                | CryptoError::UserAgentMismatch
                | CryptoError::DecryptionFailed { .. }
        )
    }
}
