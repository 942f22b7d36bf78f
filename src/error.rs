// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Authentication Error Types
//!
//! [`AuthError`] is what `connect()` and the challenge coordinator return.
//! Lower layers ([`CryptoError`], [`StorageError`], collaborator errors) are
//! folded into it here, and every variant maps through one fixed table to a
//! message that is safe to show the user.
//!
//! ## Error Variants
//!
//! - **CryptoUnavailable**: no secure primitives or no HTTPS (fatal)
//! - **DeviceMismatch** / **OriginMismatch**: session sealed elsewhere (logged out, not a crash)
//! - **DecryptionFailed** / **LegacyFormat**: stored value purged or migrated
//! - **NonceConsumed** / **NonceExpired**: recoverable, bounded retry with a fresh nonce
//! - **UserCancelled**: wallet prompt declined (terminal, no retry)
//! - **RateLimited**: verifier throttling (terminal, wait and retry later)
//! - **NetworkOrVerifierError**: anything else the verifier or transport reported

use thiserror::Error;

use crate::auth::collaborators::{ServiceError, SignerError};
use crate::crypto::CryptoError;
use crate::session::SessionStoreError;
use crate::storage::StorageError;

/// Verifier reasons that mean "the nonce raced us, get a new one".
pub const NONCE_CONSUMED_REASONS: &[&str] = &["Nonce already consumed", "Nonce already used"];
pub const NONCE_EXPIRED_REASON: &str = "Nonce expired";

pub const FALLBACK_USER_MESSAGE: &str = "Connection failed. Please try again.";

/// Substring of a failure reason → message shown to the user. First match wins.
const USER_MESSAGES: &[(&str, &str)] = &[
    (
        "Unauthorized origin",
        "This website is not authorized to connect wallets. Please use the official site.",
    ),
    (
        "Nonce already consumed",
        "Signature verification timeout. Please try connecting again.",
    ),
    (
        "Nonce already used",
        "Signature verification timeout. Please try connecting again.",
    ),
    (
        "Nonce expired",
        "Signature verification timeout. Please try connecting again.",
    ),
    (
        "Rate limit exceeded",
        "Too many connection attempts. Please wait a few minutes before trying again.",
    ),
    (
        "Session encryption failed",
        "Could not save wallet session. Please check that you are using a secure connection (HTTPS).",
    ),
    (
        "Invalid signature",
        "Signature verification failed. Please make sure you signed the correct message.",
    ),
    (
        "Session bound to different device",
        "This session was created on a different device and cannot be used here.",
    ),
    (
        "Session bound to different origin",
        "This session was created on a different website and cannot be used here.",
    ),
    (
        "Too many failed attempts",
        "Too many failed connection attempts. Your wallet has been temporarily locked for security.",
    ),
    (
        "Secure crypto unavailable",
        "Could not save wallet session. Please check that you are using a secure connection (HTTPS).",
    ),
    (
        "User declined",
        "Signature request was cancelled in your wallet.",
    ),
];

/// Look up the user-facing message for a raw failure reason.
pub fn user_message(reason: &str) -> &'static str {
    USER_MESSAGES
        .iter()
        .find(|(key, _)| reason.contains(key))
        .map(|(_, message)| *message)
        .unwrap_or(FALLBACK_USER_MESSAGE)
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Secure crypto unavailable: missing {missing}")]
    CryptoUnavailable { missing: String },

    #[error("Session bound to different device")]
    DeviceMismatch,

    #[error("Session bound to different origin")]
    OriginMismatch,

    #[error("Failed to decrypt session: {reason}")]
    DecryptionFailed { reason: String },

    #[error("Stored session is in legacy format: {reason}")]
    LegacyFormat { reason: String },

    #[error("Session encryption failed: {reason}")]
    SessionEncryptionFailed { reason: String },

    #[error("{reason}")]
    NonceConsumed { reason: String },

    #[error("{reason}")]
    NonceExpired { reason: String },

    #[error("User declined signing: {reason}")]
    UserCancelled { reason: String },

    #[error("Rate limit exceeded: {reason}")]
    RateLimited { reason: String },

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Unauthorized origin")]
    UnauthorizedOrigin,

    #[error("Too many failed attempts")]
    TooManyAttempts,

    #[error("Wallet signing failed: {reason}")]
    SigningFailed { reason: String },

    #[error("{reason}")]
    NetworkOrVerifierError { reason: String },

    #[error("A connection attempt is already in progress")]
    ConnectionInProgress,

    #[error("Wallet disconnected before the connection completed")]
    DisconnectedDuringConnect,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Classify a verifier-reported failure reason.
    pub fn from_verifier_reason(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        if NONCE_CONSUMED_REASONS.iter().any(|r| reason.contains(r)) {
            AuthError::NonceConsumed { reason }
        } else if reason.contains(NONCE_EXPIRED_REASON) {
            AuthError::NonceExpired { reason }
        } else if reason.contains("Rate limit exceeded") {
            AuthError::RateLimited { reason }
        } else if reason.contains("Invalid signature") {
            AuthError::InvalidSignature
        } else if reason.contains("Unauthorized origin") {
            AuthError::UnauthorizedOrigin
        } else if reason.contains("Too many failed attempts") {
            AuthError::TooManyAttempts
        } else {
            AuthError::NetworkOrVerifierError { reason }
        }
    }

    /// Whether a fresh nonce and signature might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuthError::NonceConsumed { .. } | AuthError::NonceExpired { .. }
        )
    }

    pub fn is_user_cancelled(&self) -> bool {
        matches!(self, AuthError::UserCancelled { .. })
    }

    pub fn user_message(&self) -> &'static str {
        user_message(&self.to_string())
    }
}

impl From<CryptoError> for AuthError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::CryptoUnavailable { missing } => AuthError::CryptoUnavailable { missing },
            CryptoError::DeviceMismatch { .. } => AuthError::DeviceMismatch,
            CryptoError::OriginMismatch { .. } => AuthError::OriginMismatch,
            CryptoError::UserAgentMismatch => AuthError::DecryptionFailed {
                reason: "user agent changed".to_string(),
            },
            CryptoError::DecryptionFailed { reason } => AuthError::DecryptionFailed { reason },
            CryptoError::LegacyFormat { reason } => AuthError::LegacyFormat { reason },
            CryptoError::KeyDerivationFailed { reason } | CryptoError::EncryptionFailed { reason } => {
                AuthError::SessionEncryptionFailed { reason }
            }
            CryptoError::Storage(e) => AuthError::Storage(e),
        }
    }
}

impl From<SessionStoreError> for AuthError {
    fn from(err: SessionStoreError) -> Self {
        match err {
            SessionStoreError::Invalid(e) => AuthError::SessionEncryptionFailed { reason: e.to_string() },
            SessionStoreError::Crypto(e) => e.into(),
            SessionStoreError::Storage(e) => AuthError::SessionEncryptionFailed { reason: e.to_string() },
        }
    }
}

impl From<ServiceError> for AuthError {
    fn from(err: ServiceError) -> Self {
        match err {
            // The issuer can reject for the same reasons the verifier does
            ServiceError::Rejected(reason) => AuthError::from_verifier_reason(reason),
            other => AuthError::NetworkOrVerifierError {
                reason: other.to_string(),
            },
        }
    }
}

impl From<SignerError> for AuthError {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::Cancelled(reason) => AuthError::UserCancelled { reason },
            SignerError::Failed(reason) => AuthError::SigningFailed { reason },
        }
    }
}
