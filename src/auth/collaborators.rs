// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! External services the connection flow talks to
//!
//! The nonce issuer and signature verifier are remote; the signer is the
//! user's wallet. All three are injected as trait objects so the flow can be
//! driven by fakes in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A one-time challenge bound server-side to (origin, device id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceChallenge {
    pub nonce: String,
    /// Text the wallet is asked to sign
    pub message: String,
    /// Unix milliseconds
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceRequest {
    pub stake_address: String,
    pub wallet_name: String,
    pub origin: String,
    pub device_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub stake_address: String,
    pub wallet_name: String,
    pub signature: String,
    pub nonce: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub success: bool,
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerificationResult {
    pub fn verified(expires_at: Option<i64>) -> Self {
        Self {
            success: true,
            verified: true,
            expires_at,
            error: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            verified: false,
            expires_at: None,
            error: Some(reason.into()),
        }
    }

    pub fn is_verified(&self) -> bool {
        self.success && self.verified
    }
}

/// Transport or protocol failure talking to a remote collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed service response: {0}")]
    InvalidResponse(String),

    /// The service answered but refused the request; carries its reason verbatim.
    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    #[error("User declined: {0}")]
    Cancelled(String),

    #[error("Signing failed: {0}")]
    Failed(String),
}

const CANCEL_MARKERS: &[&str] = &["cancel", "declin", "denied", "reject", "refused"];

impl SignerError {
    /// Wallets report cancellation in free text; sort it from real failures.
    pub fn from_wallet_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if CANCEL_MARKERS.iter().any(|marker| lower.contains(marker)) {
            SignerError::Cancelled(message)
        } else {
            SignerError::Failed(message)
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, SignerError::Cancelled(_))
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NonceIssuer: Send + Sync {
    async fn generate(&self, request: &NonceRequest) -> Result<NonceChallenge, ServiceError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    async fn verify(&self, request: &VerifyRequest) -> Result<VerificationResult, ServiceError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WalletSigner: Send + Sync {
    async fn sign(&self, address: &str, message: &str) -> Result<String, SignerError>;
}
