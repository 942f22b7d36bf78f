// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Wallet Authentication
//!
//! Challenge/response against the nonce issuer and signature verifier, and
//! the orchestrator that turns a verified signature into a stored session.
//!
//! ## Flow
//!
//! 1. Issue a nonce bound to (origin, device id)
//! 2. Wallet signs the nonce message
//! 3. Verifier checks the signature and consumes the nonce
//! 4. On a nonce race, retry with a fresh nonce (bounded)
//! 5. Seal the new session and persist it

pub mod collaborators;
pub mod http;
pub mod nonce;
pub mod orchestrator;

pub use collaborators::{
    NonceChallenge, NonceIssuer, NonceRequest, ServiceError, SignatureVerifier, SignerError, VerificationResult,
    VerifyRequest, WalletSigner,
};
pub use http::HttpAuthClient;
pub use nonce::{Attempt, ChallengeEvent, ChallengeOutcome, NonceChallengeCoordinator};
pub use orchestrator::{ConnectRequest, ConnectionOrchestrator, ConnectionPhase, ConnectionState, SessionStatus};

/// Shorten a stake address for logs: `stake1abcdef…wxyz`.
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 16 {
        return address.to_string();
    }
    let head: String = chars[..12].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}
