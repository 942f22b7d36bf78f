// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Nonce challenge/response with bounded retry
//!
//! Each attempt issues a fresh nonce, has the wallet sign its message and
//! submits the signature for verification. The verifier can lose a race with
//! itself and report the nonce as already consumed; that one class of failure
//! is retried with a new nonce after a fixed backoff. Everything else,
//! including the user closing the wallet prompt, ends the loop immediately.

use std::sync::Arc;
use std::time::Duration;

use super::collaborators::{
    NonceChallenge, NonceIssuer, NonceRequest, SignatureVerifier, VerifyRequest, WalletSigner,
};
use super::short_address;
use crate::config::SecurityConfig;
use crate::crypto::DeviceIdentity;
use crate::error::AuthError;
use crate::host::HostEnvironment;

/// One position in the retry schedule. Index 0 is the first try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub index: u32,
    pub max_retries: u32,
}

impl Attempt {
    /// The full schedule: `max_retries + 1` attempts.
    pub fn schedule(max_retries: u32) -> impl Iterator<Item = Attempt> {
        (0..=max_retries).map(move |index| Attempt { index, max_retries })
    }

    /// 1-based, for logs.
    pub fn number(&self) -> u32 {
        self.index + 1
    }

    pub fn total(&self) -> u32 {
        self.max_retries + 1
    }

    pub fn is_retry(&self) -> bool {
        self.index > 0
    }

    pub fn is_last(&self) -> bool {
        self.index >= self.max_retries
    }
}

/// Progress reported while the challenge runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeEvent {
    GeneratingNonce { attempt: Attempt },
    AwaitingSignature { attempt: Attempt },
    VerifyingSignature { attempt: Attempt },
    /// The previous attempt lost the nonce race; `attempt` is the one about to run.
    Retrying { attempt: Attempt, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeOutcome {
    /// The nonce that was finally verified (and is now consumed).
    pub challenge: NonceChallenge,
    pub signature: String,
    /// Session expiry suggested by the verifier, if any.
    pub expires_at: Option<i64>,
    pub nonces_issued: u32,
}

pub struct NonceChallengeCoordinator {
    issuer: Arc<dyn NonceIssuer>,
    verifier: Arc<dyn SignatureVerifier>,
    signer: Arc<dyn WalletSigner>,
    host: Arc<dyn HostEnvironment>,
    identity: Arc<DeviceIdentity>,
    max_retries: u32,
    backoff: Duration,
}

impl NonceChallengeCoordinator {
    pub fn new(
        issuer: Arc<dyn NonceIssuer>,
        verifier: Arc<dyn SignatureVerifier>,
        signer: Arc<dyn WalletSigner>,
        host: Arc<dyn HostEnvironment>,
        identity: Arc<DeviceIdentity>,
        config: &SecurityConfig,
    ) -> Self {
        Self {
            issuer,
            verifier,
            signer,
            host,
            identity,
            max_retries: config.max_retries,
            backoff: config.retry_backoff(),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn host(&self) -> &Arc<dyn HostEnvironment> {
        &self.host
    }

    /// Ask the issuer for a nonce bound to this origin and device.
    pub async fn generate(&self, stake_address: &str, wallet_name: &str) -> Result<NonceChallenge, AuthError> {
        let request = NonceRequest {
            stake_address: stake_address.to_string(),
            wallet_name: wallet_name.to_string(),
            origin: self.host.origin(),
            device_id: self.identity.device_id().await?,
        };
        tracing::debug!(
            "Generating nonce for {} ({}) on origin {}",
            short_address(stake_address),
            wallet_name,
            request.origin
        );
        Ok(self.issuer.generate(&request).await?)
    }

    /// Run nonce → sign → verify until verified, retrying only on nonce races.
    pub async fn verify_with_retry(
        &self,
        stake_address: &str,
        wallet_name: &str,
        on_event: &(dyn Fn(ChallengeEvent) + Send + Sync),
    ) -> Result<ChallengeOutcome, AuthError> {
        let mut previous_failure: Option<AuthError> = None;

        for attempt in Attempt::schedule(self.max_retries) {
            if let Some(failure) = previous_failure.take() {
                tracing::info!(
                    "🔄 {}, retrying with new nonce ({}/{})",
                    failure,
                    attempt.index,
                    self.max_retries
                );
                on_event(ChallengeEvent::Retrying {
                    attempt,
                    reason: failure.to_string(),
                });
                tokio::time::sleep(self.backoff).await;
            }

            match self.run_attempt(attempt, stake_address, wallet_name, on_event).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_retryable() && !attempt.is_last() => previous_failure = Some(e),
                Err(e) => {
                    if e.is_retryable() {
                        tracing::error!("Verification failed after {} attempts: {}", attempt.total(), e);
                    } else {
                        tracing::warn!("Verification attempt {} failed: {}", attempt.number(), e);
                    }
                    return Err(e);
                }
            }
        }

        // Unreachable: the last attempt always returns
        Err(previous_failure.unwrap_or(AuthError::TooManyAttempts))
    }

    async fn run_attempt(
        &self,
        attempt: Attempt,
        stake_address: &str,
        wallet_name: &str,
        on_event: &(dyn Fn(ChallengeEvent) + Send + Sync),
    ) -> Result<ChallengeOutcome, AuthError> {
        tracing::debug!("Verify attempt {}/{}", attempt.number(), attempt.total());

        on_event(ChallengeEvent::GeneratingNonce { attempt });
        let challenge = self.generate(stake_address, wallet_name).await?;

        on_event(ChallengeEvent::AwaitingSignature { attempt });
        let signature = self.signer.sign(stake_address, &challenge.message).await?;

        on_event(ChallengeEvent::VerifyingSignature { attempt });
        let result = self
            .verifier
            .verify(&VerifyRequest {
                stake_address: stake_address.to_string(),
                wallet_name: wallet_name.to_string(),
                signature: signature.clone(),
                nonce: challenge.nonce.clone(),
            })
            .await?;

        if result.is_verified() {
            tracing::info!("✅ Signature verified for {}", short_address(stake_address));
            return Ok(ChallengeOutcome {
                challenge,
                signature,
                expires_at: result.expires_at,
                nonces_issued: attempt.number(),
            });
        }

        let reason = result
            .error
            .unwrap_or_else(|| "Invalid signature".to_string());
        Err(AuthError::from_verifier_reason(reason))
    }
}
