// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Top-level connection state machine
//!
//! ```text
//! Idle → GeneratingNonce → AwaitingSignature → VerifyingSignature
//!          ↑                                     ├→ RetryNonce ─┘
//!          └─────────────────────────────────────┴→ EncryptingSession → Connected
//! any non-terminal phase → Failed(reason)
//! ```
//!
//! The current [`ConnectionState`] is published on a `watch` channel so UI
//! code can render progress without polling.
//!
//! `disconnect()` bumps a generation counter. A `connect()` started under an
//! older generation stops publishing phases and never leaves a session behind.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use super::nonce::{ChallengeEvent, ChallengeOutcome, NonceChallengeCoordinator};
use super::short_address;
use crate::config::SecurityConfig;
use crate::crypto::ensure_crypto_available;
use crate::error::AuthError;
use crate::platform::Platform;
use crate::session::{generate_session_id, now_millis, Session, SessionStore};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionPhase {
    #[default]
    Idle,
    GeneratingNonce,
    AwaitingSignature,
    VerifyingSignature,
    RetryNonce,
    EncryptingSession,
    Connected,
    Failed(String),
}

impl ConnectionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionPhase::Connected | ConnectionPhase::Failed(_))
    }

    pub fn is_in_flight(&self) -> bool {
        !self.is_terminal() && *self != ConnectionPhase::Idle
    }

    /// Edges of the state machine.
    pub fn can_transition_to(&self, next: &ConnectionPhase) -> bool {
        use ConnectionPhase::*;
        match (self, next) {
            (Connected | Failed(_), _) => false,
            (_, Failed(_)) => true,
            (Idle, GeneratingNonce) => true,
            (GeneratingNonce, AwaitingSignature) => true,
            (AwaitingSignature, VerifyingSignature) => true,
            (VerifyingSignature, RetryNonce | EncryptingSession) => true,
            (RetryNonce, GeneratingNonce) => true,
            (EncryptingSession, Connected) => true,
            _ => false,
        }
    }
}

/// Snapshot of one `connect()` in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub phase: ConnectionPhase,
    pub is_generating_nonce: bool,
    pub is_awaiting_signature: bool,
    pub is_verifying_signature: bool,
    pub is_encrypting: bool,
    pub retry_attempt: u32,
    pub max_retries: u32,
}

impl ConnectionState {
    pub fn idle(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    fn enter(&mut self, phase: ConnectionPhase) {
        self.is_generating_nonce = phase == ConnectionPhase::GeneratingNonce;
        self.is_awaiting_signature = phase == ConnectionPhase::AwaitingSignature;
        self.is_verifying_signature = phase == ConnectionPhase::VerifyingSignature;
        self.is_encrypting = phase == ConnectionPhase::EncryptingSession;
        self.phase = phase;
    }
}

/// Who is connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub stake_address: String,
    pub wallet_address: String,
    pub wallet_name: String,
    pub wallet_type: String,
    pub platform: Platform,
}

impl ConnectRequest {
    pub fn new(stake_address: impl Into<String>, wallet_name: impl Into<String>) -> Self {
        let stake_address = stake_address.into();
        let wallet_name = wallet_name.into();
        Self {
            wallet_address: stake_address.clone(),
            wallet_type: wallet_name.clone(),
            stake_address,
            wallet_name,
            platform: Platform::default(),
        }
    }

    pub fn with_wallet_address(mut self, address: impl Into<String>) -> Self {
        self.wallet_address = address.into();
        self
    }

    pub fn with_wallet_type(mut self, wallet_type: impl Into<String>) -> Self {
        self.wallet_type = wallet_type.into();
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Connected(Session),
    Disconnected,
}

impl SessionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, SessionStatus::Connected(_))
    }
}

pub struct ConnectionOrchestrator {
    coordinator: NonceChallengeCoordinator,
    store: Arc<SessionStore>,
    config: SecurityConfig,
    state: watch::Sender<ConnectionState>,
    history: Mutex<Vec<ConnectionPhase>>,
    in_flight: tokio::sync::Mutex<()>,
    generation: AtomicU64,
}

impl ConnectionOrchestrator {
    pub fn new(coordinator: NonceChallengeCoordinator, store: Arc<SessionStore>, config: SecurityConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::idle(coordinator.max_retries()));
        Self {
            coordinator,
            store,
            config,
            state,
            history: Mutex::new(vec![ConnectionPhase::Idle]),
            in_flight: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Every phase entered since the last reset, starting with `Idle`.
    pub fn phase_history(&self) -> Vec<ConnectionPhase> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Authenticate the wallet and persist an encrypted session.
    ///
    /// Rejects with `ConnectionInProgress` while another call on this
    /// instance is running, and with `DisconnectedDuringConnect` when
    /// `disconnect()` runs before it finishes.
    pub async fn connect(&self, request: &ConnectRequest) -> Result<Session, AuthError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::warn!("connect() called while another connection is in flight");
            return Err(AuthError::ConnectionInProgress);
        };

        self.reset();
        let generation = self.generation.load(Ordering::SeqCst);
        tracing::info!(
            "🔐 Connecting {} wallet {}",
            request.wallet_name,
            short_address(&request.stake_address)
        );

        match self.run(request, generation).await {
            Ok(session) => {
                self.transition(ConnectionPhase::Connected, None);
                tracing::info!("✅ Wallet connected, session {}", session.session_id);
                Ok(session)
            }
            Err(AuthError::DisconnectedDuringConnect) => {
                tracing::info!("Connection abandoned after disconnect");
                self.reset();
                Err(AuthError::DisconnectedDuringConnect)
            }
            Err(e) => {
                tracing::error!("Wallet connection failed: {}", e);
                self.transition(ConnectionPhase::Failed(e.to_string()), None);
                Err(e)
            }
        }
    }

    async fn run(&self, request: &ConnectRequest, generation: u64) -> Result<Session, AuthError> {
        ensure_crypto_available(self.coordinator.host().as_ref())?;

        let outcome = self
            .coordinator
            .verify_with_retry(&request.stake_address, &request.wallet_name, &|event| {
                if !self.is_stale(generation) {
                    self.on_challenge_event(event)
                }
            })
            .await;
        self.ensure_current(generation)?;
        let outcome = outcome?;

        self.transition(ConnectionPhase::EncryptingSession, None);
        let session = self.build_session(request, &outcome).await?;
        self.ensure_current(generation)?;
        self.store.save(&session).await?;

        // A disconnect that bumped the generation before its clear() may have
        // run while the save was pending.
        if self.is_stale(generation) {
            self.store.clear().await?;
            return Err(AuthError::DisconnectedDuringConnect);
        }
        Ok(session)
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    fn ensure_current(&self, generation: u64) -> Result<(), AuthError> {
        if self.is_stale(generation) {
            return Err(AuthError::DisconnectedDuringConnect);
        }
        Ok(())
    }

    async fn build_session(&self, request: &ConnectRequest, outcome: &ChallengeOutcome) -> Result<Session, AuthError> {
        let now = now_millis();
        let default_expiry = now + self.config.session_duration().as_millis() as i64;
        Ok(Session {
            wallet_address: request.wallet_address.clone(),
            stake_address: request.stake_address.clone(),
            session_id: generate_session_id(),
            nonce: outcome.challenge.nonce.clone(),
            expires_at: outcome.expires_at.filter(|e| *e > now).unwrap_or(default_expiry),
            wallet_type: request.wallet_type.clone(),
            wallet_name: request.wallet_name.clone(),
            platform: request.platform,
            device_id: self.store.cipher().device_id().await?,
            created_at: now,
            last_validated: Some(now),
        })
    }

    /// Load the stored session, if one is still valid here.
    pub async fn restore_session(&self) -> SessionStatus {
        match self.store.load().await {
            Some(session) => {
                tracing::info!("Restored session {}", session.session_id);
                SessionStatus::Connected(session)
            }
            None => SessionStatus::Disconnected,
        }
    }

    /// Purge the session and return to `Idle`, whatever the current phase.
    ///
    /// A `connect()` still in flight is abandoned.
    pub async fn disconnect(&self) -> Result<(), AuthError> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let cleared = self.store.clear().await;
        self.reset();
        tracing::info!("Wallet disconnected");
        cleared.map_err(AuthError::from)
    }

    fn reset(&self) {
        let max_retries = self.coordinator.max_retries();
        self.state.send_replace(ConnectionState::idle(max_retries));
        if let Ok(mut history) = self.history.lock() {
            history.clear();
            history.push(ConnectionPhase::Idle);
        }
    }

    fn on_challenge_event(&self, event: ChallengeEvent) {
        match event {
            ChallengeEvent::GeneratingNonce { attempt } => {
                self.transition(ConnectionPhase::GeneratingNonce, Some(attempt.index))
            }
            ChallengeEvent::AwaitingSignature { attempt } => {
                self.transition(ConnectionPhase::AwaitingSignature, Some(attempt.index))
            }
            ChallengeEvent::VerifyingSignature { attempt } => {
                self.transition(ConnectionPhase::VerifyingSignature, Some(attempt.index))
            }
            ChallengeEvent::Retrying { attempt, .. } => {
                self.transition(ConnectionPhase::RetryNonce, Some(attempt.index))
            }
        }
    }

    fn transition(&self, next: ConnectionPhase, retry_attempt: Option<u32>) {
        let current = self.state.borrow().phase.clone();
        if !current.can_transition_to(&next) {
            tracing::warn!("Unexpected connection transition {:?} → {:?}", current, next);
        }
        tracing::debug!("Connection phase {:?} → {:?}", current, next);

        if let Ok(mut history) = self.history.lock() {
            history.push(next.clone());
        }
        self.state.send_modify(|state| {
            state.enter(next);
            if let Some(attempt) = retry_attempt {
                state.retry_attempt = attempt;
            }
        });
    }
}
