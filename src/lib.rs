// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod host;
pub mod platform;
pub mod session;
pub mod storage;

// Re-export the types most embedders need
pub use auth::{
    ConnectRequest, ConnectionOrchestrator, ConnectionPhase, ConnectionState, HttpAuthClient, NonceChallengeCoordinator,
    NonceIssuer, SessionStatus, SignatureVerifier, WalletSigner,
};
pub use config::SecurityConfig;
pub use crypto::{CryptoError, DeviceIdentity, EncryptedEnvelope, SessionCipher, UserAgentPolicy};
pub use error::{user_message, AuthError};
pub use host::{check_security_support, HostEnvironment, StaticHost, VisibilitySignal, VisibilityState};
pub use platform::{DeepLinkProbe, Platform, PlatformInfo, PlatformProbe, WalletType};
pub use session::{Session, SessionStore, VisibilityValidator};
pub use storage::{FileSlotStorage, MemorySlotStorage, SlotStorage, StorageError};
