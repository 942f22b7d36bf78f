// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Encryption Module
//!
//! Cryptographic primitives that keep a wallet session bound to the device
//! and origin that created it:
//!
//! - **Installation**: persisted device fingerprint and install salt
//! - **Device Key**: PBKDF2-HMAC-SHA256 derivation of a non-extractable AES-256-GCM key
//! - **AES-GCM**: authenticated encryption with binding metadata as AAD
//! - **Session Cipher**: seals/opens sessions as `EncryptedEnvelope`s
//!
//! ## Security Considerations
//!
//! - Key bytes are never exposed; only an initialized cipher is kept
//! - IVs are random per encryption and never reused with a key
//! - Device id and origin are checked before decryption and bound as AAD
//! - A user-agent change is a policy decision (`UserAgentPolicy`)

pub mod aes_gcm;
pub mod device_key;
pub mod error;
pub mod installation;
pub mod session_cipher;

pub use device_key::{ensure_crypto_available, DeviceKey, DeviceKeyDeriver};
pub use error::CryptoError;
pub use installation::{DeviceIdentity, InstallSalt};
pub use session_cipher::{user_agent_hash, EncryptedEnvelope, SessionCipher, UserAgentPolicy};
