// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! AES-256-GCM sealing for session envelopes
//!
//! Matches what Web Crypto's `AES-GCM` produces, so envelopes written by a
//! browser client can be opened here and vice versa:
//!
//! - IV: 12 bytes (96 bits), random per encryption
//! - Ciphertext: encrypted data with the 16-byte tag appended
//! - AAD: the binding metadata (`device_id|origin`)

use aes_gcm::{
    aead::{Aead, Payload},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Result};
use rand::{rngs::OsRng, RngCore};

pub const IV_LEN: usize = 12;

/// Fresh random IV from the OS RNG.
pub fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Encrypt `plaintext` under an initialized cipher.
///
/// # Security
///
/// **CRITICAL**: Never reuse an IV with the same key. Use [`generate_iv`].
pub fn encrypt_aes_gcm(cipher: &Aes256Gcm, iv: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if iv.len() != IV_LEN {
        return Err(anyhow!(
            "Invalid IV size: expected {} bytes, got {}",
            IV_LEN,
            iv.len()
        ));
    }

    cipher
        .encrypt(
            Nonce::from_slice(iv),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| anyhow!("AES-GCM encryption failed: {}", e))
}

/// Decrypt and authenticate `ciphertext` (tag appended).
///
/// # Errors
///
/// Returns error if:
/// - IV is not 12 bytes
/// - Ciphertext is shorter than the 16-byte tag
/// - Authentication fails (wrong key, tampered data, or different AAD)
pub fn decrypt_aes_gcm(cipher: &Aes256Gcm, iv: &[u8], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if iv.len() != IV_LEN {
        return Err(anyhow!(
            "Invalid IV size: expected {} bytes, got {}",
            IV_LEN,
            iv.len()
        ));
    }

    if ciphertext.len() < 16 {
        return Err(anyhow!(
            "Ciphertext too short: expected at least 16 bytes for tag, got {}",
            ciphertext.len()
        ));
    }

    cipher
        .decrypt(
            Nonce::from_slice(iv),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|e| {
            anyhow!(
                "AES-GCM decryption failed (authentication error - wrong key or corrupted data): {}",
                e
            )
        })
}
