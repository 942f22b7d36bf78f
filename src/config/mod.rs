// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Security tunables
//!
//! Every knob the authentication flow uses lives here. The defaults are the
//! production values; tests and embedders can override them through
//! [`SecurityConfig::from_toml_str`] or by building the struct directly.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::crypto::UserAgentPolicy;

/// PBKDF2 floor. Anything lower is rejected by [`SecurityConfig::validate`].
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

/// Sessions live for 24 hours after verification.
pub const DEFAULT_SESSION_DURATION_MS: u64 = 24 * 60 * 60 * 1000;

/// Extra verification attempts after the first (3 attempts total).
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Hard ceiling on retries.
pub const MAX_ALLOWED_RETRIES: u32 = 5;

pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1_000;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 1_500;
pub const DEFAULT_OPEN_WALLET_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PBKDF2 iterations too low: {actual} (minimum {minimum})")]
    IterationsTooLow { actual: u32, minimum: u32 },

    #[error("Session duration must be greater than zero")]
    ZeroSessionDuration,

    #[error("Retry bound {actual} exceeds maximum of {maximum}")]
    TooManyRetries { actual: u32, maximum: u32 },

    #[error("Failed to parse security config: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub pbkdf2_iterations: u32,
    pub session_duration_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub probe_timeout_ms: u64,
    pub open_wallet_timeout_ms: u64,
    pub user_agent_policy: UserAgentPolicy,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: MIN_PBKDF2_ITERATIONS,
            session_duration_ms: DEFAULT_SESSION_DURATION_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            open_wallet_timeout_ms: DEFAULT_OPEN_WALLET_TIMEOUT_MS,
            user_agent_policy: UserAgentPolicy::default(),
        }
    }
}

impl SecurityConfig {
    /// Parse a TOML override block. Missing keys keep their defaults.
    ///
    /// ```toml
    /// max_retries = 3
    /// user_agent_policy = "reject"
    /// ```
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: SecurityConfig =
            toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pbkdf2_iterations < MIN_PBKDF2_ITERATIONS {
            return Err(ConfigError::IterationsTooLow {
                actual: self.pbkdf2_iterations,
                minimum: MIN_PBKDF2_ITERATIONS,
            });
        }
        if self.session_duration_ms == 0 {
            return Err(ConfigError::ZeroSessionDuration);
        }
        if self.max_retries > MAX_ALLOWED_RETRIES {
            return Err(ConfigError::TooManyRetries {
                actual: self.max_retries,
                maximum: MAX_ALLOWED_RETRIES,
            });
        }
        Ok(())
    }

    pub fn session_duration(&self) -> Duration {
        Duration::from_millis(self.session_duration_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn open_wallet_timeout(&self) -> Duration {
        Duration::from_millis(self.open_wallet_timeout_ms)
    }
}
