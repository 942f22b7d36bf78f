// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};

/// Hardware/browser characteristics that feed the device fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTraits {
    pub language: String,
    pub platform: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub color_depth: u8,
    pub timezone: String,
    pub hardware_concurrency: u32,
}

impl DeviceTraits {
    /// Stable string form used as fingerprint input.
    pub fn fingerprint_material(&self) -> String {
        format!(
            "{}|{}|{}x{}|{}|{}|{}",
            self.language,
            self.platform,
            self.screen_width,
            self.screen_height,
            self.color_depth,
            self.timezone,
            self.hardware_concurrency
        )
    }
}

/// Read-only view of the runtime the client is executing in.
pub trait HostEnvironment: Send + Sync {
    /// Page origin, e.g. `https://app.example`.
    fn origin(&self) -> String;

    fn user_agent(&self) -> String;

    /// True when the page was served over a secure transport.
    fn is_secure_context(&self) -> bool;

    /// True when the host exposes a usable cryptographic primitive set.
    fn has_crypto(&self) -> bool;

    /// Installed-app (standalone) display mode.
    fn is_standalone_display(&self) -> bool {
        false
    }

    fn max_touch_points(&self) -> u32 {
        0
    }

    fn device_traits(&self) -> DeviceTraits;

    /// Keys under which wallet APIs have been injected into the page.
    fn injected_wallet_keys(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Fixed host description. Used for non-browser embeddings and tests.
#[derive(Debug, Clone)]
pub struct StaticHost {
    pub origin: String,
    pub user_agent: String,
    pub secure_context: bool,
    pub crypto_available: bool,
    pub standalone_display: bool,
    pub max_touch_points: u32,
    pub traits: DeviceTraits,
    pub injected_wallets: Vec<String>,
}

impl StaticHost {
    pub fn new(origin: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            user_agent: user_agent.into(),
            secure_context: true,
            crypto_available: true,
            standalone_display: false,
            max_touch_points: 0,
            traits: DeviceTraits {
                language: "en-US".to_string(),
                platform: "unknown".to_string(),
                screen_width: 1920,
                screen_height: 1080,
                color_depth: 24,
                timezone: "UTC".to_string(),
                hardware_concurrency: 8,
            },
            injected_wallets: Vec::new(),
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn insecure(mut self) -> Self {
        self.secure_context = false;
        self
    }

    pub fn without_crypto(mut self) -> Self {
        self.crypto_available = false;
        self
    }

    pub fn standalone(mut self, touch_points: u32) -> Self {
        self.standalone_display = true;
        self.max_touch_points = touch_points;
        self
    }

    pub fn with_injected_wallet(mut self, key: impl Into<String>) -> Self {
        self.injected_wallets.push(key.into());
        self
    }

    pub fn with_traits(mut self, traits: DeviceTraits) -> Self {
        self.traits = traits;
        self
    }
}

impl HostEnvironment for StaticHost {
    fn origin(&self) -> String {
        self.origin.clone()
    }

    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }

    fn is_secure_context(&self) -> bool {
        self.secure_context
    }

    fn has_crypto(&self) -> bool {
        self.crypto_available
    }

    fn is_standalone_display(&self) -> bool {
        self.standalone_display
    }

    fn max_touch_points(&self) -> u32 {
        self.max_touch_points
    }

    fn device_traits(&self) -> DeviceTraits {
        self.traits.clone()
    }

    fn injected_wallet_keys(&self) -> Vec<String> {
        self.injected_wallets.clone()
    }
}

/// Result of [`check_security_support`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecuritySupport {
    pub supported: bool,
    pub missing: Vec<&'static str>,
}

/// Report which capabilities required for encrypted sessions are missing.
pub fn check_security_support(host: &dyn HostEnvironment) -> SecuritySupport {
    let mut missing = Vec::new();
    if !host.has_crypto() {
        missing.push("Crypto API");
    }
    if !host.is_secure_context() {
        missing.push("Secure context (HTTPS required)");
    }
    SecuritySupport {
        supported: missing.is_empty(),
        missing,
    }
}
