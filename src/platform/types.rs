// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[default]
    Desktop,
    MobileIos,
    MobileAndroid,
    MobileWeb,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Desktop => "desktop",
            Platform::MobileIos => "mobile_ios",
            Platform::MobileAndroid => "mobile_android",
            Platform::MobileWeb => "mobile_web",
        }
    }

    pub fn is_mobile(&self) -> bool {
        !matches!(self, Platform::Desktop)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed registry of supported mobile wallets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletType {
    Eternl,
    Flint,
    Typhon,
    Vespr,
    Nufi,
    Yoroi,
    Lace,
}

impl WalletType {
    pub const ALL: [WalletType; 7] = [
        WalletType::Eternl,
        WalletType::Flint,
        WalletType::Typhon,
        WalletType::Vespr,
        WalletType::Nufi,
        WalletType::Yoroi,
        WalletType::Lace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WalletType::Eternl => "eternl",
            WalletType::Flint => "flint",
            WalletType::Typhon => "typhon",
            WalletType::Vespr => "vespr",
            WalletType::Nufi => "nufi",
            WalletType::Yoroi => "yoroi",
            WalletType::Lace => "lace",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            WalletType::Eternl => "Eternl",
            WalletType::Flint => "Flint",
            WalletType::Typhon => "Typhon",
            WalletType::Vespr => "VESPR",
            WalletType::Nufi => "NuFi",
            WalletType::Yoroi => "Yoroi",
            WalletType::Lace => "Lace",
        }
    }

    /// URL scheme the native app registers with the OS.
    pub fn scheme(&self) -> &'static str {
        match self {
            WalletType::Eternl => "eternl://",
            WalletType::Flint => "flint://",
            WalletType::Typhon => "typhoncip30://",
            WalletType::Vespr => "vespr://",
            WalletType::Nufi => "nufi://",
            WalletType::Yoroi => "yoroi://",
            WalletType::Lace => "lace://",
        }
    }

    /// Keys under which the wallet injects its API into the page.
    pub fn injected_keys(&self) -> &'static [&'static str] {
        match self {
            WalletType::Eternl => &["eternl", "ccvault"],
            WalletType::Flint => &["flint"],
            WalletType::Typhon => &["typhoncip30", "typhon"],
            WalletType::Vespr => &["vespr"],
            WalletType::Nufi => &["nufi"],
            WalletType::Yoroi => &["yoroi"],
            WalletType::Lace => &["lace"],
        }
    }

    /// Lowercase user-agent markers of the wallet's in-app browser.
    pub fn user_agent_markers(&self) -> &'static [&'static str] {
        match self {
            WalletType::Eternl => &["eternl"],
            WalletType::Flint => &["flint"],
            WalletType::Typhon => &["typhon"],
            WalletType::Vespr => &["vespr"],
            WalletType::Nufi => &["nufi"],
            WalletType::Yoroi => &["yoroi"],
            WalletType::Lace => &["lace"],
        }
    }
}

impl fmt::Display for WalletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        WalletType::ALL
            .into_iter()
            .find(|w| w.as_str() == lowered || w.injected_keys().contains(&lowered.as_str()))
            .ok_or_else(|| format!("Unknown wallet type: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeepLinkIntent {
    Connect,
    Sign,
}

impl DeepLinkIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeepLinkIntent::Connect => "connect",
            DeepLinkIntent::Sign => "sign",
        }
    }
}

/// Derived view of the runtime. Only `device_id` is durable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformInfo {
    pub platform: Platform,
    pub device_id: String,
    pub is_web_view: bool,
    pub web_view_wallet_type: Option<WalletType>,
}
