// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Runtime classification
//!
//! Works purely from what the host reports: user agent, standalone display
//! mode, touch support and injected wallet APIs. Nothing here is cached;
//! every call reflects the host as it is now.

use regex::Regex;
use std::sync::{Arc, OnceLock};

use super::types::{Platform, PlatformInfo, WalletType};
use crate::crypto::DeviceIdentity;
use crate::host::HostEnvironment;
use crate::storage::StorageError;

fn ios_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)iphone|ipad|ipod").expect("static regex"))
}

fn android_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)android").expect("static regex"))
}

fn generic_mobile_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)mobile|webos|blackberry|iemobile|opera mini|silk").expect("static regex")
    })
}

/// What [`PlatformProbe::detect_embedded_wallet_browser`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebViewDetection {
    pub is_web_view: bool,
    pub wallet: Option<WalletType>,
}

impl WebViewDetection {
    fn none() -> Self {
        Self {
            is_web_view: false,
            wallet: None,
        }
    }
}

pub struct PlatformProbe {
    host: Arc<dyn HostEnvironment>,
    identity: Arc<DeviceIdentity>,
}

impl PlatformProbe {
    pub fn new(host: Arc<dyn HostEnvironment>, identity: Arc<DeviceIdentity>) -> Self {
        Self { host, identity }
    }

    pub fn classify_platform(&self) -> Platform {
        classify_user_agent(
            &self.host.user_agent(),
            self.host.is_standalone_display(),
            self.host.max_touch_points(),
        )
    }

    pub fn detect_embedded_wallet_browser(&self) -> WebViewDetection {
        let platform = self.classify_platform();
        // WebViews only exist on mobile
        if platform == Platform::Desktop {
            return WebViewDetection::none();
        }

        let user_agent = self.host.user_agent().to_ascii_lowercase();
        if let Some(wallet) = WalletType::ALL
            .into_iter()
            .find(|w| w.user_agent_markers().iter().any(|m| user_agent.contains(m)))
        {
            tracing::debug!("Running inside {} in-app browser (user agent)", wallet.display_name());
            return WebViewDetection {
                is_web_view: true,
                wallet: Some(wallet),
            };
        }

        let injected = self.host.injected_wallet_keys();
        if injected.is_empty() {
            return WebViewDetection::none();
        }

        if let Some(wallet) = WalletType::ALL.into_iter().find(|w| {
            w.injected_keys()
                .iter()
                .any(|key| injected.iter().any(|k| k.eq_ignore_ascii_case(key)))
        }) {
            tracing::debug!("Running inside {} in-app browser (injected API)", wallet.display_name());
            return WebViewDetection {
                is_web_view: true,
                wallet: Some(wallet),
            };
        }

        // An API is injected but we can't tell whose; fall back to generic markers
        WebViewDetection {
            is_web_view: looks_like_generic_web_view(&user_agent),
            wallet: None,
        }
    }

    pub async fn platform_info(&self) -> Result<PlatformInfo, StorageError> {
        let detection = self.detect_embedded_wallet_browser();
        Ok(PlatformInfo {
            platform: self.classify_platform(),
            device_id: self.identity.device_id().await?,
            is_web_view: detection.is_web_view,
            web_view_wallet_type: detection.wallet,
        })
    }
}

/// Map a user agent plus display hints to a [`Platform`].
pub fn classify_user_agent(user_agent: &str, standalone: bool, touch_points: u32) -> Platform {
    if ios_pattern().is_match(user_agent) {
        return Platform::MobileIos;
    }
    // iPadOS reports a desktop Safari UA; touch support gives it away
    if user_agent.contains("Macintosh") && touch_points > 1 {
        return Platform::MobileIos;
    }
    if android_pattern().is_match(user_agent) {
        return Platform::MobileAndroid;
    }
    if generic_mobile_pattern().is_match(user_agent) || (standalone && touch_points > 0) {
        return Platform::MobileWeb;
    }
    Platform::Desktop
}

fn looks_like_generic_web_view(user_agent_lower: &str) -> bool {
    let android_web_view = user_agent_lower.contains("; wv)");
    let ios_in_app = (user_agent_lower.contains("iphone") || user_agent_lower.contains("ipad"))
        && user_agent_lower.contains("applewebkit")
        && !user_agent_lower.contains("safari");
    android_web_view || ios_in_app
}
