// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod deep_link;
pub mod detection;
pub mod types;

pub use deep_link::{construct_deep_link, supports_sign_intent, DeepLinkError, DeepLinkProbe};
pub use detection::{classify_user_agent, PlatformProbe, WebViewDetection};
pub use types::{DeepLinkIntent, Platform, PlatformInfo, WalletType};
