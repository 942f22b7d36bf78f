// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Deep links into native wallet apps
//!
//! There is no API to ask the OS whether an app is installed. Instead we fire
//! the wallet's URL scheme at a hidden navigation target and watch the page
//! visibility: if the page goes to the background within the timeout, an app
//! picked the link up.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};

use super::types::{DeepLinkIntent, WalletType};
use crate::config::SecurityConfig;
use crate::host::{HostEnvironment, NavigationHost, ProbeId, VisibilitySignal, VisibilityState};

#[derive(Debug, Clone, Error)]
pub enum DeepLinkError {
    #[error("Could not open {wallet}. Please make sure it's installed on your device.")]
    WalletNotOpened { wallet: String },

    #[error("Failed to open {wallet} - {reason}")]
    LaunchFailed { wallet: String, reason: String },
}

/// Build the wallet-specific deep link for `dapp_url`.
///
/// Flint, VESPR, NuFi and Yoroi only expose a connect route; for them a
/// `Sign` intent produces the same link as `Connect` and the signing
/// request happens after the dApp is reopened inside the wallet.
pub fn construct_deep_link(wallet: WalletType, dapp_url: &str, intent: DeepLinkIntent) -> String {
    let scheme = wallet.scheme();
    let url: String = url::form_urlencoded::byte_serialize(dapp_url.as_bytes()).collect();
    let intent = intent.as_str();

    match wallet {
        WalletType::Eternl | WalletType::Lace => format!("{}dapp?url={}&action={}", scheme, url, intent),
        WalletType::Typhon => format!("{}?url={}&method={}", scheme, url, intent),
        WalletType::Flint => format!("{}connect?dapp={}", scheme, url),
        WalletType::Vespr => format!("{}dapp/connect?url={}", scheme, url),
        WalletType::Nufi => format!("{}connect?origin={}", scheme, url),
        WalletType::Yoroi => format!("{}connect?url={}", scheme, url),
    }
}

/// Whether the wallet's deep link can carry a `sign` intent.
pub fn supports_sign_intent(wallet: WalletType) -> bool {
    matches!(wallet, WalletType::Eternl | WalletType::Lace | WalletType::Typhon)
}

/// Removes the hidden element when dropped, whichever way the probe ends.
struct AttachedTarget<'a> {
    navigation: &'a dyn NavigationHost,
    id: ProbeId,
}

impl Drop for AttachedTarget<'_> {
    fn drop(&mut self) {
        self.navigation.remove_hidden_target(self.id);
    }
}

async fn wait_for_background(rx: &mut broadcast::Receiver<VisibilityState>) -> bool {
    loop {
        match rx.recv().await {
            Ok(VisibilityState::Hidden) => return true,
            Ok(VisibilityState::Visible) => continue,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => return false,
        }
    }
}

#[derive(Clone)]
pub struct DeepLinkProbe {
    host: Arc<dyn HostEnvironment>,
    navigation: Arc<dyn NavigationHost>,
    visibility: VisibilitySignal,
    probe_timeout: Duration,
    open_timeout: Duration,
}

impl DeepLinkProbe {
    pub fn new(
        host: Arc<dyn HostEnvironment>,
        navigation: Arc<dyn NavigationHost>,
        visibility: VisibilitySignal,
        config: &SecurityConfig,
    ) -> Self {
        Self {
            host,
            navigation,
            visibility,
            probe_timeout: config.probe_timeout(),
            open_timeout: config.open_wallet_timeout(),
        }
    }

    pub fn construct_deep_link(&self, wallet: WalletType, dapp_url: &str, intent: DeepLinkIntent) -> String {
        construct_deep_link(wallet, dapp_url, intent)
    }

    fn has_injected_api(&self, wallet: WalletType) -> bool {
        let injected = self.host.injected_wallet_keys();
        wallet
            .injected_keys()
            .iter()
            .any(|key| injected.iter().any(|k| k.eq_ignore_ascii_case(key)))
    }

    /// Is `wallet` installed? Resolves `false` once `timeout` elapses.
    pub async fn probe_installed(&self, wallet: WalletType, timeout: Duration) -> bool {
        if self.has_injected_api(wallet) {
            tracing::debug!("[Wallet Detection] Found {} via injected API", wallet);
            return true;
        }

        // Listen before triggering so a fast app switch is not missed
        let mut rx = self.visibility.subscribe();
        let id = match self.navigation.attach_hidden_target(wallet.scheme()) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("[Wallet Detection] Error testing {}: {}", wallet, e);
                return false;
            }
        };
        let _target = AttachedTarget {
            navigation: self.navigation.as_ref(),
            id,
        };

        let installed = tokio::time::timeout(timeout, wait_for_background(&mut rx))
            .await
            .unwrap_or(false);

        if installed {
            tracing::info!("[Wallet Detection] {} detected (app opened)", wallet);
        } else {
            tracing::debug!("[Wallet Detection] {} not detected (timeout)", wallet);
        }
        installed
    }

    /// Probe every supported wallet concurrently; returns the installed ones, sorted.
    pub async fn detect_all_installed(&self, timeout_per_wallet: Duration) -> Vec<WalletType> {
        let checks = WalletType::ALL.into_iter().map(|wallet| async move {
            (wallet, self.probe_installed(wallet, timeout_per_wallet).await)
        });

        let mut installed: Vec<WalletType> = join_all(checks)
            .await
            .into_iter()
            .filter_map(|(wallet, found)| found.then_some(wallet))
            .collect();
        installed.sort_by_key(|w| w.as_str());

        tracing::info!("[Wallet Detection] Detection complete: {:?}", installed);
        installed
    }

    /// Probe with the configured default timeout.
    pub async fn probe_installed_default(&self, wallet: WalletType) -> bool {
        self.probe_installed(wallet, self.probe_timeout).await
    }

    /// Hand off to the native app; resolves once the page is backgrounded.
    pub async fn open_wallet(&self, wallet: WalletType, dapp_url: &str) -> Result<(), DeepLinkError> {
        let deep_link = construct_deep_link(wallet, dapp_url, DeepLinkIntent::Connect);
        tracing::info!("[Mobile Wallet Connection] Opening {}: {}", wallet.display_name(), deep_link);

        let mut rx = self.visibility.subscribe();
        let id = self
            .navigation
            .attach_hidden_target(&deep_link)
            .map_err(|e| DeepLinkError::LaunchFailed {
                wallet: wallet.display_name().to_string(),
                reason: e.to_string(),
            })?;
        let _target = AttachedTarget {
            navigation: self.navigation.as_ref(),
            id,
        };

        if self.visibility.is_hidden() {
            return Ok(());
        }

        match tokio::time::timeout(self.open_timeout, wait_for_background(&mut rx)).await {
            Ok(true) => {
                tracing::info!("[Mobile Wallet Connection] ✓ {} opened", wallet.display_name());
                Ok(())
            }
            _ => {
                tracing::error!("[Mobile Wallet Connection] ✗ Timeout - {} did not open", wallet.display_name());
                Err(DeepLinkError::WalletNotOpened {
                    wallet: wallet.display_name().to_string(),
                })
            }
        }
    }
}
