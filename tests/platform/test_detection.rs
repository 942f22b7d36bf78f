// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Platform classification and in-app browser detection

use crate::common::{test_host, DESKTOP_UA};
use secure_wallet_session::crypto::DeviceIdentity;
use secure_wallet_session::{HostEnvironment, MemorySlotStorage, Platform, PlatformProbe, StaticHost, WalletType};
use std::sync::Arc;

const ANDROID_CHROME: &str =
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Mobile Safari/537.36";
const ANDROID_WEBVIEW: &str =
    "Mozilla/5.0 (Linux; Android 14; Pixel 8; wv) AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 Chrome/120.0 Mobile Safari/537.36";
const IPHONE_IN_APP: &str =
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/15E148";

fn probe(host: StaticHost) -> PlatformProbe {
    let host: Arc<dyn HostEnvironment> = Arc::new(host);
    let identity = Arc::new(DeviceIdentity::new(Arc::new(MemorySlotStorage::new()), host.clone()));
    PlatformProbe::new(host, identity)
}

#[test]
fn test_desktop_is_never_a_web_view() {
    // Even with a wallet extension injected
    let detection = probe(test_host().with_injected_wallet("eternl")).detect_embedded_wallet_browser();
    assert!(!detection.is_web_view);
    assert_eq!(detection.wallet, None);
}

#[test]
fn test_wallet_named_in_user_agent() {
    let host = test_host().with_user_agent(format!("{} VesprWallet/2.1", ANDROID_CHROME));
    let detection = probe(host).detect_embedded_wallet_browser();
    assert!(detection.is_web_view);
    assert_eq!(detection.wallet, Some(WalletType::Vespr));
}

#[test]
fn test_wallet_found_by_injected_api() {
    let host = test_host()
        .with_user_agent(ANDROID_CHROME)
        .with_injected_wallet("ccvault");
    let detection = probe(host).detect_embedded_wallet_browser();
    assert!(detection.is_web_view);
    assert_eq!(detection.wallet, Some(WalletType::Eternl));
}

#[test]
fn test_unknown_injected_api_uses_generic_markers() {
    let android = probe(
        test_host()
            .with_user_agent(ANDROID_WEBVIEW)
            .with_injected_wallet("gerowallet"),
    )
    .detect_embedded_wallet_browser();
    assert!(android.is_web_view);
    assert_eq!(android.wallet, None);

    let ios = probe(
        test_host()
            .with_user_agent(IPHONE_IN_APP)
            .with_injected_wallet("gerowallet"),
    )
    .detect_embedded_wallet_browser();
    assert!(ios.is_web_view);

    let plain_browser = probe(
        test_host()
            .with_user_agent(ANDROID_CHROME)
            .with_injected_wallet("gerowallet"),
    )
    .detect_embedded_wallet_browser();
    assert!(!plain_browser.is_web_view);
}

#[test]
fn test_mobile_browser_without_wallet_is_not_web_view() {
    let detection = probe(test_host().with_user_agent(ANDROID_WEBVIEW)).detect_embedded_wallet_browser();
    assert!(!detection.is_web_view);
}

#[tokio::test]
async fn test_platform_info_carries_durable_device_id() {
    let storage = MemorySlotStorage::new();
    let host: Arc<dyn HostEnvironment> = Arc::new(test_host().with_user_agent(ANDROID_CHROME));
    let identity = Arc::new(DeviceIdentity::new(Arc::new(storage.clone()), host.clone()));
    let probe = PlatformProbe::new(host.clone(), identity);

    let first = probe.platform_info().await.unwrap();
    assert_eq!(first.platform, Platform::MobileAndroid);
    assert!(!first.is_web_view);

    // A fresh probe over the same storage reports the same device
    let again = PlatformProbe::new(host.clone(), Arc::new(DeviceIdentity::new(Arc::new(storage), host)))
        .platform_info()
        .await
        .unwrap();
    assert_eq!(first.device_id, again.device_id);

    let json = serde_json::to_value(&first).unwrap();
    assert_eq!(json["platform"], "mobile_android");
    assert!(json.get("webViewWalletType").is_some());
}

#[test]
fn test_desktop_classification() {
    assert_eq!(probe(StaticHost::new("https://app.example", DESKTOP_UA)).classify_platform(), Platform::Desktop);
}
