// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HttpAuthClient against a local axum backend

use crate::common::{fast_config, test_host, CountingSigner, STAKE};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use secure_wallet_session::auth::{
    NonceChallengeCoordinator, NonceIssuer, NonceRequest, ServiceError, SignatureVerifier, VerifyRequest,
};
use secure_wallet_session::{
    AuthError, ConnectRequest, ConnectionOrchestrator, HostEnvironment, HttpAuthClient, MemorySlotStorage,
    SessionCipher, SessionStore, SlotStorage,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Backend {
    issued: AtomicUsize,
    /// Verify calls that answer "Nonce already consumed" before succeeding
    races: AtomicUsize,
    rate_limited: bool,
}

async fn issue_nonce(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if backend.rate_limited {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "Rate limit exceeded" })),
        );
    }
    if body["origin"] != "https://app.example" {
        return (StatusCode::FORBIDDEN, Json(json!({ "error": "Unauthorized origin" })));
    }
    let n = backend.issued.fetch_add(1, Ordering::SeqCst) + 1;
    (
        StatusCode::OK,
        Json(json!({
            "nonce": format!("N{}", n),
            "message": format!("Sign in with nonce N{}", n),
            "expiresAt": 4_102_444_800_000i64,
        })),
    )
}

async fn verify(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Json<Value> {
    let racing = backend
        .races
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |r| r.checked_sub(1))
        .is_ok();
    if racing {
        return Json(json!({ "success": false, "verified": false, "error": "Nonce already consumed" }));
    }
    if body["signature"].as_str().map(|s| s.is_empty()).unwrap_or(true) {
        return Json(json!({ "success": false, "verified": false, "error": "Invalid signature" }));
    }
    Json(json!({ "success": true, "verified": true }))
}

async fn spawn_backend(backend: Backend) -> (String, Arc<Backend>) {
    let backend = Arc::new(backend);
    let app = Router::new()
        .route("/auth/nonce", post(issue_nonce))
        .route("/auth/verify", post(verify))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/auth/", addr), backend)
}

fn nonce_request(origin: &str) -> NonceRequest {
    NonceRequest {
        stake_address: STAKE.to_string(),
        wallet_name: "eternl".to_string(),
        origin: origin.to_string(),
        device_id: "device_0123456789abcdef0123456789abcdef".to_string(),
    }
}

#[tokio::test]
async fn test_issue_and_verify() {
    let (endpoint, _) = spawn_backend(Backend::default()).await;
    let client = HttpAuthClient::new(&endpoint).unwrap();

    let challenge = client.generate(&nonce_request("https://app.example")).await.unwrap();
    assert_eq!(challenge.nonce, "N1");
    assert!(challenge.message.ends_with("N1"));

    let result = client
        .verify(&VerifyRequest {
            stake_address: STAKE.to_string(),
            wallet_name: "eternl".to_string(),
            signature: "sig1".to_string(),
            nonce: challenge.nonce,
        })
        .await
        .unwrap();
    assert!(result.is_verified());
}

#[tokio::test]
async fn test_refusals_keep_their_reason() {
    let (endpoint, _) = spawn_backend(Backend::default()).await;
    let client = HttpAuthClient::new(&endpoint).unwrap();

    let err = client.generate(&nonce_request("https://evil.example")).await.unwrap_err();
    assert_eq!(err, ServiceError::Rejected("Unauthorized origin".to_string()));

    let auth: AuthError = err.into();
    assert!(matches!(auth, AuthError::UnauthorizedOrigin));
}

#[tokio::test]
async fn test_unknown_route_is_status_error() {
    let (endpoint, _) = spawn_backend(Backend::default()).await;
    let client = HttpAuthClient::new(&format!("{}missing", endpoint)).unwrap();

    match client.generate(&nonce_request("https://app.example")).await {
        Err(ServiceError::Status { status, .. }) => assert_eq!(status, 404),
        other => panic!("Expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_full_connect_over_http() {
    let (endpoint, backend) = spawn_backend(Backend {
        races: AtomicUsize::new(1),
        ..Backend::default()
    })
    .await;
    let client = Arc::new(HttpAuthClient::new(&endpoint).unwrap());

    let config = fast_config();
    let host: Arc<dyn HostEnvironment> = Arc::new(test_host());
    let storage: Arc<dyn SlotStorage> = Arc::new(MemorySlotStorage::new());
    let cipher = Arc::new(SessionCipher::new(host.clone(), storage.clone(), &config));
    let store = Arc::new(SessionStore::new(storage, cipher.clone()));
    let coordinator = NonceChallengeCoordinator::new(
        client.clone(),
        client,
        Arc::new(CountingSigner::default()),
        host,
        cipher.identity().clone(),
        &config,
    );
    let orchestrator = ConnectionOrchestrator::new(coordinator, store.clone(), config);

    let session = orchestrator.connect(&ConnectRequest::new(STAKE, "eternl")).await.unwrap();
    assert_eq!(session.nonce, "N2");
    assert_eq!(backend.issued.load(Ordering::SeqCst), 2);
    assert_eq!(store.load().await, Some(session));
}

#[tokio::test]
async fn test_rate_limit_surfaces_through_connect() {
    let (endpoint, _) = spawn_backend(Backend {
        rate_limited: true,
        ..Backend::default()
    })
    .await;
    let client = HttpAuthClient::new(&endpoint).unwrap();

    let err: AuthError = client
        .generate(&nonce_request("https://app.example"))
        .await
        .unwrap_err()
        .into();
    assert!(matches!(err, AuthError::RateLimited { .. }));
    assert!(err.user_message().contains("Too many connection attempts"));
}
