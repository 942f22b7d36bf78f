// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! JSON-over-HTTP client for the nonce issuer and signature verifier

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::collaborators::{
    NonceChallenge, NonceIssuer, NonceRequest, ServiceError, SignatureVerifier, VerificationResult, VerifyRequest,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Talks to an auth backend exposing `POST {endpoint}/nonce` and
/// `POST {endpoint}/verify`.
pub struct HttpAuthClient {
    client: Client,
    endpoint: String,
}

impl HttpAuthClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let endpoint = endpoint.trim_end_matches('/').to_string();
        info!("Auth client configured: endpoint={}", endpoint);
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ServiceError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.endpoint, path);
        debug!("Auth POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            // Backends report refusals as {"error": "..."}; keep the reason verbatim
            return Err(match serde_json::from_str::<ErrorBody>(&text) {
                Ok(body) => ServiceError::Rejected(body.error),
                Err(_) => ServiceError::Status {
                    status: status.as_u16(),
                    body: text,
                },
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl NonceIssuer for HttpAuthClient {
    async fn generate(&self, request: &NonceRequest) -> Result<NonceChallenge, ServiceError> {
        self.post_json("nonce", request).await
    }
}

#[async_trait]
impl SignatureVerifier for HttpAuthClient {
    async fn verify(&self, request: &VerifyRequest) -> Result<VerificationResult, ServiceError> {
        self.post_json("verify", request).await
    }
}
