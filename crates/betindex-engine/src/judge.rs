//! HTTP client for the judging / notification service.
//!
//! Two JSON-over-POST endpoints on a configurable base URL:
//! - `/judge_bet` — synchronous adjudication; `{"verdict": bool}` on 200
//! - `/post_tweet` — fire-and-forget creation announcement

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use betindex_core::types::Agreement;

#[derive(Debug, Error)]
pub enum JudgeError {
    /// Transport failure (connection refused, timeout).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Service answered with a non-success status.
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    /// Response body did not decode.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Request body for `/judge_bet`.
#[derive(Debug, Clone, Serialize)]
pub struct JudgeRequest {
    pub address: String,
    pub description: String,
    /// Supporting reference URLs; extensible, currently always empty.
    pub urls: Vec<String>,
}

/// Response body from `/judge_bet`.
#[derive(Debug, Clone, Deserialize)]
pub struct JudgeResponse {
    pub verdict: bool,
}

/// Request body for `/post_tweet`.
#[derive(Debug, Clone, Serialize)]
pub struct TweetRequest {
    pub address: String,
    pub message: String,
}

/// Resolves a due bet to a verdict via the external service.
#[async_trait]
pub trait Adjudicator: Send + Sync {
    async fn judge(&self, bet: &Agreement) -> Result<bool, JudgeError>;
}

/// Announces a freshly indexed bet downstream. Best effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_created(&self, bet: &Agreement) -> Result<(), JudgeError>;
}

/// `reqwest`-backed client implementing both service endpoints.
pub struct JudgeClient {
    base_url: String,
    http: reqwest::Client,
}

impl JudgeClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("failed to build reqwest client");
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    async fn post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, JudgeError> {
        let resp = self
            .http
            .post(format!("{}/{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| JudgeError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let code = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(JudgeError::Status { code, body });
        }
        Ok(resp)
    }
}

#[async_trait]
impl Adjudicator for JudgeClient {
    async fn judge(&self, bet: &Agreement) -> Result<bool, JudgeError> {
        let req = JudgeRequest {
            address: bet.address.clone(),
            description: bet.message.clone(),
            urls: vec![],
        };
        let resp = self.post("judge_bet", &req).await?;
        let decoded: JudgeResponse = resp
            .json()
            .await
            .map_err(|e| JudgeError::Decode(e.to_string()))?;
        Ok(decoded.verdict)
    }
}

#[async_trait]
impl Notifier for JudgeClient {
    async fn notify_created(&self, bet: &Agreement) -> Result<(), JudgeError> {
        let req = TweetRequest {
            address: bet.address.clone(),
            message: bet.message.clone(),
        };
        self.post("post_tweet", &req).await?;
        Ok(())
    }
}
