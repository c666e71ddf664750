//! Remote task classifier contract and its HTTP client.
//!
//! The selector treats every classifier error as recoverable and falls back
//! to [`task_coordination::HeuristicClassifier`], so the client only needs to
//! fail fast. A circuit breaker makes it report itself unavailable after
//! repeated failures instead of paying the timeout on every task.

use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use task_coordination::router::CircuitBreaker;
use task_coordination::ClassificationResult;

use crate::config::ClassifierConfig;

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("classifier returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid classifier response: {0}")]
    InvalidResponse(String),

    #[error("classifier unavailable (circuit open)")]
    CircuitOpen,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClassifierClient: Send + Sync {
    /// Classify a task description, optionally with the paths it will touch.
    async fn classify(
        &self,
        description: &str,
        files_changed: &[String],
    ) -> Result<ClassificationResult, ClassifierError>;

    /// Whether a call is worth attempting right now.
    fn is_available(&self) -> bool;
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    task_description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    files_changed: Option<&'a [String]>,
}

/// Client for the classifier service (`POST /classify/`, `GET /health`).
#[derive(Debug)]
pub struct HttpClassifierClient {
    http: Client,
    base_url: String,
    breaker: Mutex<CircuitBreaker>,
}

impl HttpClassifierClient {
    pub fn new(base_url: &str, config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            breaker: Mutex::new(CircuitBreaker::new(
                config.failure_threshold,
                config.cooldown(),
            )),
        })
    }

    /// Probe `GET /health`. Does not touch the circuit breaker.
    pub async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.http.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "classifier health check failed");
                false
            }
        }
    }

    fn record(&self, ok: bool) {
        // A poisoned lock only loses breaker bookkeeping.
        if let Ok(mut breaker) = self.breaker.lock() {
            if ok {
                breaker.record_success();
            } else {
                breaker.record_failure();
            }
        }
    }

    async fn request(
        &self,
        description: &str,
        files_changed: &[String],
    ) -> Result<ClassificationResult, ClassifierError> {
        let url = format!("{}/classify/", self.base_url);
        let body = ClassifyRequest {
            task_description: description,
            files_changed: (!files_changed.is_empty()).then_some(files_changed),
        };

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status().as_u16();
        if status >= 400 {
            let message = response.text().await.unwrap_or_else(|_| "(no body)".into());
            return Err(ClassifierError::Api { status, message });
        }

        response
            .json::<ClassificationResult>()
            .await
            .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ClassifierClient for HttpClassifierClient {
    async fn classify(
        &self,
        description: &str,
        files_changed: &[String],
    ) -> Result<ClassificationResult, ClassifierError> {
        if !self.is_available() {
            return Err(ClassifierError::CircuitOpen);
        }
        let result = self.request(description, files_changed).await;
        self.record(result.is_ok());
        result
    }

    fn is_available(&self) -> bool {
        self.breaker
            .lock()
            .map(|breaker| breaker.is_available())
            .unwrap_or(true)
    }
}
