//! Alert webhook dispatch.
//!
//! Delivery guarantees belong to the receiving side; this adapter just POSTs
//! alert batches to the configured destinations with retry/backoff. The
//! pipeline fires dispatch asynchronously and never rolls anything back on
//! delivery failure.

use crate::config::WebhookConfig;
use crate::models::Alert;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    async fn dispatch(&self, alerts: &[Alert]) -> Result<(), DispatchError>;

    /// Dispatcher name for logging.
    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook {url} returned status {status}")]
    Status { status: u16, url: String },
}

/// Used when no webhook destinations are configured.
pub struct NoopDispatcher;

#[async_trait]
impl AlertDispatcher for NoopDispatcher {
    async fn dispatch(&self, _alerts: &[Alert]) -> Result<(), DispatchError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

pub struct HttpAlertDispatcher {
    client: Client,
    urls: Vec<String>,
    max_retries: usize,
    retry_delay_ms: u64,
}

impl HttpAlertDispatcher {
    pub fn new(config: &WebhookConfig) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            urls: config.urls.clone(),
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
        })
    }

    async fn post_once(&self, url: &str, alerts: &[Alert]) -> Result<(), DispatchError> {
        let response = self.client.post(url).json(&alerts).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AlertDispatcher for HttpAlertDispatcher {
    async fn dispatch(&self, alerts: &[Alert]) -> Result<(), DispatchError> {
        for url in &self.urls {
            let retry_strategy = ExponentialBackoff::from_millis(self.retry_delay_ms)
                .max_delay(Duration::from_secs(10))
                .map(jitter)
                .take(self.max_retries);
            Retry::spawn(retry_strategy, || self.post_once(url, alerts)).await?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Dispatcher from configuration: HTTP when destinations are configured,
/// no-op otherwise.
pub fn create_dispatcher(config: &WebhookConfig) -> Result<Arc<dyn AlertDispatcher>, DispatchError> {
    if config.urls.is_empty() {
        Ok(Arc::new(NoopDispatcher))
    } else {
        Ok(Arc::new(HttpAlertDispatcher::new(config)?))
    }
}
