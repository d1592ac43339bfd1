//! HTTP transport of the expense sync.
//!
//! [`HttpRemote`] posts the whole collection as JSON to the sync endpoint and
//! hands the returned delta back to the engine. Transport failures are
//! retried with a linear backoff; an answer with an error status is final.

use std::time::Duration;

use api_types::sync::{SyncRequest, SyncResponse};
use engine::SyncRemote;
use reqwest::{StatusCode, Url};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("network error: {0}")]
    Transport(reqwest::Error),
    #[error("{status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("invalid sync response: {0}")]
    Decode(reqwest::Error),
}

/// Retry schedule of transport failures: `attempts` tries in total, the
/// n-th retry waiting `n * base_delay`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

#[derive(Debug, Clone)]
pub struct HttpRemote {
    endpoint: Url,
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpRemote {
    /// Remote posting to `sync_path` resolved against `base_url`. With `dev`
    /// set, the endpoint targets the development dataset (`?dev=1`).
    pub fn new(base_url: &str, sync_path: &str, dev: bool) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| ClientError::InvalidUrl(format!("invalid base_url: {err}")))?;
        let mut endpoint = base_url
            .join(sync_path)
            .map_err(|err| ClientError::InvalidUrl(format!("invalid sync_path: {err}")))?;
        if dev {
            endpoint.query_pairs_mut().append_pair("dev", "1");
        }

        Ok(Self {
            endpoint,
            http: reqwest::Client::new(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn push_once(&self, request: &SyncRequest) -> Result<SyncResponse, ClientError> {
        let res = self
            .http
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(ClientError::Transport)?;

        let status = res.status();
        if status.is_success() {
            return res
                .json::<SyncResponse>()
                .await
                .map_err(ClientError::Decode);
        }

        let body = res
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        tracing::error!("sync endpoint answered {status}: {body}");
        Err(ClientError::Status { status, body })
    }
}

impl SyncRemote for HttpRemote {
    type Error = ClientError;

    async fn push(&self, request: SyncRequest) -> Result<SyncResponse, ClientError> {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.push_once(&request).await {
                Err(ClientError::Transport(err)) if attempt < attempts => {
                    let delay = self.retry.delay(attempt);
                    tracing::warn!(
                        "sync attempt {attempt}/{attempts} failed: {err}, retrying in {}ms",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
