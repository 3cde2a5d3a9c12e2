//! HTTP page source for the public screener.
//!
//! Fetches `<url>?page=N` with a browser-like user agent. Transport
//! failures are fatal to the run unless `max_retries` is configured, in
//! which case request errors, 429 and 5xx responses are retried with
//! exponential backoff.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use super::{page_url, PageSource};
use crate::config::SourceConfig;
use crate::types::FolioError;

const SOURCE_NAME: &str = "screener";

pub struct HttpPageSource {
    http: Client,
    base_url: String,
    max_retries: u32,
    backoff_ms: u64,
}

impl HttpPageSource {
    pub fn new(cfg: &SourceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(cfg.user_agent.as_str())
            .build()
            .context("Failed to build HTTP client for screener")?;

        Ok(Self {
            http,
            base_url: cfg.url.clone(),
            max_retries: cfg.max_retries,
            backoff_ms: cfg.backoff_ms,
        })
    }
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`.
pub(crate) fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(factor))
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_page(&self, page: u32) -> Result<String> {
        let url = page_url(&self.base_url, page);
        let mut last_error = String::new();

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.backoff_ms, attempt);
                debug!(
                    page,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying page fetch"
                );
                tokio::time::sleep(delay).await;
            }

            debug!(url = %url, "Fetching screener page");

            match self.http.get(&url).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response
                            .text()
                            .await
                            .with_context(|| format!("Failed to read body of page {page}"));
                    }

                    let body = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(page, attempt, status = %status, "Retryable screener error");
                        last_error = format!("HTTP {status}");
                        continue;
                    }

                    return Err(FolioError::Transport {
                        page,
                        message: format!("HTTP {status}: {}", truncate(&body, 200)),
                    }
                    .into());
                }
                Err(e) => {
                    warn!(page, attempt, error = %e, "Screener request failed");
                    last_error = format!("Request error: {e}");
                }
            }
        }

        Err(FolioError::Transport {
            page,
            message: format!("failed after {} attempt(s): {last_error}", self.max_retries + 1),
        }
        .into())
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
