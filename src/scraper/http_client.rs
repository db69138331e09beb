use crate::config::ScraperConfig;
use crate::errors::ScrapeError;
use anyhow::{Context, Result};
use reqwest::{redirect, StatusCode};
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, warn};
use url::Url;

const MAX_REDIRECTS: usize = 10;

#[derive(Debug, thiserror::Error)]
enum FetchFailure {
    #[error("HTTP {0}")]
    Status(StatusCode),
    #[error("request error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl FetchFailure {
    /// Rate limiting, server errors and connection trouble are worth another try.
    fn is_transient(&self) -> bool {
        match self {
            FetchFailure::Status(status) => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            FetchFailure::Transport(e) => e.is_timeout() || e.is_connect(),
        }
    }
}

/// Host must be listed exactly; an empty list allows everything.
pub fn is_allowed(url: &Url, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    url.host_str()
        .is_some_and(|host| allowed.iter().any(|a| a.eq_ignore_ascii_case(host)))
}

pub struct HttpClient {
    inner: reqwest::Client,
    allowed_domains: Vec<String>,
    max_retries: u32,
    retry_base_ms: u64,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig, user_agent: &str) -> Result<Self> {
        let redirect_allowed = config.allowed_domains.clone();
        let inner = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Consent and session cookies survive the redirect chain
            .cookie_store(true)
            .redirect(redirect::Policy::custom(move |attempt| {
                if attempt.previous().len() >= MAX_REDIRECTS {
                    attempt.error("too many redirects")
                } else if is_allowed(attempt.url(), &redirect_allowed) {
                    attempt.follow()
                } else {
                    attempt.stop()
                }
            }))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            allowed_domains: config.allowed_domains.clone(),
            max_retries: config.max_retries,
            retry_base_ms: config.retry_base_ms,
        })
    }

    /// Fetch a URL as text, retrying transient failures with jittered backoff.
    pub async fn get_text(&self, url: &Url) -> Result<String> {
        if !is_allowed(url, &self.allowed_domains) {
            let host = url.host_str().unwrap_or_default().to_string();
            return Err(ScrapeError::DisallowedDomain(host).into());
        }

        // Delays double from retry_base_ms
        let backoff = ExponentialBackoff::from_millis(2)
            .factor((self.retry_base_ms / 2).max(1))
            .max_delay(Duration::from_secs(30))
            .map(jitter)
            .take(self.max_retries as usize);

        let body = RetryIf::start(
            backoff,
            || self.attempt(url),
            |e: &FetchFailure| {
                let retry = e.is_transient();
                if retry {
                    warn!("GET {} failed ({}), retrying", url, e);
                }
                retry
            },
        )
        .await
        .with_context(|| format!("All retries exhausted for {}", url))?;

        Ok(body)
    }

    async fn attempt(&self, url: &Url) -> Result<String, FetchFailure> {
        debug!("GET {}", url);
        let resp = self.inner.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchFailure::Status(status));
        }
        Ok(resp.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_allowed() {
        let allowed = vec!["google.com".to_string(), "www.google.com".to_string()];
        let ok = Url::parse("http://www.google.com/search?q=x").unwrap();
        let consent = Url::parse("https://consent.google.com/ml").unwrap();
        assert!(is_allowed(&ok, &allowed));
        assert!(!is_allowed(&consent, &allowed));
        assert!(is_allowed(&consent, &[]));
    }

    #[test]
    fn test_transient_statuses() {
        assert!(FetchFailure::Status(StatusCode::TOO_MANY_REQUESTS).is_transient());
        assert!(FetchFailure::Status(StatusCode::BAD_GATEWAY).is_transient());
        assert!(!FetchFailure::Status(StatusCode::FORBIDDEN).is_transient());
    }

    #[tokio::test]
    async fn test_disallowed_host_is_rejected_before_sending() {
        let client = HttpClient::new(&ScraperConfig::default(), "test-agent").unwrap();
        let url = Url::parse("http://www.bing.com/search?q=x").unwrap();
        let err = client.get_text(&url).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScrapeError>(),
            Some(ScrapeError::DisallowedDomain(h)) if h == "www.bing.com"
        ));
    }
}
