pub mod cleaner;
pub mod http_client;
pub mod parsers;
pub mod session;
pub mod user_agents;

use crate::config::ScraperConfig;
use crate::errors::ScrapeError;
use crate::models::{Device, SearchResultSet};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use self::http_client::HttpClient;
use self::parsers::SelectorPolicy;
use self::session::{collect, ResultSetAggregator};

// ── Source trait ──────────────────────────────────────────────────────────────

/// Where a results page comes from: the network or a saved snapshot.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, url: &Url) -> Result<String>;
}

#[async_trait]
impl PageSource for HttpClient {
    async fn fetch_page(&self, url: &Url) -> Result<String> {
        self.get_text(url).await
    }
}

/// A page already in memory.
pub struct StaticPage {
    html: String,
}

impl StaticPage {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }
}

#[async_trait]
impl PageSource for StaticPage {
    async fn fetch_page(&self, _url: &Url) -> Result<String> {
        Ok(self.html.clone())
    }
}

// ── SERP scraper ──────────────────────────────────────────────────────────────

pub struct SerpScraper {
    base_url: String,
    forced_device: Option<Device>,
    session_timeout: Duration,
    policy: Arc<SelectorPolicy>,
}

impl SerpScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let policy = SelectorPolicy::new(config.ad_label.clone(), config.sea_strategy)?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            forced_device: config.device,
            session_timeout: Duration::from_secs(config.session_timeout_secs),
            policy: Arc::new(policy),
        })
    }

    /// `<base>/search?q=<keywords>`, form-encoded.
    pub fn search_url(&self, keywords: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/search", self.base_url))
            .with_context(|| format!("Invalid base url {:?}", self.base_url))?;
        url.query_pairs_mut().append_pair("q", keywords);
        Ok(url)
    }

    /// Start a session for `keywords`. Device consistency is checked here,
    /// before anything is fetched or extracted.
    pub fn open_session(&self, keywords: &str, user_agent: &str) -> Result<ResultSetAggregator> {
        let url = self.search_url(keywords)?;
        let session = ResultSetAggregator::start(keywords, url.as_str(), user_agent, self.forced_device)?;
        Ok(session)
    }

    /// Fetch the page for `session` and run extraction to completion.
    pub async fn scrape(
        &self,
        source: &dyn PageSource,
        session: ResultSetAggregator,
        cancel: &CancellationToken,
    ) -> Result<SearchResultSet> {
        let url = Url::parse(session.url()).context("Session url is not a valid URL")?;

        let html = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ScrapeError::Cancelled.into()),
            page = source.fetch_page(&url) => page.with_context(|| format!("Failed to fetch {}", url))?,
        };
        debug!("Fetched {} bytes from {}", html.len(), url);

        let set = collect(session, html, Arc::clone(&self.policy), self.session_timeout, cancel).await?;
        info!(
            "Scraped {:?}: {} paid, {} organic ({})",
            set.keywords,
            set.sea.len(),
            set.seo.len(),
            set.device
        );
        Ok(set)
    }
}
