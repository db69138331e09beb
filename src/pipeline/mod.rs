//! Session orchestrator: ties scraper → analysis → metrics → storage together.
//!
//! ## Run modes
//!
//! `run()`: live mode
//!   1. Pick a user agent (fixed by config, or random from the device family)
//!   2. Open the session; a device/agent conflict aborts here, before any request
//!   3. Fetch the results page and extract paid and organic listings
//!   4. Assess waste for the tracked domain, emit observations, record history
//!
//! `replay()`: same steps 2-4 against a saved page, no network.

use crate::analysis::{self, WasteAssessment};
use crate::config::AppConfig;
use crate::metrics::MetricsEmitter;
use crate::models::SearchResultSet;
use crate::scraper::http_client::HttpClient;
use crate::scraper::session::ResultSetAggregator;
use crate::scraper::{user_agents, PageSource, SerpScraper, StaticPage};
use crate::storage::Repository;
use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub set: SearchResultSet,
    pub assessment: WasteAssessment,
    pub tracked: String,
    pub samples: usize,
    /// Row id in the history store, when recording is enabled and succeeded.
    pub session_id: Option<i64>,
}

pub struct Pipeline {
    config: AppConfig,
    scraper: SerpScraper,
    emitter: MetricsEmitter,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Result<Self> {
        let scraper = SerpScraper::new(&config.scraper).context("Failed to build scraper")?;
        let emitter = MetricsEmitter::from_config(&config.telemetry);
        Ok(Self { config, scraper, emitter })
    }

    /// Configured agent, or a random one from the forced device family.
    pub fn user_agent(&self) -> String {
        match &self.config.scraper.user_agent {
            Some(ua) => ua.clone(),
            None => user_agents::pick(self.config.scraper.device).to_string(),
        }
    }

    pub async fn run(&self, keywords: &str, cancel: &CancellationToken) -> Result<SessionReport> {
        let user_agent = self.user_agent();
        let session = self.scraper.open_session(keywords, &user_agent)?;
        let client = HttpClient::new(&self.config.scraper, &user_agent)?;
        self.complete(&client, session, cancel).await
    }

    pub async fn run_with(
        &self,
        source: &dyn PageSource,
        keywords: &str,
        user_agent: &str,
        cancel: &CancellationToken,
    ) -> Result<SessionReport> {
        let session = self.scraper.open_session(keywords, user_agent)?;
        self.complete(source, session, cancel).await
    }

    pub async fn replay(
        &self,
        keywords: &str,
        html: String,
        user_agent: &str,
        cancel: &CancellationToken,
    ) -> Result<SessionReport> {
        self.run_with(&StaticPage::new(html), keywords, user_agent, cancel).await
    }

    async fn complete(
        &self,
        source: &dyn PageSource,
        session: ResultSetAggregator,
        cancel: &CancellationToken,
    ) -> Result<SessionReport> {
        let set = self.scraper.scrape(source, session, cancel).await?;
        let tracking = &self.config.tracking;
        let assessment = analysis::assess(&set, tracking);

        let unranked = set.sea.iter().filter(|e| !e.is_ranked()).count();
        if unranked > 0 {
            debug!("{} paid listings carry no position", unranked);
        }

        info!(
            "{:?} [{}]: first paid {} | first organic {} | waste {}",
            set.keywords, set.device, assessment.first_sea_position, assessment.first_seo_position, assessment.waste
        );

        let samples = self.emitter.emit(&set, &assessment).await;
        let session_id = self.record(&set, &assessment);

        Ok(SessionReport {
            set,
            assessment,
            tracked: tracking.domain.clone(),
            samples,
            session_id,
        })
    }

    /// History is best-effort: a storage failure never fails the session.
    fn record(&self, set: &SearchResultSet, assessment: &WasteAssessment) -> Option<i64> {
        let storage = &self.config.storage;
        if !storage.enabled {
            return None;
        }

        let result = Repository::open(&storage.db_path).and_then(|repo| {
            if storage.run_migrations {
                repo.run_migrations()?;
            }
            repo.record_session(set, &self.config.tracking.domain, assessment)
        });

        match result {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Session history not recorded: {:#}", e);
                None
            }
        }
    }
}
