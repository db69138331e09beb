//! One scrape session: a single writer phase while the document is traversed,
//! then a read-only `SearchResultSet` once the completion signal arrives.
//!
//! Extraction runs on a blocking thread and sends listings over a channel; the
//! aggregator is owned by the receiving side, so every append is exclusive.

use crate::errors::ScrapeError;
use crate::models::{Bucket, Device, ResultEntry, SearchResultSet, UNTRACKED_POSITION};
use crate::scraper::parsers::{traverse, Extracted, ExtractionSink, SelectorPolicy, TraversalCounts};
use crate::scraper::user_agents::classify;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

// ── Aggregator ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ResultSetAggregator {
    set: SearchResultSet,
    next_sea: i64,
    next_seo: i64,
}

impl ResultSetAggregator {
    /// Traversal-start: captures request url and user agent and fixes the device.
    /// Fails when the agent's own classification contradicts the forced device.
    pub fn start(
        keywords: &str,
        url: &str,
        user_agent: &str,
        forced: Option<Device>,
    ) -> Result<Self, ScrapeError> {
        let detected = classify(user_agent);
        if let Some(configured) = forced {
            if configured != detected {
                return Err(ScrapeError::DeviceMismatch {
                    detected,
                    configured,
                    user_agent: user_agent.to_string(),
                });
            }
        }

        info!("Request: {} ({})", url, detected);
        Ok(Self {
            set: SearchResultSet {
                keywords: keywords.to_string(),
                url: url.to_string(),
                user_agent: user_agent.to_string(),
                device: detected,
                seo: Vec::new(),
                sea: Vec::new(),
            },
            next_sea: 0,
            next_seo: 0,
        })
    }

    pub fn device(&self) -> Device {
        self.set.device
    }

    pub fn url(&self) -> &str {
        &self.set.url
    }

    /// Ranked listings take the next position of their bucket; unranked ones get -1.
    pub fn append(&mut self, bucket: Bucket, listing: Extracted) {
        let (entries, next) = match bucket {
            Bucket::Sea => (&mut self.set.sea, &mut self.next_sea),
            Bucket::Seo => (&mut self.set.seo, &mut self.next_seo),
        };

        let position = if listing.ranked {
            let p = *next;
            *next += 1;
            p
        } else {
            UNTRACKED_POSITION
        };

        entries.push(ResultEntry {
            position,
            css_selector: listing.selector.to_string(),
            raw: listing.raw,
            domain: listing.domain,
        });
    }

    pub fn finalize(self) -> SearchResultSet {
        self.set
    }
}

// ── Traversal events ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum TraversalEvent {
    Listing(Bucket, Extracted),
    Complete(TraversalCounts),
}

struct ChannelSink {
    tx: mpsc::UnboundedSender<TraversalEvent>,
}

impl ChannelSink {
    // Send errors mean the session was abandoned and its results are discarded.
    fn send(&self, event: TraversalEvent) {
        let _ = self.tx.send(event);
    }
}

impl ExtractionSink for ChannelSink {
    fn paid(&mut self, listing: Extracted) {
        self.send(TraversalEvent::Listing(Bucket::Sea, listing));
    }

    fn organic(&mut self, listing: Extracted) {
        self.send(TraversalEvent::Listing(Bucket::Seo, listing));
    }
}

/// Traverse `html` and fold the listings into `aggregator` until the completion
/// signal, the `wait` deadline or cancellation, whichever comes first.
pub async fn collect(
    mut aggregator: ResultSetAggregator,
    html: String,
    policy: Arc<SelectorPolicy>,
    wait: Duration,
    cancel: &CancellationToken,
) -> Result<SearchResultSet, ScrapeError> {
    let device = aggregator.device();
    let (tx, mut rx) = mpsc::unbounded_channel();

    tokio::task::spawn_blocking(move || {
        let mut sink = ChannelSink { tx };
        let counts = traverse(&html, &policy, device, &mut sink);
        sink.send(TraversalEvent::Complete(counts));
    });

    let drain = async move {
        while let Some(event) = rx.recv().await {
            match event {
                TraversalEvent::Listing(bucket, listing) => aggregator.append(bucket, listing),
                TraversalEvent::Complete(counts) => {
                    debug!("Completion signal: {:?}", counts);
                    return Ok(aggregator.finalize());
                }
            }
        }
        Err(ScrapeError::TraversalAborted)
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ScrapeError::Cancelled),
        outcome = tokio::time::timeout(wait, drain) => {
            outcome.unwrap_or(Err(ScrapeError::Timeout(wait)))
        }
    }
}
