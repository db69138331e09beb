//! Flattens a finished session into named scalar observations and hands them
//! to the configured sinks. Sinks may reorder; consumers must not rely on order.

pub mod sinks;

use crate::analysis::WasteAssessment;
use crate::config::{TelemetryConfig, TelemetryMode};
use crate::models::{Device, SearchResultSet};
use crate::scraper::cleaner::metric_segment;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

use self::sinks::{CsvDumpSink, GraphiteSink, LogSink};

#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub name: String,
    pub value: MetricValue,
}

impl Observation {
    fn new(name: impl Into<String>, value: MetricValue) -> Self {
        Self { name: name.into(), value }
    }
}

/// An observation with its full key and timestamp, as sinks receive it.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub key: String,
    pub value: MetricValue,
    pub at: DateTime<Utc>,
}

/// Counts, waste flag, density, one entry per paid listing and one per
/// distinct organic domain at its first position.
pub fn observations(set: &SearchResultSet, assessment: &WasteAssessment) -> Vec<Observation> {
    let mut out = vec![
        Observation::new("sea.count", MetricValue::Int(set.sea.len() as i64)),
        Observation::new("seo.count", MetricValue::Int(set.seo.len() as i64)),
        Observation::new("waste", MetricValue::Int(i64::from(assessment.waste))),
    ];

    match assessment.density {
        Some(density) => out.push(Observation::new("seo.density", MetricValue::Float(density))),
        None => warn!("No organic entries for {:?}, seo.density not emitted", set.keywords),
    }

    for sea in &set.sea {
        out.push(Observation::new(
            format!("sea.{}", metric_segment(&sea.domain)),
            MetricValue::Int(sea.position),
        ));
    }

    let mut seen = HashSet::new();
    for seo in &set.seo {
        if !seen.insert(seo.domain.as_str()) {
            continue;
        }
        out.push(Observation::new(
            format!("seo.{}", metric_segment(&seo.domain)),
            MetricValue::Int(seo.position),
        ));
    }

    out
}

// ── Sinks ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait MetricSink: Send + Sync {
    fn name(&self) -> &'static str;
    async fn publish(&self, samples: &[Sample]) -> Result<()>;
}

pub struct MetricsEmitter {
    namespace: String,
    sinks: Vec<Box<dyn MetricSink>>,
}

impl MetricsEmitter {
    pub fn new(namespace: impl Into<String>, sinks: Vec<Box<dyn MetricSink>>) -> Self {
        Self {
            namespace: namespace.into(),
            sinks,
        }
    }

    /// Log-only or Graphite transport, plus the CSV dump when enabled.
    pub fn from_config(config: &TelemetryConfig) -> Self {
        let mut sinks: Vec<Box<dyn MetricSink>> = Vec::new();
        match config.mode {
            TelemetryMode::Log => sinks.push(Box::new(LogSink)),
            TelemetryMode::Prod => sinks.push(Box::new(GraphiteSink::new(
                config.graphite_host.clone(),
                config.graphite_port,
            ))),
        }
        if config.dump {
            sinks.push(Box::new(CsvDumpSink::new(config.dump_path.clone())));
        }
        Self::new(config.namespace.clone(), sinks)
    }

    /// `<namespace>.<device>`
    pub fn prefix(&self, device: Device) -> String {
        format!("{}.{}", self.namespace, device)
    }

    pub fn samples(&self, set: &SearchResultSet, assessment: &WasteAssessment, at: DateTime<Utc>) -> Vec<Sample> {
        let prefix = self.prefix(set.device);
        observations(set, assessment)
            .into_iter()
            .map(|o| Sample {
                key: format!("{}.{}", prefix, o.name),
                value: o.value,
                at,
            })
            .collect()
    }

    /// Sink failures are logged and do not fail the session.
    pub async fn emit(&self, set: &SearchResultSet, assessment: &WasteAssessment) -> usize {
        let samples = self.samples(set, assessment, Utc::now());

        for sink in &self.sinks {
            match sink.publish(&samples).await {
                Ok(()) => debug!("{}: {} samples", sink.name(), samples.len()),
                Err(e) => warn!("{} sink failed: {:#}", sink.name(), e),
            }
        }

        samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResultEntry;
    use std::sync::{Arc, Mutex};

    fn entry(position: i64, domain: &str) -> ResultEntry {
        ResultEntry {
            position,
            css_selector: "div[id=ires]".into(),
            raw: domain.into(),
            domain: domain.into(),
        }
    }

    fn session(sea: Vec<ResultEntry>, seo: Vec<ResultEntry>) -> SearchResultSet {
        SearchResultSet {
            keywords: "train".into(),
            url: "http://www.google.com/search?q=train".into(),
            user_agent: "ua".into(),
            device: Device::Mobile,
            sea,
            seo,
        }
    }

    fn assessment(density: Option<f64>, waste: bool) -> WasteAssessment {
        WasteAssessment {
            first_sea_position: 0,
            first_seo_position: 0,
            density,
            waste,
        }
    }

    fn find<'a>(obs: &'a [Observation], name: &str) -> Option<&'a MetricValue> {
        obs.iter().find(|o| o.name == name).map(|o| &o.value)
    }

    #[test]
    fn test_organic_domains_keep_first_position() {
        let s = session(
            vec![],
            vec![entry(0, "a.com"), entry(1, "b.com"), entry(2, "a.com"), entry(3, "c.com")],
        );
        let obs = observations(&s, &assessment(Some(0.5), false));

        let seo: Vec<_> = obs
            .iter()
            .filter(|o| o.name.starts_with("seo.") && o.name != "seo.count" && o.name != "seo.density")
            .map(|o| (o.name.as_str(), o.value.clone()))
            .collect();
        assert_eq!(
            seo,
            [
                ("seo.a_com", MetricValue::Int(0)),
                ("seo.b_com", MetricValue::Int(1)),
                ("seo.c_com", MetricValue::Int(3)),
            ]
        );
    }

    #[test]
    fn test_every_paid_listing_is_observed() {
        let s = session(
            vec![entry(0, "www.oui.sncf"), entry(1, "unparseable"), entry(2, "www.oui.sncf")],
            vec![entry(0, "www.oui.sncf")],
        );
        let obs = observations(&s, &assessment(Some(1.0), true));

        assert_eq!(find(&obs, "sea.count"), Some(&MetricValue::Int(3)));
        assert_eq!(find(&obs, "seo.count"), Some(&MetricValue::Int(1)));
        assert_eq!(find(&obs, "waste"), Some(&MetricValue::Int(1)));
        assert_eq!(find(&obs, "seo.density"), Some(&MetricValue::Float(1.0)));
        assert_eq!(find(&obs, "sea.unparseable"), Some(&MetricValue::Int(1)));
        assert_eq!(obs.iter().filter(|o| o.name == "sea.www_oui_sncf").count(), 2);
    }

    #[test]
    fn test_missing_density_is_not_emitted() {
        let obs = observations(&session(vec![], vec![]), &assessment(None, false));
        assert!(find(&obs, "seo.density").is_none());
        assert_eq!(find(&obs, "waste"), Some(&MetricValue::Int(0)));
    }

    struct Recording {
        seen: Arc<Mutex<Vec<Sample>>>,
    }

    #[async_trait]
    impl MetricSink for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }
        async fn publish(&self, samples: &[Sample]) -> Result<()> {
            self.seen.lock().unwrap().extend_from_slice(samples);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl MetricSink for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        async fn publish(&self, _samples: &[Sample]) -> Result<()> {
            anyhow::bail!("down")
        }
    }

    #[tokio::test]
    async fn test_emit_prefixes_keys_and_survives_sink_failure() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let emitter = MetricsEmitter::new(
            "serp.adwords",
            vec![Box::new(Failing), Box::new(Recording { seen: Arc::clone(&seen) })],
        );
        let s = session(vec![entry(0, "www.oui.sncf")], vec![entry(0, "www.sncf.com")]);
        let n = emitter.emit(&s, &assessment(Some(0.0), false)).await;

        let seen = seen.lock().unwrap();
        assert_eq!(n, seen.len());
        assert!(seen.iter().any(|x| x.key == "serp.adwords.mobile.sea.www_oui_sncf"));
        assert!(seen.iter().any(|x| x.key == "serp.adwords.mobile.seo.www_sncf_com"));
        assert!(seen.iter().all(|x| x.at == seen[0].at));
    }
}
