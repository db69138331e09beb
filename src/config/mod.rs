use crate::models::Device;
use crate::scraper::cleaner::normalize_domain;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// How paid listings are located around an ad marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeaStrategy {
    /// First sibling of the marker whose text is a hostname, ranked.
    #[default]
    Sibling,
    /// First `cite` under the marker's parent, unranked.
    ParentCite,
}

/// Scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_allowed_domains")]
    pub allowed_domains: Vec<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Bounded wait for the traversal-complete signal.
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Forces the user-agent family and is checked against the chosen agent.
    #[serde(default)]
    pub device: Option<Device>,

    /// Fixed user agent instead of a random pick from the built-in table.
    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default = "default_ad_label")]
    pub ad_label: String,

    #[serde(default)]
    pub sea_strategy: SeaStrategy,
}

/// Domain whose paid and organic placements are compared
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackingConfig {
    #[serde(default = "default_tracked_domain")]
    pub domain: String,

    /// Near-duplicate brand domain for the adjacency rule.
    #[serde(default = "default_parent_domain")]
    pub parent_domain: Option<String>,

    #[serde(default)]
    pub density_includes_parent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryMode {
    /// Observations go to the log only
    #[default]
    Log,
    /// Observations are transmitted to Graphite
    Prod,
}

impl TelemetryMode {
    /// `prod` (any case) transmits; every other value only logs.
    pub fn from_flag(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("prod") {
            TelemetryMode::Prod
        } else {
            TelemetryMode::Log
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub mode: TelemetryMode,

    #[serde(default = "default_graphite_host")]
    pub graphite_host: String,

    #[serde(default = "default_graphite_port")]
    pub graphite_port: u16,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default)]
    pub dump: bool,

    #[serde(default = "default_dump_path")]
    pub dump_path: PathBuf,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "http://www.google.com".to_string()
}
fn default_allowed_domains() -> Vec<String> {
    vec!["google.com".to_string(), "www.google.com".to_string()]
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_session_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_ms() -> u64 {
    500
}
fn default_ad_label() -> String {
    "Annonce".to_string()
}
fn default_tracked_domain() -> String {
    "www.oui.sncf".to_string()
}
fn default_parent_domain() -> Option<String> {
    Some("www.sncf.com".to_string())
}
fn default_graphite_host() -> String {
    "127.0.0.1".to_string()
}
fn default_graphite_port() -> u16 {
    2003
}
fn default_namespace() -> String {
    "serp.adwords".to_string()
}
fn default_dump_path() -> PathBuf {
    PathBuf::from("result.csv")
}
fn default_db_path() -> PathBuf {
    PathBuf::from("data/serp.duckdb")
}
fn default_true() -> bool {
    true
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            allowed_domains: default_allowed_domains(),
            timeout_secs: default_timeout_secs(),
            session_timeout_secs: default_session_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            device: None,
            user_agent: None,
            ad_label: default_ad_label(),
            sea_strategy: SeaStrategy::default(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            domain: default_tracked_domain(),
            parent_domain: default_parent_domain(),
            density_includes_parent: false,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            mode: TelemetryMode::default(),
            graphite_host: default_graphite_host(),
            graphite_port: default_graphite_port(),
            namespace: default_namespace(),
            dump: false,
            dump_path: default_dump_path(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: default_db_path(),
            run_migrations: true,
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::Environment::with_prefix("SERP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("scraper.allowed_domains")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration sources")?;

        let mut config: AppConfig = cfg.try_deserialize().context("Invalid configuration")?;
        config.tracking = config.tracking.normalized();
        Ok(config)
    }
}

impl TrackingConfig {
    /// Canonical hostnames, so they compare equal to extracted domains.
    pub fn normalized(self) -> Self {
        let canonical = |d: &str| normalize_domain(d).unwrap_or_else(|| d.trim().to_lowercase());
        Self {
            domain: canonical(self.domain.as_str()),
            parent_domain: self.parent_domain.as_deref().map(canonical),
            density_includes_parent: self.density_includes_parent,
        }
    }
}
