pub mod export;

use crate::analysis::WasteAssessment;
use crate::models::{Bucket, ResultEntry, SearchResultSet};
use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use duckdb::{params, Connection};
use std::path::Path;
use tracing::info;

// ── Schema ────────────────────────────────────────────────────────────────────

const DDL: &str = r#"
CREATE SEQUENCE IF NOT EXISTS session_ids START 1;

CREATE TABLE IF NOT EXISTS sessions (
    id          BIGINT PRIMARY KEY DEFAULT nextval('session_ids'),
    keywords    VARCHAR   NOT NULL,
    url         VARCHAR   NOT NULL,
    user_agent  VARCHAR   NOT NULL,
    device      VARCHAR   NOT NULL,
    tracked     VARCHAR   NOT NULL,
    sea_count   BIGINT    NOT NULL,
    seo_count   BIGINT    NOT NULL,
    first_sea   BIGINT    NOT NULL,
    first_seo   BIGINT    NOT NULL,
    -- NULL when the page had no organic listings
    density     DOUBLE,
    waste       BOOLEAN   NOT NULL,
    scraped_at  TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS entries (
    session_id    BIGINT  NOT NULL,
    bucket        VARCHAR NOT NULL,
    ordinal       BIGINT  NOT NULL,
    position      BIGINT  NOT NULL,
    css_selector  VARCHAR NOT NULL,
    raw           VARCHAR NOT NULL,
    domain        VARCHAR NOT NULL,
    PRIMARY KEY (session_id, bucket, ordinal)
);

CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TIMESTAMP NOT NULL
);
"#;

const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_sessions_device ON sessions (device);
CREATE INDEX IF NOT EXISTS idx_entries_domain  ON entries (domain);
"#;

/// Per-device summary for the `stats` command.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStats {
    pub device: String,
    pub sessions: i64,
    pub wasted: i64,
    pub avg_density: Option<f64>,
}

// ── Repository ────────────────────────────────────────────────────────────────

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open DuckDB at {:?}", path))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn run_migrations(&self) -> Result<()> {
        info!("Running migrations…");
        self.conn.execute_batch(DDL).context("DDL failed")?;
        self.conn.execute_batch(INDEXES).context("Index creation failed")?;
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, ?)",
            params![Utc::now().naive_utc()],
        )?;
        info!("Migrations done.");
        Ok(())
    }

    // ── Sessions ──────────────────────────────────────────────────────────────

    /// Store a finished session with its entries. Returns the session id.
    pub fn record_session(
        &self,
        set: &SearchResultSet,
        tracked: &str,
        assessment: &WasteAssessment,
    ) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;

        let id: i64 = tx
            .query_row(
                r#"INSERT INTO sessions
                       (keywords, url, user_agent, device, tracked,
                        sea_count, seo_count, first_sea, first_seo, density, waste, scraped_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                   RETURNING id"#,
                params![
                    set.keywords,
                    set.url,
                    set.user_agent,
                    set.device.as_str(),
                    tracked,
                    set.sea.len() as i64,
                    set.seo.len() as i64,
                    assessment.first_sea_position,
                    assessment.first_seo_position,
                    assessment.density,
                    assessment.waste,
                    Utc::now().naive_utc(),
                ],
                |r| r.get(0),
            )
            .with_context(|| format!("insert session {:?}", set.keywords))?;

        for bucket in [Bucket::Sea, Bucket::Seo] {
            for (ordinal, e) in set.bucket(bucket).iter().enumerate() {
                tx.execute(
                    r#"INSERT INTO entries
                           (session_id, bucket, ordinal, position, css_selector, raw, domain)
                       VALUES (?, ?, ?, ?, ?, ?, ?)"#,
                    params![id, bucket.as_str(), ordinal as i64, e.position, e.css_selector, e.raw, e.domain],
                )
                .with_context(|| format!("insert {} entry {} of session {}", bucket.as_str(), ordinal, id))?;
            }
        }

        tx.commit()?;
        Ok(id)
    }

    pub fn session_entries(&self, session_id: i64, bucket: Bucket) -> Result<Vec<ResultEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT position, css_selector, raw, domain FROM entries
             WHERE session_id = ? AND bucket = ? ORDER BY ordinal",
        )?;
        let entries = stmt
            .query_map(params![session_id, bucket.as_str()], |r| {
                Ok(ResultEntry {
                    position: r.get(0)?,
                    css_selector: r.get(1)?,
                    raw: r.get(2)?,
                    domain: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn session_count(&self) -> Result<i64> {
        let mut s = self.conn.prepare("SELECT COUNT(*) FROM sessions")?;
        Ok(s.query_row([], |r| r.get(0))?)
    }

    pub fn date_range(&self) -> Result<(Option<NaiveDateTime>, Option<NaiveDateTime>)> {
        let mut s = self.conn.prepare("SELECT MIN(scraped_at), MAX(scraped_at) FROM sessions")?;
        Ok(s.query_row([], |r| Ok((r.get(0)?, r.get(1)?)))?)
    }

    pub fn device_stats(&self) -> Result<Vec<DeviceStats>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT device,
                      COUNT(*),
                      COUNT(*) FILTER (WHERE waste),
                      AVG(density)
               FROM sessions
               GROUP BY device
               ORDER BY device"#,
        )?;
        let stats = stmt
            .query_map([], |r| {
                Ok(DeviceStats {
                    device: r.get(0)?,
                    sessions: r.get(1)?,
                    wasted: r.get(2)?,
                    avg_density: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Device;

    fn entry(position: i64, domain: &str) -> ResultEntry {
        ResultEntry {
            position,
            css_selector: "span".into(),
            raw: format!("{}/", domain),
            domain: domain.into(),
        }
    }

    fn session(device: Device) -> SearchResultSet {
        SearchResultSet {
            keywords: "train paris".into(),
            url: "http://www.google.com/search?q=train+paris".into(),
            user_agent: "ua".into(),
            device,
            sea: vec![entry(0, "www.kayak.fr"), entry(1, "www.oui.sncf")],
            seo: vec![entry(0, "www.oui.sncf")],
        }
    }

    fn repo() -> Repository {
        let repo = Repository::open_in_memory().unwrap();
        repo.run_migrations().unwrap();
        repo
    }

    #[test]
    fn test_record_session_roundtrips_entries() {
        let repo = repo();
        let set = session(Device::Desktop);
        let assessment = WasteAssessment {
            first_sea_position: 1,
            first_seo_position: 0,
            density: Some(1.0),
            waste: true,
        };

        let id = repo.record_session(&set, "www.oui.sncf", &assessment).unwrap();
        assert_eq!(repo.session_entries(id, Bucket::Sea).unwrap(), set.sea);
        assert_eq!(repo.session_entries(id, Bucket::Seo).unwrap(), set.seo);
        assert_eq!(repo.session_count().unwrap(), 1);
    }

    #[test]
    fn test_device_stats() {
        let repo = repo();
        let wasted = WasteAssessment {
            first_sea_position: 1,
            first_seo_position: 0,
            density: Some(0.5),
            waste: true,
        };
        let kept = WasteAssessment {
            waste: false,
            density: None,
            ..wasted
        };

        repo.record_session(&session(Device::Desktop), "www.oui.sncf", &wasted).unwrap();
        repo.record_session(&session(Device::Desktop), "www.oui.sncf", &kept).unwrap();
        repo.record_session(&session(Device::Mobile), "www.oui.sncf", &kept).unwrap();

        let stats = repo.device_stats().unwrap();
        assert_eq!(
            stats,
            vec![
                DeviceStats { device: "desktop".into(), sessions: 2, wasted: 1, avg_density: Some(0.5) },
                DeviceStats { device: "mobile".into(), sessions: 1, wasted: 0, avg_density: None },
            ]
        );
        let (first, last) = repo.date_range().unwrap();
        assert!(first.is_some() && first <= last);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let repo = repo();
        repo.run_migrations().unwrap();
        assert_eq!(repo.session_count().unwrap(), 0);
    }
}
