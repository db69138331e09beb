use crate::metrics::sinks::RECORD_TIME_FORMAT;
use crate::models::SearchResultSet;
use crate::scraper::cleaner::metric_segment;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// One `[timestamp, <namespace>.<device>.sea.<domain>, position]` row per paid
/// listing, in page order.
pub fn write_sea_rows<W: Write>(
    writer: W,
    set: &SearchResultSet,
    namespace: &str,
    at: DateTime<Utc>,
) -> Result<usize> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    let stamp = at.format(RECORD_TIME_FORMAT).to_string();

    for entry in &set.sea {
        wtr.write_record([
            stamp.clone(),
            format!("{}.{}.sea.{}", namespace, set.device, metric_segment(&entry.domain)),
            entry.position.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(set.sea.len())
}

/// Append the paid listings of `set` to `path`.
pub fn export_sea(set: &SearchResultSet, namespace: &str, path: &Path, at: DateTime<Utc>) -> Result<usize> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {:?}", path))?;

    let n = write_sea_rows(file, set, namespace, at)?;
    info!("Exported {} paid rows to {:?}", n, path);
    Ok(n)
}
