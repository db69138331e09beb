use super::{MetricSink, Sample};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::info;

/// Timestamp layout of flat-file records.
pub const RECORD_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ── Log ───────────────────────────────────────────────────────────────────────

/// Local-only mode: every sample goes to the log.
pub struct LogSink;

#[async_trait]
impl MetricSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn publish(&self, samples: &[Sample]) -> Result<()> {
        for s in samples {
            info!(key = %s.key, value = %s.value, "metric");
        }
        Ok(())
    }
}

// ── Graphite ──────────────────────────────────────────────────────────────────

/// Plaintext protocol, one connection per batch.
pub struct GraphiteSink {
    addr: String,
}

impl GraphiteSink {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            addr: format!("{}:{}", host.into(), port),
        }
    }

    /// `<key> <value> <unix-ts>\n`
    pub fn line(sample: &Sample) -> String {
        format!("{} {} {}\n", sample.key, sample.value, sample.at.timestamp())
    }
}

#[async_trait]
impl MetricSink for GraphiteSink {
    fn name(&self) -> &'static str {
        "graphite"
    }

    async fn publish(&self, samples: &[Sample]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let mut stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.addr))
            .await
            .with_context(|| format!("Timed out connecting to {}", self.addr))?
            .with_context(|| format!("Failed to connect to {}", self.addr))?;

        let payload: String = samples.iter().map(Self::line).collect();
        stream
            .write_all(payload.as_bytes())
            .await
            .context("Failed to write to graphite")?;
        stream.shutdown().await.ok();
        Ok(())
    }
}

// ── CSV dump ──────────────────────────────────────────────────────────────────

/// Appends `[timestamp, key, value]` rows, creating the file on first use.
pub struct CsvDumpSink {
    path: PathBuf,
}

impl CsvDumpSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl MetricSink for CsvDumpSink {
    fn name(&self) -> &'static str {
        "csv"
    }

    async fn publish(&self, samples: &[Sample]) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {:?}", self.path))?;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        for s in samples {
            writer.write_record([
                s.at.format(RECORD_TIME_FORMAT).to_string(),
                s.key.clone(),
                s.value.to_string(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricValue;
    use chrono::{TimeZone, Utc};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn sample(key: &str, value: MetricValue) -> Sample {
        Sample {
            key: key.to_string(),
            value,
            at: Utc.with_ymd_and_hms(2018, 6, 21, 14, 30, 5).unwrap(),
        }
    }

    #[test]
    fn test_graphite_line() {
        let line = GraphiteSink::line(&sample("serp.adwords.desktop.seo.density", MetricValue::Float(0.25)));
        assert_eq!(line, "serp.adwords.desktop.seo.density 0.25 1529591405\n");
    }

    #[tokio::test]
    async fn test_graphite_sink_writes_plaintext() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = String::new();
            socket.read_to_string(&mut received).await.unwrap();
            received
        });

        let sink = GraphiteSink::new("127.0.0.1", port);
        sink.publish(&[
            sample("a.sea.count", MetricValue::Int(3)),
            sample("a.waste", MetricValue::Int(1)),
        ])
        .await
        .unwrap();

        let received = server.await.unwrap();
        assert_eq!(received, "a.sea.count 3 1529591405\na.waste 1 1529591405\n");
    }

    #[test]
    fn test_csv_dump_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.csv");
        let sink = CsvDumpSink::new(path.clone());

        tokio_test::block_on(sink.publish(&[sample("a.waste", MetricValue::Int(0))])).unwrap();
        tokio_test::block_on(sink.publish(&[sample("a.sea.www_oui_sncf", MetricValue::Int(2))])).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "20180621143005,a.waste,0\n20180621143005,a.sea.www_oui_sncf,2\n"
        );
    }
}
