//! Console helpers for the CLI commands.

use std::time::Instant;
use tracing::info;

/// Logs how long a CLI command ran once it goes out of scope.
pub struct CommandTimer {
    command: String,
    started: Instant,
}

impl CommandTimer {
    pub fn start(command: impl Into<String>) -> Self {
        let command = command.into();
        info!(command = %command, "started");
        Self {
            command,
            started: Instant::now(),
        }
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        info!(command = %self.command, elapsed = ?self.started.elapsed(), "finished");
    }
}

/// Session counts with thousands separators: 12345 → "12,345".
pub fn fmt_count(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let groups: Vec<&str> = digits
        .as_bytes()
        .rchunks(3)
        .rev()
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .collect();
    let sign = if n < 0 { "-" } else { "" };
    format!("{}{}", sign, groups.join(","))
}

/// Untracked positions print as a dash.
pub fn fmt_position(position: i64) -> String {
    if position < 0 { "—".to_string() } else { position.to_string() }
}

pub fn fmt_ratio(ratio: Option<f64>) -> String {
    ratio.map_or_else(|| "—".to_string(), |r| format!("{:.1}%", r * 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_count() {
        assert_eq!(fmt_count(0), "0");
        assert_eq!(fmt_count(999), "999");
        assert_eq!(fmt_count(12_345), "12,345");
        assert_eq!(fmt_count(-1_000_000), "-1,000,000");
    }

    #[test]
    fn test_fmt_position() {
        assert_eq!(fmt_position(0), "0");
        assert_eq!(fmt_position(-1), "—");
    }

    #[test]
    fn test_fmt_ratio() {
        assert_eq!(fmt_ratio(Some(0.25)), "25.0%");
        assert_eq!(fmt_ratio(None), "—");
    }
}
