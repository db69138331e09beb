mod analysis;
mod config;
mod errors;
mod loader;
mod metrics;
mod models;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use anyhow::Result;
use chrono::Utc;
use clap::builder::FalseyValueParser;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{AppConfig, TelemetryMode};
use crate::loader::{discover_snapshots, load_snapshot};
use crate::models::{Bucket, Device, ResultEntry, SearchResultSet};
use crate::pipeline::{Pipeline, SessionReport};
use crate::scraper::user_agents::{agents_for, DESKTOP_AGENTS, MOBILE_AGENTS};
use crate::storage::{export::export_sea, Repository};

#[derive(Parser)]
#[command(name = "serp-waste", about = "Paid vs organic placement audit for search result pages", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Search for keywords and audit the live results page
    Scrape {
        /// Search terms, joined with spaces
        #[arg(required = true, num_args = 1..)]
        keywords: Vec<String>,

        /// Force the user-agent family
        #[arg(long, env = "DEVICE")]
        device: Option<Device>,

        /// Where observations go: `prod` transmits them, anything else only logs
        #[arg(long, env = "MODE", value_parser = parse_mode)]
        mode: Option<TelemetryMode>,

        /// Also append observations to the CSV dump (`DUMP=local`)
        #[arg(
            long,
            env = "DUMP",
            num_args = 0..=1,
            require_equals = true,
            default_missing_value = "true",
            value_parser = FalseyValueParser::new()
        )]
        dump: Option<bool>,

        /// Append paid listings as flat records to this file
        #[arg(long)]
        export_sea: Option<PathBuf>,

        /// Print the result set as JSON
        #[arg(long)]
        json: bool,
    },

    /// Audit saved results pages (one search per .html file)
    Replay {
        #[arg(short, long, default_value = "snapshots")]
        dir: PathBuf,

        /// Agent the pages were fetched with
        #[arg(long)]
        user_agent: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// List the built-in user agents
    Agents {
        #[arg(long)]
        device: Option<Device>,
    },

    /// Show session history statistics
    Stats,

    /// Print the stored listings of one recorded session
    Show {
        id: i64,
    },

    /// Apply schema migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "serp_waste=info,warn",
        1 => "serp_waste=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let mut config = AppConfig::load()?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling session");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Scrape { keywords, device, mode, dump, export_sea: export_path, json } => {
            if device.is_some() {
                config.scraper.device = device;
            }
            if let Some(mode) = mode {
                config.telemetry.mode = mode;
            }
            config.telemetry.dump |= dump.unwrap_or(false);

            let namespace = config.telemetry.namespace.clone();
            let keywords = keywords.join(" ");
            let _t = utils::CommandTimer::start(format!("Scrape {:?}", keywords));

            let report = Pipeline::new(config)?.run(&keywords, &cancel).await?;
            if let Some(path) = export_path {
                export_sea(&report.set, &namespace, &path, Utc::now())?;
            }
            print_report(&report, json)?;
        }

        Command::Replay { dir, user_agent, json } => {
            let _t = utils::CommandTimer::start("Snapshot replay");
            let pipeline = Pipeline::new(config)?;
            let user_agent = user_agent.unwrap_or_else(|| pipeline.user_agent());

            let files = discover_snapshots(&dir)?;
            info!("Found {} snapshots in {:?}", files.len(), dir);

            let mut wasted = 0usize;
            let mut errors = 0usize;

            for path in &files {
                if cancel.is_cancelled() {
                    break;
                }
                let result = match load_snapshot(path) {
                    Ok((keywords, html)) => pipeline.replay(&keywords, html, &user_agent, &cancel).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(report) => {
                        wasted += usize::from(report.assessment.waste);
                        print_report(&report, json)?;
                    }
                    Err(e) => {
                        warn!("Error replaying {:?}: {:#}", path, e);
                        errors += 1;
                    }
                }
            }

            info!("Done: {} snapshots, {} wasted, {} errors", files.len(), wasted, errors);
        }

        Command::Agents { device } => {
            let families = match device {
                Some(d) => vec![(d, agents_for(d))],
                None => vec![(Device::Desktop, DESKTOP_AGENTS), (Device::Mobile, MOBILE_AGENTS)],
            };
            for (device, agents) in families {
                println!("{} ({}):", device, agents.len());
                for ua in agents {
                    println!("  {}", ua);
                }
            }
        }

        Command::Stats => {
            let repo = Repository::open(&config.storage.db_path)?;
            let sessions = repo.session_count()?;
            let (min, max) = repo.date_range().unwrap_or((None, None));
            println!("─────────────────────────────────");
            println!("  SERP waste — Session History");
            println!("─────────────────────────────────");
            println!("  Sessions : {}", utils::fmt_count(sessions));
            println!("  From     : {}", min.map(|d| d.to_string()).unwrap_or("—".into()));
            println!("  To       : {}", max.map(|d| d.to_string()).unwrap_or("—".into()));
            for s in repo.device_stats()? {
                println!(
                    "  {:<8} : {} sessions, {} wasted, density {}",
                    s.device,
                    utils::fmt_count(s.sessions),
                    utils::fmt_count(s.wasted),
                    utils::fmt_ratio(s.avg_density),
                );
            }
            println!("─────────────────────────────────");
        }

        Command::Show { id } => {
            let repo = Repository::open(&config.storage.db_path)?;
            let sea = repo.session_entries(id, Bucket::Sea)?;
            let seo = repo.session_entries(id, Bucket::Seo)?;
            if sea.is_empty() && seo.is_empty() {
                println!("No entries for session {}.", id);
            } else {
                print_entries("Paid", &sea);
                print_entries("Organic", &seo);
            }
        }

        Command::Migrate => {
            Repository::open(&config.storage.db_path)?.run_migrations()?;
            println!("Migrations applied.");
        }
    }

    Ok(())
}

fn parse_mode(value: &str) -> Result<TelemetryMode, Infallible> {
    Ok(TelemetryMode::from_flag(value))
}

fn result_set_json(set: &SearchResultSet) -> Result<String> {
    Ok(serde_json::to_string_pretty(set)?)
}

fn print_report(report: &SessionReport, json: bool) -> Result<()> {
    if json {
        println!("{}", result_set_json(&report.set)?);
        return Ok(());
    }

    let set = &report.set;
    let a = &report.assessment;
    println!("─────────────────────────────────");
    println!("  Keywords : {}", set.keywords);
    println!("  URL      : {}", set.url);
    println!("  Device   : {}", set.device);
    println!("  Agent    : {}", set.user_agent);
    print_entries("Paid", &set.sea);
    print_entries("Organic", &set.seo);
    println!("─────────────────────────────────");
    println!("  Tracked  : {}", report.tracked);
    println!("  1st paid : {}", utils::fmt_position(a.first_sea_position));
    println!("  1st org. : {}", utils::fmt_position(a.first_seo_position));
    println!("  Density  : {}", utils::fmt_ratio(a.density));
    println!("  Waste    : {}", if a.waste { "yes" } else { "no" });
    println!("─────────────────────────────────");
    Ok(())
}

fn print_entries(label: &str, entries: &[ResultEntry]) {
    println!("  {} ({}):", label, entries.len());
    for e in entries {
        if e.is_unparseable() {
            println!("    {:>3}  {} ({:?})", utils::fmt_position(e.position), e.domain, e.raw);
        } else {
            println!("    {:>3}  {}", utils::fmt_position(e.position), e.domain);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scrape_flags(cli: Cli) -> (Option<TelemetryMode>, Option<bool>) {
        match cli.command {
            Command::Scrape { mode, dump, .. } => (mode, dump),
            _ => panic!("expected the scrape command"),
        }
    }

    fn parse(args: &[&str]) -> (Option<TelemetryMode>, Option<bool>) {
        let argv = ["serp-waste", "scrape"].iter().chain(args).chain(&["train"]).copied();
        scrape_flags(Cli::try_parse_from(argv).unwrap())
    }

    #[test]
    fn test_dump_flag_values() {
        assert_eq!(parse(&["--dump=local"]).1, Some(true));
        assert_eq!(parse(&["--dump"]).1, Some(true));
        assert_eq!(parse(&["--dump=off"]).1, Some(false));
    }

    #[test]
    fn test_mode_falls_back_to_log() {
        assert_eq!(parse(&["--mode=prod"]).0, Some(TelemetryMode::Prod));
        assert_eq!(parse(&["--mode=PROD"]).0, Some(TelemetryMode::Prod));
        assert_eq!(parse(&["--mode=staging"]).0, Some(TelemetryMode::Log));
    }

    #[test]
    fn test_environment_switches() {
        // SAFETY: the only test that writes these variables; the others assert only flags they pass.
        unsafe {
            std::env::set_var("DUMP", "local");
            std::env::set_var("MODE", "dev");
        }
        let parsed = Cli::try_parse_from(["serp-waste", "scrape", "train"]).map(scrape_flags);
        unsafe {
            std::env::remove_var("DUMP");
            std::env::remove_var("MODE");
        }

        let (mode, dump) = parsed.unwrap();
        assert_eq!(dump, Some(true));
        assert_eq!(mode, Some(TelemetryMode::Log));
    }

    #[test]
    fn test_json_output_is_the_result_set() {
        let set = SearchResultSet {
            keywords: "paris lyon".into(),
            url: "http://www.google.com/search?q=paris+lyon".into(),
            user_agent: DESKTOP_AGENTS[0].into(),
            device: Device::Desktop,
            seo: vec![],
            sea: vec![ResultEntry {
                position: 0,
                css_selector: "span".into(),
                raw: "www.oui.sncf/billets".into(),
                domain: "www.oui.sncf".into(),
            }],
        };

        let value: serde_json::Value = serde_json::from_str(&result_set_json(&set).unwrap()).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["keywords", "mobile", "sea", "seo", "url", "userAgent"]);
        assert_eq!(value["mobile"], "desktop");
        assert_eq!(value["sea"][0]["cssSelector"], "span");
        assert_eq!(value["sea"][0]["domain"], "www.oui.sncf");
    }
}
