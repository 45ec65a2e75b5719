//! Engagement Report — computes active-user series and cohort retention
//! tables from an exported session set and prints the dashboard payload.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use engagement_core::config::AppConfig;
use engagement_core::{DateRange, SessionRecord};
use engagement_reporting::{AssembleRequest, EngagementDashboard, GranularityMode};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "engagement-report")]
#[command(about = "Active-user and cohort retention report over recorded sessions")]
#[command(version)]
struct Cli {
    /// JSON array of session records (`-` reads stdin)
    #[arg(long)]
    sessions: PathBuf,

    /// Granularity mode: last7days, lastMonth, last3Months, lastYear (overrides config)
    #[arg(long, env = "ENGAGEMENT__REPORTING__DEFAULT_MODE")]
    mode: Option<String>,

    /// JSON array of all-time user ids, used for empty summary windows
    #[arg(long)]
    all_time_users: Option<PathBuf>,

    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// TOML config file
    #[arg(long, env = "ENGAGEMENT_CONFIG")]
    config: Option<PathBuf>,

    /// Pretty-print the payload
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading sessions from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(Some(path))
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(AppConfig::load(None).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load config, using defaults");
            AppConfig::default()
        })),
    }
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries only the payload.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "engagement_report=info,engagement_reporting=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let mut request = AssembleRequest::from_config(&config.reporting)
        .context("invalid reporting.default_mode")?;
    if let Some(mode) = &cli.mode {
        let mode: GranularityMode = mode.parse()?;
        request = request.with_mode(mode);
    }
    if cli.from.is_some() || cli.to.is_some() {
        let start = cli.from.unwrap_or(NaiveDate::MIN);
        let end = cli.to.unwrap_or(NaiveDate::MAX);
        request = request.with_range(DateRange::new(start, end)?);
    }
    if let Some(path) = &cli.all_time_users {
        let users: Vec<String> = serde_json::from_str(&read_source(path)?)
            .with_context(|| format!("parsing {}", path.display()))?;
        request = request.with_all_time_users(users);
    }

    let sessions: Vec<SessionRecord> = serde_json::from_str(&read_source(&cli.sessions)?)
        .context("parsing session records")?;

    info!(
        site_id = %config.site_id,
        mode = %request.mode,
        sessions = sessions.len(),
        "Computing engagement report"
    );

    let payload = EngagementDashboard::new(request)?.assemble(&sessions);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if cli.pretty {
        serde_json::to_writer_pretty(&mut out, &payload)?;
    } else {
        serde_json::to_writer(&mut out, &payload)?;
    }
    writeln!(out)?;
    Ok(())
}
