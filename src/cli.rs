use chrono::{DateTime, Utc};
use clap::Parser;

/// Periodically probes hosts and serves uptime and downtime statistics.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Print an availability report for the window and exit
    #[arg(long)]
    pub report: bool,
    #[arg(long, value_parser = clap::value_parser!(DateTime<Utc>))]
    pub since: Option<DateTime<Utc>>,
    #[arg(long, value_parser = clap::value_parser!(DateTime<Utc>))]
    pub until: Option<DateTime<Utc>>,
}
