use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, Environment, File};
use serde::Deserialize;

const DEFAULT_HOSTS: [&str; 5] = [
    "1.1.1.1",
    "8.8.8.8",
    "google.com",
    "cloudflare.com",
    "github.com",
];

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct ReportingSettings {
    #[serde(with = "humantime_serde")]
    pub(crate) window: Duration,
    pub(crate) uptime_threshold_percent: f64,
    pub(crate) critical_uptime_threshold_percent: f64,
    pub(crate) latency_threshold_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct Settings {
    pub(crate) hosts: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub(crate) check_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub(crate) probe_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub(crate) max_acceptable_latency: Duration,
    pub(crate) probe_ports: Vec<u16>,
    pub(crate) max_concurrent_probes: usize,
    pub(crate) data_dir: PathBuf,
    pub(crate) web_dir: PathBuf,
    pub(crate) web_addr: String,
    pub(crate) reporting: ReportingSettings,
}

impl Settings {
    fn validate(mut self) -> Result<Self> {
        self.hosts = self
            .hosts
            .iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();

        if self.hosts.is_empty() {
            anyhow::bail!("at least one host must be configured");
        }
        if self.probe_ports.is_empty() {
            anyhow::bail!("probe_ports must not be empty");
        }
        if self.check_interval.is_zero() {
            anyhow::bail!("check_interval must be greater than zero");
        }
        if self.max_concurrent_probes == 0 {
            anyhow::bail!("max_concurrent_probes must be greater than zero");
        }
        Ok(self)
    }
}

/// Defaults, then `config/default.toml`, then `MONITRIX_*` variables, then
/// the bare `MONITOR_HOSTS` / `MONITOR_INTERVAL` / `WEB_ADDR` variables.
pub(crate) fn load_settings() -> Result<Settings> {
    let builder = with_defaults(Config::builder())?
        .add_source(File::with_name("config/default.toml").required(false))
        .add_source(
            Environment::with_prefix("MONITRIX")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("hosts")
                .with_list_parse_key("probe_ports")
                .try_parsing(true),
        );
    let builder = with_legacy_overrides(builder, |key| std::env::var(key).ok())?;

    let settings: Settings = builder
        .build()?
        .try_deserialize()
        .context("invalid configuration")?;
    settings.validate()
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>> {
    Ok(builder
        .set_default("hosts", DEFAULT_HOSTS.to_vec())?
        .set_default("check_interval", "30s")?
        .set_default("probe_timeout", "5s")?
        .set_default("max_acceptable_latency", "10s")?
        .set_default("probe_ports", vec![443i64, 80])?
        .set_default("max_concurrent_probes", 5i64)?
        .set_default("data_dir", "data")?
        .set_default("web_dir", "web")?
        .set_default("web_addr", "0.0.0.0:8080")?
        .set_default("reporting.window", "24h")?
        .set_default("reporting.uptime_threshold_percent", 99.0)?
        .set_default("reporting.critical_uptime_threshold_percent", 95.0)?
        .set_default("reporting.latency_threshold_ms", 300i64)?)
}

fn with_legacy_overrides<F>(
    builder: ConfigBuilder<DefaultState>,
    lookup: F,
) -> Result<ConfigBuilder<DefaultState>>
where
    F: Fn(&str) -> Option<String>,
{
    let hosts = lookup("MONITOR_HOSTS")
        .map(|raw| parse_host_list(&raw))
        .filter(|hosts| !hosts.is_empty());
    // Non-numeric or zero intervals are ignored, leaving the configured value.
    let interval = lookup("MONITOR_INTERVAL")
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(|secs| format!("{}s", secs));
    let web_addr = lookup("WEB_ADDR").filter(|addr| !addr.is_empty());

    Ok(builder
        .set_override_option("hosts", hosts)?
        .set_override_option("check_interval", interval)?
        .set_override_option("web_addr", web_addr)?)
}

pub(crate) fn parse_host_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect()
}
