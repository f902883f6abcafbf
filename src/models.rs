use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one reachability check against one host.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub(crate) struct ProbeResult {
    pub(crate) host: String,
    pub(crate) success: bool,
    pub(crate) latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
    pub(crate) timestamp: DateTime<Utc>,
}

/// One sampling tick across every configured host. Stored as one JSONL line.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub(crate) struct Round {
    pub(crate) timestamp: DateTime<Utc>,
    #[serde(default)]
    pub(crate) results: Vec<ProbeResult>,
}

impl Round {
    /// A round without probes carries no verdict and is skipped by aggregation.
    pub(crate) fn is_degenerate(&self) -> bool {
        self.results.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Status {
    Online,
    Offline,
}

impl Status {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Status::Online => "online",
            Status::Offline => "offline",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Verdict {
    pub(crate) online: bool,
    pub(crate) failed_hosts: Vec<String>,
}

/// A maximal run of offline rounds. `end_time` is absent while still open.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub(crate) struct DowntimeEvent {
    pub(crate) start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) end_time: Option<DateTime<Utc>>,
    pub(crate) duration_seconds: i64,
    pub(crate) is_ongoing: bool,
    pub(crate) failed_hosts: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub(crate) struct StatsSummary {
    pub(crate) current_status: Status,
    pub(crate) total_checks: usize,
    pub(crate) online_checks: usize,
    pub(crate) offline_checks: usize,
    pub(crate) uptime_percentage: f64,
    pub(crate) total_downtime_hours: f64,
    pub(crate) downtime_events: Vec<DowntimeEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) recent_downtime: Option<DowntimeEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) last_checked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub(crate) struct LatencyStats {
    pub(crate) min: u64,
    pub(crate) max: u64,
    pub(crate) mean: f64,
    pub(crate) median: f64,
    pub(crate) p95: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct HostStats {
    pub(crate) host: String,
    pub(crate) total_probes: usize,
    pub(crate) successful_probes: usize,
    pub(crate) uptime: f64,
    pub(crate) latency: LatencyStats,
}

#[derive(Debug, Clone)]
pub(crate) struct Report {
    pub(crate) since: DateTime<Utc>,
    pub(crate) until: DateTime<Utc>,
    pub(crate) configured_hosts: usize,
    pub(crate) summary: StatsSummary,
    pub(crate) host_stats: Vec<HostStats>,
}
