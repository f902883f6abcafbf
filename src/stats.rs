use chrono::{DateTime, Utc};

use crate::models::{Round, Status, StatsSummary};
use crate::timeline;

/// Summarizes rounds given in ascending time order. `now` is only used to
/// age an outage that is still open.
pub(crate) fn summarize(rounds: &[Round], now: DateTime<Utc>) -> StatsSummary {
    let timeline = timeline::process(rounds, now);
    let online_checks = timeline.online_checks;
    let offline_checks = timeline.offline_checks;
    let total_checks = online_checks + offline_checks;
    let uptime_percentage = if total_checks > 0 {
        (online_checks as f64 / total_checks as f64) * 100.0
    } else {
        0.0
    };

    let downtime_events = timeline.events_most_recent_first();
    let recent_downtime = downtime_events.first().cloned();

    StatsSummary {
        current_status: timeline.final_status.unwrap_or(Status::Online),
        total_checks,
        online_checks,
        offline_checks,
        uptime_percentage,
        total_downtime_hours: timeline.total_downtime_seconds() as f64 / 3600.0,
        downtime_events,
        recent_downtime,
        last_checked_at: timeline.last_checked_at,
    }
}
