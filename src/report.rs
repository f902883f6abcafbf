use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Local, Utc};
use colored::*;
use statistical::mean;
use tracing::info;

use crate::cli::Cli;
use crate::config::{ReportingSettings, Settings};
use crate::models::{DowntimeEvent, HostStats, LatencyStats, Report, Round, Status};
use crate::stats::summarize;
use crate::storage::RoundLog;

pub(crate) async fn run_report_once(settings: &Settings, cli: &Cli) -> Result<()> {
    let until = cli.until.unwrap_or_else(Utc::now);
    let since = if let Some(s) = cli.since {
        s
    } else {
        let window = ChronoDuration::from_std(settings.reporting.window)
            .map_err(|_| anyhow::anyhow!("Reporting window setting is invalid or too large"))?;

        until - window
    };

    if since > until {
        anyhow::bail!(
            "--since ({}) must be earlier than or equal to --until ({})",
            since,
            until
        );
    }

    let rounds = RoundLog::new(&settings.data_dir)
        .fetch(Some(since), Some(until))
        .await?;

    if rounds.is_empty() {
        info!("No data found for the specified period. No report will be generated.");
        return Ok(());
    }

    let report = generate_report(&rounds, &settings.hosts, since, until, Utc::now());
    format_report_console(&report, &settings.reporting);

    Ok(())
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let p = p.clamp(0.0, 1.0);
    let rank = p * (sorted.len() as f64 - 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let w = rank - lo as f64;
        sorted[lo] * (1.0 - w) + sorted[hi] * w
    }
}

fn latency_stats(latencies: &[u64]) -> LatencyStats {
    if latencies.is_empty() {
        return LatencyStats {
            min: 0,
            max: 0,
            mean: 0.0,
            median: 0.0,
            p95: 0.0,
        };
    }

    let mut sorted: Vec<f64> = latencies.iter().map(|&ms| ms as f64).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    LatencyStats {
        min: latencies.iter().copied().min().unwrap_or(0),
        max: latencies.iter().copied().max().unwrap_or(0),
        mean: mean(&sorted),
        median: percentile(&sorted, 0.5),
        p95: percentile(&sorted, 0.95),
    }
}

/// Per-host figures for every host seen in `rounds`, configured hosts first
/// in configuration order, then any others alphabetically.
fn host_stats(rounds: &[Round], hosts: &[String]) -> Vec<HostStats> {
    let mut by_host: HashMap<&str, (usize, Vec<u64>)> = HashMap::new();
    for result in rounds.iter().flat_map(|r| &r.results) {
        let entry = by_host.entry(result.host.as_str()).or_default();
        entry.0 += 1;
        if result.success {
            entry.1.push(result.latency_ms);
        }
    }

    let mut extra: Vec<&str> = by_host
        .keys()
        .copied()
        .filter(|h| !hosts.iter().any(|c| c.as_str() == *h))
        .collect();
    extra.sort();

    hosts
        .iter()
        .map(String::as_str)
        .chain(extra)
        .filter_map(|host| {
            let (total_probes, latencies) = by_host.get(host)?;
            let successful_probes = latencies.len();
            Some(HostStats {
                host: host.to_string(),
                total_probes: *total_probes,
                successful_probes,
                uptime: (successful_probes as f64 / *total_probes as f64) * 100.0,
                latency: latency_stats(latencies),
            })
        })
        .collect()
}

fn generate_report(
    rounds: &[Round],
    hosts: &[String],
    since: DateTime<Utc>,
    until: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Report {
    Report {
        since,
        until,
        configured_hosts: hosts.len(),
        summary: summarize(rounds, now),
        host_stats: host_stats(rounds, hosts),
    }
}

fn format_downtime(event: &DowntimeEvent) -> String {
    let duration = humantime::format_duration(Duration::from_secs(
        event.duration_seconds.max(0) as u64,
    ));
    let start = event.start_time.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S");
    match event.end_time {
        Some(end) => format!(
            "{} -> {} ({}) failed: {}",
            start,
            end.with_timezone(&Local).format("%H:%M:%S"),
            duration,
            event.failed_hosts.join(", ")
        ),
        None => format!(
            "{} -> ongoing ({}) failed: {}",
            start,
            duration,
            event.failed_hosts.join(", ")
        ),
    }
}

fn colored_uptime(uptime: f64, settings: &ReportingSettings) -> ColoredString {
    let uptime_str = format!("{:.3}%", uptime);
    if uptime < settings.critical_uptime_threshold_percent {
        uptime_str.red()
    } else if uptime < settings.uptime_threshold_percent {
        uptime_str.yellow()
    } else {
        uptime_str.green()
    }
}

fn format_report_console(report: &Report, settings: &ReportingSettings) {
    let since_local = report.since.with_timezone(&Local);
    let until_local = report.until.with_timezone(&Local);
    let summary = &report.summary;

    println!("Network Availability Report");
    println!("-----------------");
    println!(
        "Period: {} ~ {}",
        since_local.format("%Y-%m-%d %H:%M:%S %Z"),
        until_local.format("%Y-%m-%d %H:%M:%S %Z")
    );
    let status = match summary.current_status {
        Status::Online => summary.current_status.as_str().green(),
        Status::Offline => summary.current_status.as_str().red().bold(),
    };
    println!(
        "Status: {}, Uptime: {} ({} / {} checks online), Downtime: {:.2}h",
        status,
        colored_uptime(summary.uptime_percentage, settings),
        summary.online_checks,
        summary.total_checks,
        summary.total_downtime_hours
    );
    println!(
        "Hosts: {} / {} reported",
        report.host_stats.len(),
        report.configured_hosts
    );
    println!("-----------------");

    for stats in &report.host_stats {
        let mean_str = format!("{:.2}ms", stats.latency.mean);
        let mean_colored = if stats.latency.mean > settings.latency_threshold_ms as f64 {
            mean_str.red()
        } else {
            mean_str.green()
        };

        println!("Host: {}", stats.host.bold());
        println!(
            "  Reachable: {} ({} / {})",
            colored_uptime(stats.uptime, settings),
            stats.successful_probes,
            stats.total_probes
        );
        println!(
            "  Latency - Min: {}ms, Max: {}ms, Avg: {} (thr: {}ms), Median: {:.2}ms, P95: {:.2}ms",
            stats.latency.min,
            stats.latency.max,
            mean_colored,
            settings.latency_threshold_ms,
            stats.latency.median,
            stats.latency.p95
        );
    }

    println!("-----------------");
    if summary.downtime_events.is_empty() {
        println!("No downtime recorded.");
    } else {
        println!("Downtime events ({}):", summary.downtime_events.len());
        for event in &summary.downtime_events {
            println!("  {}", format_downtime(event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::tests::round;

    fn at(minutes: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap() + ChronoDuration::minutes(minutes)
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile(&sorted, 0.0), 10.0);
        assert_eq!(percentile(&sorted, 1.0), 40.0);
        assert!((percentile(&sorted, 0.5) - 25.0).abs() < 1e-9);
        assert_eq!(percentile(&[], 0.5), 0.0);
    }

    #[test]
    fn test_host_stats_order_and_uptime() {
        let rounds = vec![
            round(at(0), &[("b", true), ("a", false), ("x", true)]),
            round(at(1), &[("b", true), ("a", true)]),
        ];
        let hosts = vec!["a".to_string(), "b".to_string(), "unused".to_string()];
        let stats = host_stats(&rounds, &hosts);

        let names: Vec<_> = stats.iter().map(|s| s.host.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "x"]);
        assert_eq!(stats[0].total_probes, 2);
        assert_eq!(stats[0].successful_probes, 1);
        assert_eq!(stats[0].uptime, 50.0);
        assert_eq!(stats[1].uptime, 100.0);
        assert_eq!(stats[1].latency.min, 20);
        assert_eq!(stats[1].latency.mean, 20.0);
    }

    #[test]
    fn test_latency_stats_ignore_empty() {
        let stats = latency_stats(&[]);
        assert_eq!(stats.max, 0);
        assert_eq!(stats.p95, 0.0);
    }

    #[test]
    fn test_generate_report_carries_summary() {
        let rounds = vec![round(at(0), &[("a", false)]), round(at(1), &[("a", true)])];
        let hosts = vec!["a".to_string()];
        let report = generate_report(&rounds, &hosts, at(0), at(2), at(2));

        assert_eq!(report.configured_hosts, 1);
        assert_eq!(report.summary.downtime_events.len(), 1);
        assert_eq!(report.host_stats.len(), 1);
        assert!(format_downtime(&report.summary.downtime_events[0]).contains("1m"));
    }

    #[test]
    fn test_format_ongoing_downtime() {
        let rounds = vec![round(at(0), &[("a", false), ("b", false)])];
        let summary = summarize(&rounds, at(90));
        let line = format_downtime(&summary.downtime_events[0]);
        assert!(line.contains("ongoing"));
        assert!(line.contains("1h 30m"));
        assert!(line.ends_with("a, b"));
    }
}
