use std::net::SocketAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::StreamExt;
use thiserror::Error;
use tokio::net::{TcpStream, lookup_host};
use tokio::time::{self, Instant};
use tracing::{info, warn};

use crate::config::Settings;
use crate::models::{ProbeResult, Round};

#[derive(Error, Debug)]
pub(crate) enum ProbeError {
    #[error("DNS lookup failed: {0}")]
    Dns(String),
    #[error("DNS lookup timed out after {0:?}")]
    DnsTimeout(Duration),
    #[error("no IP addresses found for host")]
    NoAddresses,
    #[error("connect to port {port} failed: {reason}")]
    Connect { port: u16, reason: String },
    #[error("connect to port {port} timed out after {timeout:?}")]
    ConnectTimeout { port: u16, timeout: Duration },
    #[error("no probe ports configured")]
    NoPorts,
    #[error("connection too slow: {latency_ms}ms (max acceptable: {max_ms}ms)")]
    TooSlow { latency_ms: u64, max_ms: u64 },
}

/// DNS resolution followed by a TCP connect on the first port that answers.
#[derive(Debug, Clone)]
pub(crate) struct Prober {
    timeout: Duration,
    max_acceptable_latency: Duration,
    ports: Vec<u16>,
    max_concurrent: usize,
}

impl Prober {
    pub(crate) fn new(
        timeout: Duration,
        max_acceptable_latency: Duration,
        ports: Vec<u16>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            timeout,
            max_acceptable_latency,
            ports,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.probe_timeout,
            settings.max_acceptable_latency,
            settings.probe_ports.clone(),
            settings.max_concurrent_probes,
        )
    }

    pub(crate) async fn probe(&self, host: &str, timestamp: DateTime<Utc>) -> ProbeResult {
        let start = Instant::now();
        let outcome = self.connect(host).await;
        let latency_ms = elapsed_millis(start);

        let outcome =
            outcome.and_then(|_| check_latency(latency_ms, self.max_acceptable_latency));

        ProbeResult {
            host: host.to_string(),
            success: outcome.is_ok(),
            latency_ms,
            error: outcome.err().map(|e| e.to_string()),
            timestamp,
        }
    }

    async fn connect(&self, host: &str) -> Result<(), ProbeError> {
        let addrs: Vec<SocketAddr> = time::timeout(self.timeout, lookup_host((host, 0)))
            .await
            .map_err(|_| ProbeError::DnsTimeout(self.timeout))?
            .map_err(|e| ProbeError::Dns(e.to_string()))?
            .collect();

        if addrs.is_empty() {
            return Err(ProbeError::NoAddresses);
        }

        let mut last_err = ProbeError::NoPorts;
        for &port in &self.ports {
            let targets: Vec<SocketAddr> = addrs
                .iter()
                .map(|addr| SocketAddr::new(addr.ip(), port))
                .collect();

            match time::timeout(self.timeout, TcpStream::connect(targets.as_slice())).await {
                Ok(Ok(_stream)) => return Ok(()),
                Ok(Err(e)) => {
                    last_err = ProbeError::Connect {
                        port,
                        reason: e.to_string(),
                    }
                }
                Err(_) => {
                    last_err = ProbeError::ConnectTimeout {
                        port,
                        timeout: self.timeout,
                    }
                }
            }
        }
        Err(last_err)
    }

    /// Probes every host concurrently and returns the results in host order,
    /// all stamped with the tick time.
    pub(crate) async fn probe_round(&self, hosts: &[String]) -> Round {
        let timestamp = Utc::now();
        let results: Vec<ProbeResult> = futures::stream::iter(hosts.iter().cloned())
            .map(|host| async move { self.probe(&host, timestamp).await })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        for result in &results {
            match &result.error {
                None => info!(host = %result.host, latency_ms = result.latency_ms, "OK"),
                Some(e) => warn!(host = %result.host, latency_ms = result.latency_ms, "FAIL: {}", e),
            }
        }
        if !results.is_empty() && results.iter().all(|r| !r.success) {
            warn!("internet offline: all {} hosts unreachable", results.len());
        }

        Round { timestamp, results }
    }
}

fn check_latency(latency_ms: u64, max: Duration) -> Result<(), ProbeError> {
    let max_ms = elapsed_ms(max);
    if latency_ms > max_ms {
        Err(ProbeError::TooSlow { latency_ms, max_ms })
    } else {
        Ok(())
    }
}

fn elapsed_millis(start: Instant) -> u64 {
    elapsed_ms(start.elapsed())
}

fn elapsed_ms(duration: Duration) -> u64 {
    std::cmp::min(duration.as_millis(), u64::MAX as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn prober(ports: Vec<u16>) -> Prober {
        Prober::new(Duration::from_secs(2), Duration::from_secs(10), ports, 4)
    }

    #[tokio::test]
    async fn test_probe_succeeds_against_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let result = prober(vec![port]).probe("127.0.0.1", Utc::now()).await;
        assert!(result.success, "{:?}", result.error);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_probe_falls_back_to_next_port() {
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let closed_port = closed.local_addr().unwrap().port();
        drop(closed);
        let open = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_port = open.local_addr().unwrap().port();

        let result = prober(vec![closed_port, open_port])
            .probe("127.0.0.1", Utc::now())
            .await;
        assert!(result.success, "{:?}", result.error);
    }

    #[tokio::test]
    async fn test_probe_failure_carries_error() {
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = closed.local_addr().unwrap().port();
        drop(closed);

        let result = prober(vec![port]).probe("127.0.0.1", Utc::now()).await;
        assert!(!result.success);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_latency_budget() {
        let max = Duration::from_secs(10);
        assert!(check_latency(10_000, max).is_ok());
        let err = check_latency(10_001, max).unwrap_err();
        assert!(matches!(err, ProbeError::TooSlow { latency_ms: 10_001, max_ms: 10_000 }));
    }

    #[tokio::test]
    async fn test_round_preserves_host_order_and_timestamp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let hosts = vec!["127.0.0.1".to_string(), "localhost".to_string()];

        let round = prober(vec![port]).probe_round(&hosts).await;
        assert_eq!(round.results.len(), 2);
        assert_eq!(round.results[0].host, "127.0.0.1");
        assert_eq!(round.results[1].host, "localhost");
        assert!(round.results.iter().all(|r| r.timestamp == round.timestamp));
    }

    #[tokio::test]
    async fn test_round_runs_on_spawned_task() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let checker = prober(vec![port]);
        let hosts = vec!["127.0.0.1".to_string()];

        let round = tokio::spawn(async move { checker.probe_round(&hosts).await })
            .await
            .unwrap();
        assert_eq!(round.results.len(), 1);
        assert!(round.results[0].success, "{:?}", round.results[0].error);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ProbeError::TooSlow { latency_ms: 12000, max_ms: 10000 }.to_string(),
            "connection too slow: 12000ms (max acceptable: 10000ms)"
        );
        assert_eq!(ProbeError::NoAddresses.to_string(), "no IP addresses found for host");
    }
}
