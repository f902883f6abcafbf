use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info};

use crate::models::Round;
use crate::probe::Prober;
use crate::storage::RoundLog;

/// Probes every host once per tick and hands each finished round to `tx`.
/// The first round runs immediately.
pub(crate) async fn run_monitor(
    prober: Prober,
    hosts: Vec<String>,
    check_interval: Duration,
    tx: mpsc::Sender<Round>,
    mut stop_rx: broadcast::Receiver<()>,
) {
    let mut interval = time::interval(check_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                info!("Monitor stopped");
                break;
            }
            _ = interval.tick() => {
                let round = prober.probe_round(&hosts).await;
                if tx.send(round).await.is_err() {
                    error!("round writer is gone, stopping monitor");
                    break;
                }
            }
        }
    }
}

/// Appends rounds until every sender is dropped.
pub(crate) async fn run_writer(mut rx: mpsc::Receiver<Round>, log: RoundLog) {
    while let Some(round) = rx.recv().await {
        if let Err(e) = log.append(round).await {
            error!("Failed to save results: {:#}", e);
        }
    }
}
