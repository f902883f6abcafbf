mod availability;
mod cli;
mod config;
mod models;
mod monitor;
mod probe;
mod report;
mod stats;
mod storage;
mod timeline;
mod web;

use anyhow::Result;
use clap::Parser;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;
use crate::config::load_settings;
use crate::probe::Prober;
use crate::storage::RoundLog;
use crate::web::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "monitrix=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let settings = load_settings()?;

    if cli.report {
        report::run_report_once(&settings, &cli).await?;
        return Ok(());
    }

    info!("Monitoring hosts: {:?}", settings.hosts);
    info!(
        "Check interval: {}",
        humantime::format_duration(settings.check_interval)
    );
    info!("Data directory: {}", settings.data_dir.display());
    info!("Web directory: {}", settings.web_dir.display());

    let log = RoundLog::new(&settings.data_dir);
    let (round_tx, round_rx) = mpsc::channel(10);
    let (stop_tx, _) = broadcast::channel(1);

    let writer = tokio::spawn(monitor::run_writer(round_rx, log.clone()));
    let monitor = tokio::spawn(monitor::run_monitor(
        Prober::from_settings(&settings),
        settings.hosts.clone(),
        settings.check_interval,
        round_tx,
        stop_tx.subscribe(),
    ));

    let router = web::router(AppState { log }, &settings.web_dir);
    let server_stop = stop_tx.subscribe();
    let web_addr = settings.web_addr.clone();
    let mut server =
        tokio::spawn(async move { web::serve(&web_addr, router, server_stop).await });

    tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutting down gracefully...");
        }
        res = &mut server => {
            // The server only returns early on failure, e.g. the address is taken.
            let _ = stop_tx.send(());
            join_workers(monitor, writer).await;
            return res?;
        }
    }

    let _ = stop_tx.send(());
    join_workers(monitor, writer).await;
    server.await??;

    Ok(())
}

async fn join_workers(monitor: JoinHandle<()>, writer: JoinHandle<()>) {
    if let Err(e) = monitor.await {
        error!("monitor task failed: {}", e);
    }
    if let Err(e) = writer.await {
        error!("writer task failed: {}", e);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
