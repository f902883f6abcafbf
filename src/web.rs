use std::path::Path;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::stats::summarize;
use crate::storage::RoundLog;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) log: RoundLog,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RangeQuery {
    #[serde(default)]
    pub(crate) start: Option<String>,
    #[serde(default)]
    pub(crate) end: Option<String>,
}

impl RangeQuery {
    /// Unparsable bounds are dropped, leaving that side of the range open.
    fn bounds(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        (parse_time(self.start.as_deref()), parse_time(self.end.as_deref()))
    }
}

fn parse_time(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

pub(crate) fn router(state: AppState, web_dir: &Path) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

    Router::new()
        .route("/api/logs", get(handle_logs))
        .route("/api/stats", get(handle_stats))
        // Dashboard
        .fallback_service(ServeDir::new(web_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub(crate) async fn serve(
    addr: &str,
    router: Router,
    mut stop_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Starting web dashboard at http://{}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = stop_rx.recv().await;
        })
        .await?;
    Ok(())
}

async fn handle_logs(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> impl IntoResponse {
    let (start, end) = query.bounds();
    match state.log.fetch(start, end).await {
        Ok(rounds) => Json(rounds).into_response(),
        Err(e) => read_error(e),
    }
}

async fn handle_stats(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> impl IntoResponse {
    let (start, end) = query.bounds();
    match state.log.fetch(start, end).await {
        Ok(rounds) => Json(summarize(&rounds, Utc::now())).into_response(),
        Err(e) => read_error(e),
    }
}

fn read_error(e: anyhow::Error) -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Failed to read logs: {:#}", e),
    )
        .into_response()
}
