use std::fs::{File as StdFile, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::task;
use tracing::warn;

use crate::models::Round;

const FILE_PREFIX: &str = "network_monitor_";
const FILE_SUFFIX: &str = ".jsonl";

/// Append-only JSONL log of rounds, one file per UTC day.
#[derive(Debug, Clone)]
pub(crate) struct RoundLog {
    data_dir: PathBuf,
}

impl RoundLog {
    pub(crate) fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub(crate) fn file_for(&self, timestamp: DateTime<Utc>) -> PathBuf {
        self.data_dir.join(format!(
            "{}{}{}",
            FILE_PREFIX,
            timestamp.format("%Y-%m-%d"),
            FILE_SUFFIX
        ))
    }

    pub(crate) async fn append(&self, round: Round) -> Result<()> {
        let path = self.file_for(round.timestamp);
        let data_dir = self.data_dir.clone();

        task::spawn_blocking(move || -> Result<()> {
            std::fs::create_dir_all(&data_dir).with_context(|| {
                format!("failed to create data directory {}", data_dir.display())
            })?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;

            let mut line = serde_json::to_vec(&round).context("failed to encode round")?;
            line.push(b'\n');

            let mut file = std::io::BufWriter::new(file);
            file.write_all(&line)?;
            file.flush()?;
            file.get_ref().sync_all()?;
            Ok(())
        })
        .await??;

        Ok(())
    }

    /// Rounds with `since <= timestamp <= until`, sorted ascending by
    /// timestamp regardless of file order.
    pub(crate) async fn fetch(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<Round>> {
        let data_dir = self.data_dir.clone();

        let rounds = task::spawn_blocking(move || -> Result<Vec<Round>> {
            let mut rounds = Vec::new();
            for path in log_files(&data_dir)? {
                let file = match StdFile::open(&path) {
                    Ok(f) => f,
                    Err(e) => {
                        warn!("failed to read file {}: {}", path.display(), e);
                        continue;
                    }
                };
                read_rounds(&path, BufReader::new(file), since, until, &mut rounds);
            }
            rounds.sort_by_key(|r| r.timestamp);
            Ok(rounds)
        })
        .await??;

        Ok(rounds)
    }
}

fn log_files(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(data_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to list {}", data_dir.display()));
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn read_rounds<R: BufRead>(
    path: &Path,
    reader: R,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    rounds: &mut Vec<Round>,
) {
    for (lineno, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("stop reading {} at line {}: {}", path.display(), lineno + 1, e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Round>(&line) {
            Ok(round) => {
                let in_since = since.is_none_or(|s| round.timestamp >= s);
                let in_until = until.is_none_or(|u| round.timestamp <= u);
                if in_since && in_until {
                    rounds.push(round);
                }
            }
            Err(e) => {
                warn!("skip malformed line {} in {}: {}", lineno + 1, path.display(), e);
            }
        }
    }
}
