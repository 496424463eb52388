//! Visit recording collaborators.
//!
//! The resolver never depends on a particular backend; it only calls
//! [`VisitLog::record`] after each resolution when one is attached.

use crate::{Resolution, ResolveError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub time: DateTime<Utc>,
    pub source_url: String,
    pub outcome: VisitOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VisitOutcome {
    Success { items: usize },
    Failed { status_code: u16, error: String },
}

impl Visit {
    pub fn from_result(source_url: &str, result: &Result<Resolution, ResolveError>) -> Self {
        let outcome = match result {
            Ok(resolution) => VisitOutcome::Success {
                items: resolution.items.len(),
            },
            Err(e) => VisitOutcome::Failed {
                status_code: e.status_code(),
                error: e.to_string(),
            },
        };
        Self {
            time: Utc::now(),
            source_url: source_url.to_string(),
            outcome,
        }
    }
}

#[async_trait]
pub trait VisitLog: Send + Sync {
    async fn record(&self, visit: &Visit) -> io::Result<()>;
}

/// Discards every visit.
#[derive(Debug, Clone, Default)]
pub struct NoopVisitLog;

#[async_trait]
impl VisitLog for NoopVisitLog {
    async fn record(&self, _visit: &Visit) -> io::Result<()> {
        Ok(())
    }
}

/// Emits each visit as a structured `tracing` event.
#[derive(Debug, Clone, Default)]
pub struct TracingVisitLog;

#[async_trait]
impl VisitLog for TracingVisitLog {
    async fn record(&self, visit: &Visit) -> io::Result<()> {
        match &visit.outcome {
            VisitOutcome::Success { items } => {
                info!(source_url = %visit.source_url, items, "visit");
            }
            VisitOutcome::Failed { status_code, error } => {
                info!(source_url = %visit.source_url, status_code, error = %error, "visit");
            }
        }
        Ok(())
    }
}

/// Appends visits to a file, one JSON document per line.
#[derive(Debug)]
pub struct JsonLinesVisitLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesVisitLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads back every recorded visit. Unparsable lines are skipped.
    pub async fn visits(&self) -> io::Result<Vec<Visit>> {
        let file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut lines = BufReader::new(file).lines();
        let mut visits = Vec::new();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Visit>(&line) {
                Ok(visit) => visits.push(visit),
                Err(e) => warn!(error = %e, path = %self.path.display(), "Skipping malformed visit line"),
            }
        }
        Ok(visits)
    }
}

#[async_trait]
impl VisitLog for JsonLinesVisitLog {
    async fn record(&self, visit: &Visit) -> io::Result<()> {
        let mut line = serde_json::to_string(visit)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MediaItem, MediaKind, PostKind, PostReference};
    use chrono::TimeZone;

    fn resolution() -> Resolution {
        Resolution {
            post: PostReference {
                id: "ABC123".into(),
                kind: PostKind::Post,
            },
            items: vec![MediaItem {
                kind: MediaKind::Image,
                url: "https://x/img.jpg".into(),
                width: None,
                height: None,
                filename: "instagram-image-20240501T123000000Z-01.jpg".into(),
            }],
        }
    }

    #[test]
    fn test_visit_from_result() {
        let ok = Visit::from_result("https://www.instagram.com/p/ABC123/", &Ok(resolution()));
        assert_eq!(ok.outcome, VisitOutcome::Success { items: 1 });

        let err = Visit::from_result("https://example.com", &Err(ResolveError::NoMediaFound));
        assert!(matches!(err.outcome, VisitOutcome::Failed { status_code: 404, .. }));
    }

    #[tokio::test]
    async fn test_json_lines_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonLinesVisitLog::new(dir.path().join("logs").join("visits.jsonl"));

        assert!(log.visits().await.unwrap().is_empty());

        let first = Visit::from_result("https://www.instagram.com/p/ABC123/", &Ok(resolution()));
        let second = Visit::from_result(
            "https://example.com/p/ABC123/",
            &Err(ResolveError::ValidationError {
                reason: "not an instagram.com URL".into(),
            }),
        );
        log.record(&first).await.unwrap();
        log.record(&second).await.unwrap();

        let visits = log.visits().await.unwrap();
        assert_eq!(visits, vec![first, second]);
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("visits.jsonl");
        tokio::fs::write(&path, "not json\n").await.unwrap();

        let log = JsonLinesVisitLog::new(&path);
        let visit = Visit::from_result("https://www.instagram.com/p/A/", &Ok(resolution()));
        log.record(&visit).await.unwrap();

        assert_eq!(log.visits().await.unwrap(), vec![visit]);
    }

    #[tokio::test]
    async fn test_failed_visit_line_format() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonLinesVisitLog::new(dir.path().join("visits.jsonl"));

        let visit = Visit {
            time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            source_url: "https://www.instagram.com/p/GONE/".into(),
            outcome: VisitOutcome::Failed {
                status_code: 404,
                error: "No downloadable media found".into(),
            },
        };
        log.record(&visit).await.unwrap();

        let written = tokio::fs::read_to_string(log.path()).await.unwrap();
        assert_eq!(
            written,
            concat!(
                r#"{"time":"2024-05-01T12:30:00Z","source_url":"https://www.instagram.com/p/GONE/","#,
                r#""outcome":{"status":"failed","status_code":404,"error":"No downloadable media found"}}"#,
                "\n"
            )
        );
        assert_eq!(log.visits().await.unwrap(), vec![visit]);
    }

    #[tokio::test]
    async fn test_noop_and_tracing_logs_accept_every_outcome() {
        let visits = [
            Visit::from_result("https://www.instagram.com/p/A/", &Ok(resolution())),
            Visit::from_result("https://example.com/", &Err(ResolveError::NoMediaFound)),
        ];
        let logs: Vec<Box<dyn VisitLog>> = vec![Box::new(NoopVisitLog), Box::new(TracingVisitLog)];

        for log in &logs {
            for visit in &visits {
                log.record(visit).await.unwrap();
            }
        }
    }
}
