//! Count time-series logger.
//!
//! Appends one JSON line per sample so operators can chart swarm size over
//! time. Best-effort: a failed append is logged and skipped, never fatal.

use std::path::PathBuf;

use serde::Serialize;
use tokio::io::AsyncWriteExt;

use hypermind_transport::bootstrap::now_unix;

#[derive(Debug, Serialize)]
struct HistorySample {
    ts: u64,
    count: usize,
}

pub struct HistoryLogger {
    path: PathBuf,
}

impl HistoryLogger {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Append one sample with the current timestamp.
    pub async fn append(&self, count: usize) -> std::io::Result<()> {
        let sample = HistorySample {
            ts: now_unix(),
            count,
        };
        let mut line = serde_json::to_vec(&sample).expect("sample serialization is infallible");
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn appends_one_line_per_sample() {
        let dir = TempDir::new().unwrap();
        let logger = HistoryLogger::new(dir.path().join("history.jsonl"));

        logger.append(1).await.unwrap();
        logger.append(5).await.unwrap();

        let raw = tokio::fs::read_to_string(dir.path().join("history.jsonl"))
            .await
            .unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["count"], 5);
        assert!(second["ts"].as_u64().unwrap() > 0);
    }
}
