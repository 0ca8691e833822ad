//! Indexing sink: where finished records go.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use cfpscout_shared::{CfpRecord, CfpScoutError, Result};

/// Outcome of indexing one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SinkReport {
    pub indexed: usize,
    /// `(url, message)` per record that could not be indexed.
    pub errors: Vec<(String, String)>,
}

/// Accepts batches of records. Per-record problems go into the report;
/// `Err` is reserved for a sink that cannot take anything at all.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn index(&self, records: &[CfpRecord]) -> Result<SinkReport>;
}

/// Appends one JSON object per line to a file.
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSink for JsonLinesSink {
    async fn index(&self, records: &[CfpRecord]) -> Result<SinkReport> {
        let mut report = SinkReport::default();
        let mut buf = String::new();
        for record in records {
            match serde_json::to_string(record) {
                Ok(line) => {
                    buf.push_str(&line);
                    buf.push('\n');
                    report.indexed += 1;
                }
                Err(e) => {
                    warn!(url = %record.url, error = %e, "record not serializable");
                    report.errors.push((record.url.clone(), e.to_string()));
                }
            }
        }
        if buf.is_empty() {
            return Ok(report);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CfpScoutError::io(parent, e))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| CfpScoutError::io(&self.path, e))?;
        file.write_all(buf.as_bytes())
            .await
            .map_err(|e| CfpScoutError::io(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| CfpScoutError::io(&self.path, e))?;

        debug!(path = %self.path.display(), count = report.indexed, "records appended");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    use cfpscout_shared::record_id;

    fn record(url: &str) -> CfpRecord {
        CfpRecord {
            id: record_id(url),
            url: url.into(),
            source: "test".into(),
            submission_url: None,
            name: "Conf".into(),
            description: None,
            cfp_close_date: None,
            event_start_date: None,
            event_end_date: None,
            city: None,
            country: None,
            location: None,
            is_online: false,
            topics: Vec::new(),
            extraction_method: "heuristic".into(),
            confidence: 0.6,
            is_spa: false,
            extracted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn appends_json_lines() {
        let path = std::env::temp_dir()
            .join(format!("cfpscout-sink-{}", Uuid::now_v7()))
            .join("records.jsonl");
        let sink = JsonLinesSink::new(&path);

        let report = sink
            .index(&[record("https://a.example/cfp"), record("https://b.example/cfp")])
            .await
            .unwrap();
        assert_eq!(report.indexed, 2);
        sink.index(&[record("https://c.example/cfp")]).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        let first: CfpRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.url, "https://a.example/cfp");
    }

    #[tokio::test]
    async fn empty_batch_touches_nothing() {
        let path = std::env::temp_dir().join(format!("cfpscout-sink-{}.jsonl", Uuid::now_v7()));
        let report = JsonLinesSink::new(&path).index(&[]).await.unwrap();
        assert_eq!(report, SinkReport::default());
        assert!(!path.exists());
    }
}
