//! JSON file record source.

use super::rows::{normalize_record, rows_to_records};
use super::{RecordSource, SourceError};
use crate::models::LogRecord;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

/// Either an exported record array or raw spreadsheet rows.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FileContents {
    Records(Vec<LogRecord>),
    Rows(Vec<Vec<String>>),
}

/// Reads records from a local JSON file.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl RecordSource for FileSource {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    async fn fetch_all(&self) -> Result<Vec<LogRecord>, SourceError> {
        let content =
            tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|source| SourceError::Io {
                    path: self.path.clone(),
                    source,
                })?;

        let contents: FileContents =
            serde_json::from_str(&content).map_err(|source| SourceError::Parse {
                path: self.path.clone(),
                source,
            })?;

        let records: Vec<LogRecord> = match contents {
            FileContents::Records(records) => {
                records.into_iter().map(normalize_record).collect()
            }
            FileContents::Rows(rows) => rows_to_records(&rows),
        };

        info!("Loaded {} records from {}", records.len(), self.path.display());
        Ok(records)
    }
}
