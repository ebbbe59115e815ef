//! Record sources.
//!
//! A record source returns the full, unfiltered collection of triage log
//! records. The dashboard never caches what it fetches: every command asks
//! the configured source again.

pub mod file;
pub mod postgres;
pub mod rows;
pub mod sheets;

pub use file::FileSource;
pub use postgres::PostgresSource;
pub use sheets::SheetsSource;

use crate::config::{SourceConfig, SourceKind};
use crate::models::LogRecord;
use std::path::PathBuf;

/// Errors raised while fetching records.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("source setting '{0}' is not configured")]
    MissingSetting(&'static str),

    #[error("invalid spreadsheet URL: {0}")]
    InvalidUrl(String),

    #[error("spreadsheet request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("spreadsheet API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("database request failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Something that can produce the complete record collection.
#[allow(async_fn_in_trait)]
pub trait RecordSource {
    /// Short human-readable description used in logs.
    fn describe(&self) -> String;

    /// Fetch every record the source holds.
    async fn fetch_all(&self) -> Result<Vec<LogRecord>, SourceError>;
}

/// The source selected by configuration.
pub enum ConfiguredSource {
    File(FileSource),
    Sheets(SheetsSource),
    Postgres(PostgresSource),
}

impl ConfiguredSource {
    /// Build the source described by `[source]`.
    pub fn from_config(config: &SourceConfig) -> Result<Self, SourceError> {
        match config.kind {
            SourceKind::File => {
                let path = config
                    .path
                    .clone()
                    .ok_or(SourceError::MissingSetting("source.path"))?;
                Ok(ConfiguredSource::File(FileSource::new(path)))
            }
            SourceKind::Sheets => Ok(ConfiguredSource::Sheets(SheetsSource::from_config(config)?)),
            SourceKind::Postgres => Ok(ConfiguredSource::Postgres(PostgresSource::from_config(
                config,
            )?)),
        }
    }
}

impl RecordSource for ConfiguredSource {
    fn describe(&self) -> String {
        match self {
            ConfiguredSource::File(source) => source.describe(),
            ConfiguredSource::Sheets(source) => source.describe(),
            ConfiguredSource::Postgres(source) => source.describe(),
        }
    }

    async fn fetch_all(&self) -> Result<Vec<LogRecord>, SourceError> {
        match self {
            ConfiguredSource::File(source) => source.fetch_all().await,
            ConfiguredSource::Sheets(source) => source.fetch_all().await,
            ConfiguredSource::Postgres(source) => source.fetch_all().await,
        }
    }
}
