//! PostgreSQL record source.
//!
//! Runs a select that returns the log columns as text, in the same order as
//! the spreadsheet: timestamp, messageId, threadId, sender, templateKey,
//! reason, title, confidence, rationale, pdfUrl, outcome. Each result row goes
//! through the spreadsheet row parser, so both sources coerce the same way.
//! TLS follows the `sslmode` parameter of the connection URL.

use super::rows::parse_row;
use super::{RecordSource, SourceError};
use crate::config::SourceConfig;
use crate::models::LogRecord;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use tracing::{debug, info};

/// Select used when `[source] query` is not set.
pub const DEFAULT_QUERY: &str = r#"SELECT fecha::text, message_id::text, thread_id::text,
       sender::text, template_key::text, motivo::text, titulo::text,
       confidence::text, rationale::text, pdf_url::text, resultado::text
FROM triage_logs
ORDER BY fecha DESC"#;

/// Reads records from a PostgreSQL database.
pub struct PostgresSource {
    pool: PgPool,
    query: String,
}

impl PostgresSource {
    /// Build from `[source]`. The pool connects on first use.
    pub fn from_config(config: &SourceConfig) -> Result<Self, SourceError> {
        let database_url = config
            .database_url
            .as_deref()
            .ok_or(SourceError::MissingSetting("source.database_url"))?;

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(config.timeout_seconds))
            .connect_lazy(database_url)?;

        Ok(Self {
            pool,
            query: config
                .query
                .clone()
                .unwrap_or_else(|| DEFAULT_QUERY.to_string()),
        })
    }

    /// Round-trip `SELECT NOW()` and return the server time.
    pub async fn ping(&self) -> Result<String, SourceError> {
        let row = sqlx::query("SELECT NOW()::text AS now")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("now")?)
    }
}

impl RecordSource for PostgresSource {
    fn describe(&self) -> String {
        "postgres database".to_string()
    }

    async fn fetch_all(&self) -> Result<Vec<LogRecord>, SourceError> {
        debug!("Running record query: {}", self.query);
        let rows = sqlx::query(&self.query).fetch_all(&self.pool).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(record) = parse_row(&row_cells(row)?) {
                records.push(record);
            }
        }

        info!("Loaded {} of {} database rows", records.len(), rows.len());
        Ok(records)
    }
}

/// Every column as text; NULL becomes an empty cell.
fn row_cells(row: &PgRow) -> Result<Vec<String>, sqlx::Error> {
    (0..row.len())
        .map(|i| {
            row.try_get::<Option<String>, _>(i)
                .map(Option::unwrap_or_default)
        })
        .collect()
}
