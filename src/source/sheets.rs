//! Google Sheets record source.
//!
//! Reads a value range through the Sheets v4 REST API. Authentication is a
//! bearer access token obtained out of band (service account or gcloud).

use super::rows::rows_to_records;
use super::{RecordSource, SourceError};
use crate::config::SourceConfig;
use crate::models::LogRecord;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Body of a `spreadsheets.values.get` response.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Fetches log rows from a spreadsheet range.
pub struct SheetsSource {
    http_client: reqwest::Client,
    api_base: String,
    spreadsheet_id: String,
    range: String,
    access_token: String,
}

impl SheetsSource {
    /// Build from `[source]`; spreadsheet id, range and token are required.
    pub fn from_config(config: &SourceConfig) -> Result<Self, SourceError> {
        let spreadsheet_id = config
            .spreadsheet_id
            .clone()
            .ok_or(SourceError::MissingSetting("source.spreadsheet_id"))?;
        let range = config
            .range
            .clone()
            .ok_or(SourceError::MissingSetting("source.range"))?;
        let access_token = config
            .access_token
            .clone()
            .ok_or(SourceError::MissingSetting("source.access_token"))?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http_client,
            api_base: config.api_base.clone(),
            spreadsheet_id,
            range,
            access_token,
        })
    }

    /// URL of the values endpoint, with the range percent-encoded as a path segment.
    fn values_url(&self) -> Result<Url, SourceError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| SourceError::InvalidUrl(format!("{}: {}", self.api_base, e)))?;

        url.path_segments_mut()
            .map_err(|_| SourceError::InvalidUrl(self.api_base.clone()))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                self.range.as_str(),
            ]);

        Ok(url)
    }
}

impl RecordSource for SheetsSource {
    fn describe(&self) -> String {
        format!("spreadsheet {} ({})", self.spreadsheet_id, self.range)
    }

    async fn fetch_all(&self) -> Result<Vec<LogRecord>, SourceError> {
        let url = self.values_url()?;
        debug!("Fetching {}", url);

        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status { status, body });
        }

        let range: ValueRange = response.json().await?;
        let records = rows_to_records(&range.values);

        info!(
            "Loaded {} records from spreadsheet {}",
            records.len(),
            self.spreadsheet_id
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceKind;

    fn sheets_config() -> SourceConfig {
        SourceConfig {
            kind: SourceKind::Sheets,
            spreadsheet_id: Some("1AbC".to_string()),
            range: Some("Triage Log!A:K".to_string()),
            access_token: Some("token".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_values_url_encodes_range() {
        let source = SheetsSource::from_config(&sheets_config()).unwrap();
        let url = source.values_url().unwrap();

        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/1AbC/values/Triage%20Log!A:K"
        );
    }

    #[test]
    fn test_values_url_with_custom_base() {
        let config = SourceConfig {
            api_base: "http://localhost:8080/".to_string(),
            ..sheets_config()
        };
        let source = SheetsSource::from_config(&config).unwrap();
        assert_eq!(
            source.values_url().unwrap().path(),
            "/v4/spreadsheets/1AbC/values/Triage%20Log!A:K"
        );
    }

    #[test]
    fn test_missing_settings() {
        let config = SourceConfig {
            access_token: None,
            ..sheets_config()
        };
        let err = SheetsSource::from_config(&config).err().unwrap();
        assert!(matches!(err, SourceError::MissingSetting("source.access_token")));
    }

    #[test]
    fn test_value_range_without_values() {
        let range: ValueRange = serde_json::from_str(r#"{"range":"A1:K1"}"#).unwrap();
        assert!(range.values.is_empty());
    }
}
