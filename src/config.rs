//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.triagedash.toml` files.

use crate::cli::{Args, OutputFormat};
use crate::models::SearchMode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE: &str = ".triagedash.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Where records come from.
    #[serde(default)]
    pub source: SourceConfig,

    /// Assistant webhook settings.
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Filter behavior.
    #[serde(default)]
    pub filter: FilterConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Default output format.
    #[serde(default)]
    pub format: OutputFormat,
}

/// Kind of record source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Local JSON export.
    #[default]
    File,
    /// Google Sheets value range.
    Sheets,
    /// PostgreSQL table or view.
    Postgres,
}

/// Record source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,

    /// JSON file for the `file` source.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Spreadsheet id for the `sheets` source.
    #[serde(default)]
    pub spreadsheet_id: Option<String>,

    /// A1 range holding the log rows, e.g. `Logs!A:K`.
    #[serde(default)]
    pub range: Option<String>,

    /// OAuth bearer token. Prefer the TRIAGEDASH_SHEETS_TOKEN env var.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Connection URL for the `postgres` source. Prefer the DATABASE_URL env var.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    /// Select returning the eleven log columns as text, in row order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_source_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::File,
            path: None,
            spreadsheet_id: None,
            range: None,
            access_token: None,
            api_base: default_api_base(),
            database_url: None,
            query: None,
            timeout_seconds: default_source_timeout(),
        }
    }
}

fn default_api_base() -> String {
    "https://sheets.googleapis.com".to_string()
}

fn default_source_timeout() -> u64 {
    30
}

/// Assistant webhook settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Webhook that answers dashboard questions.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_assistant_timeout")]
    pub timeout_seconds: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_seconds: default_assistant_timeout(),
        }
    }
}

fn default_assistant_timeout() -> u64 {
    60
}

/// Filter behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Whether a search text overrides or combines with other constraints.
    #[serde(default)]
    pub search_mode: SearchMode,
}

/// Report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Lower bound of the high-confidence band.
    #[serde(default = "default_high_confidence")]
    pub high_confidence: f64,

    /// Lower bound of the medium-confidence band.
    #[serde(default = "default_medium_confidence")]
    pub medium_confidence: f64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            high_confidence: default_high_confidence(),
            medium_confidence: default_medium_confidence(),
        }
    }
}

fn default_high_confidence() -> f64 {
    0.8
}

fn default_medium_confidence() -> f64 {
    0.5
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    fn validate(&self) -> Result<()> {
        let report = &self.report;
        if !(0.0..=1.0).contains(&report.medium_confidence)
            || !(0.0..=1.0).contains(&report.high_confidence)
            || report.medium_confidence > report.high_confidence
        {
            anyhow::bail!(
                "report confidence bands must satisfy 0 <= medium ({}) <= high ({}) <= 1",
                report.medium_confidence,
                report.high_confidence
            );
        }
        Ok(())
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments and their environment variables take precedence over
    /// config file settings, but only when explicitly provided.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref path) = args.source {
            self.source.kind = SourceKind::File;
            self.source.path = Some(path.clone());
        }
        if let Some(ref token) = args.sheets_token {
            self.source.access_token = Some(token.clone());
        }
        if let Some(ref url) = args.database_url {
            self.source.database_url = Some(url.clone());
        }
        if let Some(ref url) = args.webhook_url {
            self.assistant.webhook_url = Some(url.clone());
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Log level after merging: `quiet` wins, then `[general] verbose`.
    pub fn log_level(&self, quiet: bool) -> tracing::Level {
        if quiet {
            tracing::Level::ERROR
        } else if self.general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
