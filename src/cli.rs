//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and the shared filter flags.

use crate::models::{parse_confidence, FilterCriteria, Outcome, SearchMode, ValidationError};
use clap::{Parser, Subcommand};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// TriageDash - operational dashboard for email-triage logs
///
/// Filter triage records, compute KPIs and per-day / per-template
/// breakdowns, export to CSV, and ask the assistant webhook about the data.
///
/// Examples:
///   triagedash --source logs.json kpis
///   triagedash logs --outcome SENT,PENDING --min-confidence 0.7 --format csv
///   triagedash logs --query "startDate=2025-10-01&template_key=ASYLUM"
///   triagedash ask "Which template has the lowest response rate?"
///   triagedash ping-db
///   triagedash init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .triagedash.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// JSON file to read records from (overrides the configured source)
    #[arg(short, long, value_name = "FILE", env = "TRIAGEDASH_SOURCE", global = true)]
    pub source: Option<PathBuf>,

    /// Access token for the spreadsheet source
    #[arg(
        long,
        value_name = "TOKEN",
        env = "TRIAGEDASH_SHEETS_TOKEN",
        hide_env_values = true,
        global = true
    )]
    pub sheets_token: Option<String>,

    /// Connection URL for the postgres source
    #[arg(
        long,
        value_name = "URL",
        env = "DATABASE_URL",
        hide_env_values = true,
        global = true
    )]
    pub database_url: Option<String>,

    /// Assistant webhook URL
    #[arg(long, value_name = "URL", env = "ASSISTANT_WEBHOOK_URL", global = true)]
    pub webhook_url: Option<String>,

    /// Output format (json, markdown, csv)
    #[arg(long, value_name = "FORMAT", global = true)]
    pub format: Option<OutputFormat>,

    /// Write output to a file instead of stdout
    #[arg(short, long, value_name = "FILE", global = true)]
    pub output: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List matching records, newest first
    Logs {
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Headline KPIs for the matching records
    Kpis {
        #[command(flatten)]
        filters: FilterArgs,

        /// Exit with code 2 when the response rate is below this percentage
        #[arg(long, value_name = "PCT")]
        fail_below: Option<f64>,
    },

    /// Records and mean confidence per day
    Daily {
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Usage and outcomes per response template
    Templates {
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Ask the assistant a question about the matching records
    Ask {
        /// The question to send
        message: String,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Check that the configured database answers
    PingDb,

    /// Generate a default .triagedash.toml configuration file
    InitConfig,
}

impl Command {
    /// Filter flags of data commands.
    pub fn filters(&self) -> Option<&FilterArgs> {
        match self {
            Command::Logs { filters }
            | Command::Kpis { filters, .. }
            | Command::Daily { filters }
            | Command::Templates { filters }
            | Command::Ask { filters, .. } => Some(filters),
            Command::PingDb | Command::InitConfig => None,
        }
    }
}

/// Filter flags shared by every data command.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Earliest timestamp to include (ISO 8601, inclusive)
    #[arg(long, value_name = "DATE")]
    pub start_date: Option<String>,

    /// Latest timestamp to include (ISO 8601, inclusive)
    #[arg(long, value_name = "DATE")]
    pub end_date: Option<String>,

    /// Outcomes to include (comma-separated)
    ///
    /// Example: --outcome SENT,PENDING
    #[arg(long, value_name = "OUTCOMES", value_delimiter = ',')]
    pub outcome: Vec<String>,

    /// Template keys to include (comma-separated)
    #[arg(long = "template", value_name = "KEYS", value_delimiter = ',')]
    pub templates: Vec<String>,

    /// Minimum confidence (0.0 - 1.0)
    #[arg(long, value_name = "SCORE")]
    pub min_confidence: Option<String>,

    /// Case-insensitive text matched against sender, thread id and message id
    #[arg(long, value_name = "TEXT")]
    pub search: Option<String>,

    /// How --search interacts with the other filters
    #[arg(long, value_name = "MODE")]
    pub search_mode: Option<SearchMode>,

    /// Dashboard query string, e.g. "resultado=SENT&minConfidence=0.8"
    ///
    /// Explicit flags take precedence over the same filter in the query.
    #[arg(long, value_name = "QUERY")]
    pub query: Option<String>,
}

impl FilterArgs {
    /// Build filter criteria, validating every value.
    pub fn to_criteria(&self, default_mode: SearchMode) -> Result<FilterCriteria, ValidationError> {
        let mut criteria = match self.query {
            Some(ref query) => FilterCriteria::from_query_pairs(parse_query_string(query)?)?,
            None => FilterCriteria::default(),
        };

        if self.start_date.is_some() {
            criteria.start_date = self.start_date.clone();
        }
        if self.end_date.is_some() {
            criteria.end_date = self.end_date.clone();
        }
        if !self.outcome.is_empty() {
            criteria.outcomes = self
                .outcome
                .iter()
                .map(|label| label.parse::<Outcome>())
                .collect::<Result<_, _>>()?;
        }
        if !self.templates.is_empty() {
            criteria.template_keys = self.templates.iter().cloned().collect();
        }
        if let Some(ref raw) = self.min_confidence {
            criteria.min_confidence = Some(parse_confidence(raw)?);
        }
        if self.search.is_some() {
            criteria.search_text = self.search.clone();
        }
        criteria.search_mode = self.search_mode.unwrap_or(default_mode);

        Ok(criteria)
    }
}

/// Split `a=1&b=2` into decoded key-value pairs.
fn parse_query_string(query: &str) -> Result<Vec<(String, String)>, ValidationError> {
    let query = query.trim_start_matches('?');
    let url = Url::parse(&format!("http://localhost/?{}", query))
        .map_err(|e| ValidationError::InvalidQuery(e.to_string()))?;

    Ok(url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect())
}

/// Output format for command results.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// Markdown tables
    Markdown,
    /// Comma-separated values
    Csv,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.webhook_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Webhook URL must start with 'http://' or 'https://'".to_string());
            }
        }

        match &self.command {
            Command::Kpis {
                fail_below: Some(pct),
                ..
            } if !(0.0..=100.0).contains(pct) => {
                return Err("--fail-below must be between 0 and 100".to_string());
            }
            Command::Ask { message, .. } if message.trim().is_empty() => {
                return Err(ValidationError::EmptyMessage.to_string());
            }
            _ => {}
        }

        if let Some(ref source) = self.source {
            if !source.is_file() {
                return Err(format!("Source file does not exist: {}", source.display()));
            }
        }

        Ok(())
    }
}
