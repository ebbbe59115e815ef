//! Data models for the triage dashboard.
//!
//! This module contains the record type produced by the triage pipeline,
//! the filter criteria accepted by every dashboard view, and the derived
//! summaries computed from a record collection.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Errors raised at the input boundary before data reaches the aggregator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("unknown outcome '{0}' (expected SENT, PENDING or DO_NOT_RESPOND)")]
    UnknownOutcome(String),

    #[error("invalid minConfidence '{0}': expected a number between 0 and 1")]
    InvalidConfidence(String),

    #[error("invalid query string: {0}")]
    InvalidQuery(String),

    #[error("message is required")]
    EmptyMessage,
}

/// Triage disposition of a processed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum Outcome {
    /// A response was issued.
    Sent,
    /// Awaiting a human decision.
    Pending,
    /// Suppressed, no response will be sent.
    DoNotRespond,
}

impl Outcome {
    /// Canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Sent => "SENT",
            Outcome::Pending => "PENDING",
            Outcome::DoNotRespond => "DO_NOT_RESPOND",
        }
    }

    /// Parse a raw outcome label, accepting the pipeline's Spanish labels too.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "SENT" | "ENVIADO" => Some(Outcome::Sent),
            "PENDING" | "PENDIENTE" => Some(Outcome::Pending),
            "DO_NOT_RESPOND" | "NO_RESPONDER" => Some(Outcome::DoNotRespond),
            _ => None,
        }
    }

    /// Lenient parse used when ingesting external data: unknown labels become `Pending`.
    pub fn coerce(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|| {
            warn!("Unknown outcome '{}', treating as PENDING", raw);
            Outcome::Pending
        })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ValidationError::UnknownOutcome(s.to_string()))
    }
}

impl From<String> for Outcome {
    fn from(raw: String) -> Self {
        Self::coerce(&raw)
    }
}

/// One classified message as written by the triage pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// ISO 8601 moment the message was classified.
    #[serde(alias = "fecha")]
    pub timestamp: String,
    pub message_id: String,
    pub thread_id: String,
    /// Sender email address.
    #[serde(alias = "from")]
    pub sender: String,
    #[serde(alias = "template_key")]
    pub template_key: String,
    #[serde(alias = "motivo", default)]
    pub reason: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(alias = "titulo", default)]
    pub title: Option<String>,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f64,
    #[serde(alias = "pdf_url", default)]
    pub pdf_url: Option<String>,
    #[serde(alias = "resultado")]
    pub outcome: Outcome,
}

impl LogRecord {
    /// The `YYYY-MM-DD` portion of the timestamp.
    pub fn date_key(&self) -> &str {
        self.timestamp.split('T').next().unwrap_or(&self.timestamp)
    }

    /// Case-insensitive substring match on sender, thread and message ids.
    ///
    /// `needle` must already be lowercased.
    pub fn matches_text(&self, needle: &str) -> bool {
        self.sender.to_lowercase().contains(needle)
            || self.thread_id.to_lowercase().contains(needle)
            || self.message_id.to_lowercase().contains(needle)
    }
}

/// How a free-text search interacts with the other filter constraints.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Search text replaces every other constraint (dashboard behavior in production).
    #[default]
    Override,
    /// Search text is AND-combined with the other constraints.
    Combine,
}

/// Optional constraints applied to a record collection. Absent means unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FilterCriteria {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "strict_outcomes")]
    pub outcomes: BTreeSet<Outcome>,
    #[serde(default)]
    pub template_keys: BTreeSet<String>,
    pub min_confidence: Option<f64>,
    pub search_text: Option<String>,
    #[serde(default)]
    pub search_mode: SearchMode,
}

impl FilterCriteria {
    /// True when no constraint is present.
    pub fn is_empty(&self) -> bool {
        self.start_date.as_deref().map_or(true, str::is_empty)
            && self.end_date.as_deref().map_or(true, str::is_empty)
            && self.outcomes.is_empty()
            && self.template_keys.is_empty()
            && self.min_confidence.map_or(true, |c| c == 0.0)
            && self.search_text.as_deref().map_or(true, str::is_empty)
    }

    /// Build criteria from dashboard query parameters.
    ///
    /// Recognized keys: `startDate`, `endDate`, `resultado` and `template_key`
    /// (comma-separated), `minConfidence`, `search`. Unknown keys and empty
    /// values are ignored.
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut criteria = Self::default();

        for (key, value) in pairs {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }

            match key.as_ref() {
                "startDate" => criteria.start_date = Some(value.to_string()),
                "endDate" => criteria.end_date = Some(value.to_string()),
                "resultado" => {
                    for label in split_list(value) {
                        criteria.outcomes.insert(label.parse()?);
                    }
                }
                "template_key" => {
                    criteria
                        .template_keys
                        .extend(split_list(value).map(String::from));
                }
                "minConfidence" => criteria.min_confidence = Some(parse_confidence(value)?),
                "search" => criteria.search_text = Some(value.to_string()),
                _ => {}
            }
        }

        Ok(criteria)
    }
}

/// Outcome labels in criteria are user input, so unknown labels are rejected
/// instead of coerced.
fn strict_outcomes<'de, D>(deserializer: D) -> Result<BTreeSet<Outcome>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<String>::deserialize(deserializer)?
        .iter()
        .map(|label| label.parse::<Outcome>().map_err(serde::de::Error::custom))
        .collect()
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a confidence threshold, rejecting anything outside `[0, 1]`.
pub fn parse_confidence(raw: &str) -> Result<f64, ValidationError> {
    match raw.trim().parse::<f64>() {
        Ok(v) if (0.0..=1.0).contains(&v) => Ok(v),
        _ => Err(ValidationError::InvalidConfidence(raw.to_string())),
    }
}

/// Headline dashboard metrics for a record collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSummary {
    pub total_processed: usize,
    pub sent_count: usize,
    pub pending_count: usize,
    pub do_not_respond_count: usize,
    /// Percentage of records with outcome `SENT`.
    pub response_rate: f64,
    /// Percentage of records with outcome `PENDING`.
    pub ambiguity_rate: f64,
    /// Percentage of records with outcome `DO_NOT_RESPOND`.
    pub rejection_rate: f64,
    pub avg_confidence: f64,
    pub avg_confidence_sent: f64,
}

/// One point of the per-day volume series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStat {
    pub date: String,
    pub count: usize,
    pub avg_confidence: f64,
}

/// Usage and outcome breakdown for a single response template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateStat {
    pub template_key: String,
    pub count: usize,
    pub avg_confidence: f64,
    pub sent: usize,
    pub pending: usize,
    pub do_not_respond: usize,
    pub response_rate: f64,
}

/// Record counts per confidence band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceBands {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}
