//! Spreadsheet row parsing.
//!
//! The triage pipeline appends one row per classified message. Columns, in
//! order: timestamp, messageId, threadId, sender, templateKey, reason, title,
//! confidence, rationale, pdfUrl, outcome. The first row is a header.

use crate::models::{LogRecord, Outcome};
use tracing::{debug, warn};

/// Parse every data row, skipping the header and rows that cannot be used.
pub fn rows_to_records(rows: &[Vec<String>]) -> Vec<LogRecord> {
    if rows.len() <= 1 {
        return Vec::new();
    }

    let records: Vec<LogRecord> = rows[1..].iter().filter_map(|row| parse_row(row)).collect();
    debug!("Parsed {} of {} data rows", records.len(), rows.len() - 1);
    records
}

/// Parse one row. Returns `None` when the timestamp or message id is missing.
pub fn parse_row(row: &[String]) -> Option<LogRecord> {
    let cell = |i: usize| row.get(i).map(|s| s.trim()).unwrap_or("");

    let timestamp = cell(0);
    let message_id = cell(1);
    if timestamp.is_empty() || message_id.is_empty() {
        debug!("Skipping row without timestamp or message id");
        return None;
    }

    let confidence = match cell(7).parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    };

    let record = LogRecord {
        timestamp: timestamp.to_string(),
        message_id: message_id.to_string(),
        thread_id: cell(2).to_string(),
        sender: cell(3).to_string(),
        template_key: cell(4).to_string(),
        reason: cell(5).to_string(),
        title: Some(cell(6).to_string()),
        confidence,
        rationale: cell(8).to_string(),
        pdf_url: Some(cell(9).to_string()),
        outcome: Outcome::coerce(cell(10)),
    };

    Some(normalize_record(record))
}

/// Bring a record into its invariants: confidence within `[0, 1]`, blank
/// optional text absent.
pub fn normalize_record(mut record: LogRecord) -> LogRecord {
    if !(0.0..=1.0).contains(&record.confidence) {
        let clamped = if record.confidence.is_finite() {
            record.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        warn!(
            "Confidence {} for message {} out of range, using {}",
            record.confidence, record.message_id, clamped
        );
        record.confidence = clamped;
    }

    record.title = blank_to_none(record.title);
    record.pdf_url = blank_to_none(record.pdf_url);
    record
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
