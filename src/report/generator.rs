//! Markdown and JSON rendering.
//!
//! This module turns aggregator outputs into the tables shown on the
//! dashboard pages.

use crate::analysis::{average_per_day, count_by, RecordField};
use crate::models::{ConfidenceBands, DailyStat, KpiSummary, LogRecord, TemplateStat};
use anyhow::Result;
use serde::Serialize;

/// Pretty-printed JSON for any dashboard output.
pub fn generate_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}

/// KPI overview: headline metrics, outcome and template breakdowns, confidence bands.
pub fn generate_kpi_markdown(
    kpis: &KpiSummary,
    records: &[LogRecord],
    bands: &ConfidenceBands,
) -> String {
    let mut output = String::new();

    output.push_str("# Triage Dashboard\n\n");
    output.push_str(&generate_kpi_section(kpis, records));
    output.push_str(&generate_breakdown_section(
        "Outcomes",
        "Outcome",
        &count_by(records, RecordField::Outcome),
    ));
    output.push_str(&generate_breakdown_section(
        "Templates",
        "Template",
        &count_by(records, RecordField::TemplateKey),
    ));
    output.push_str(&generate_bands_section(bands));

    output
}

fn generate_kpi_section(kpis: &KpiSummary, records: &[LogRecord]) -> String {
    let mut section = String::new();

    section.push_str("## Key Metrics\n\n");
    section.push_str("| Metric | Value |\n");
    section.push_str("|:---|---:|\n");
    section.push_str(&format!("| Total processed | {} |\n", kpis.total_processed));
    section.push_str(&format!(
        "| Sent | {} ({:.1}%) |\n",
        kpis.sent_count, kpis.response_rate
    ));
    section.push_str(&format!(
        "| Pending | {} ({:.1}%) |\n",
        kpis.pending_count, kpis.ambiguity_rate
    ));
    section.push_str(&format!(
        "| Do not respond | {} ({:.1}%) |\n",
        kpis.do_not_respond_count, kpis.rejection_rate
    ));
    section.push_str(&format!(
        "| Avg confidence | {:.1}% |\n",
        kpis.avg_confidence * 100.0
    ));
    section.push_str(&format!(
        "| Avg confidence (sent) | {:.1}% |\n",
        kpis.avg_confidence_sent * 100.0
    ));
    section.push_str(&format!(
        "| Avg per day | {:.1} |\n",
        average_per_day(records)
    ));
    section.push('\n');

    section
}

fn generate_breakdown_section(title: &str, label: &str, counts: &[(String, usize)]) -> String {
    if counts.is_empty() {
        return String::new();
    }

    let mut sorted: Vec<_> = counts.iter().collect();
    sorted.sort_by_key(|(_, count)| std::cmp::Reverse(*count));

    let mut section = format!("## {}\n\n| {} | Count |\n|:---|:---:|\n", title, label);
    for (key, count) in sorted {
        section.push_str(&format!("| {} | {} |\n", escape_cell(key), count));
    }
    section.push('\n');

    section
}

fn generate_bands_section(bands: &ConfidenceBands) -> String {
    let mut section = String::new();

    section.push_str("## Confidence\n\n");
    section.push_str("| High | Medium | Low |\n");
    section.push_str("|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} |\n\n",
        bands.high, bands.medium, bands.low
    ));

    section
}

/// Records table, in the order given.
pub fn generate_records_markdown(records: &[LogRecord]) -> String {
    let mut output = String::new();

    output.push_str("| Date | Sender | Template | Outcome | Confidence | Title |\n");
    output.push_str("|:---|:---|:---|:---|---:|:---|\n");

    if records.is_empty() {
        output.push_str("\nNo records match the current filters.\n");
        return output;
    }

    for record in records {
        output.push_str(&format!(
            "| {} | {} | {} | {} | {:.0}% | {} |\n",
            record.timestamp,
            escape_cell(&record.sender),
            escape_cell(&record.template_key),
            record.outcome,
            record.confidence * 100.0,
            record.title.as_deref().map(escape_cell).unwrap_or_default(),
        ));
    }

    output
}

/// Per-day series table.
pub fn generate_daily_markdown(series: &[DailyStat]) -> String {
    let mut output = String::from("| Date | Emails | Avg confidence |\n|:---|---:|---:|\n");
    for day in series {
        output.push_str(&format!(
            "| {} | {} | {:.2} |\n",
            day.date, day.count, day.avg_confidence
        ));
    }
    output
}

/// Per-template stats table.
pub fn generate_templates_markdown(stats: &[TemplateStat]) -> String {
    let mut output = String::new();

    output.push_str(
        "| Template | Emails | Sent | Pending | Do not respond | Response rate | Avg confidence |\n",
    );
    output.push_str("|:---|---:|---:|---:|---:|---:|---:|\n");
    for stat in stats {
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} | {:.1}% | {:.1}% |\n",
            escape_cell(&stat.template_key),
            stat.count,
            stat.sent,
            stat.pending,
            stat.do_not_respond,
            stat.response_rate,
            stat.avg_confidence * 100.0,
        ));
    }

    output
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{calculate_kpis, confidence_bands, daily_series, template_stats};
    use crate::source::fixtures::sample_records;

    #[test]
    fn test_generate_kpi_markdown() {
        let records = sample_records();
        let kpis = calculate_kpis(&records);
        let bands = confidence_bands(&records, 0.8, 0.5);

        let markdown = generate_kpi_markdown(&kpis, &records, &bands);

        assert!(markdown.contains("# Triage Dashboard"));
        assert!(markdown.contains("| Total processed | 5 |"));
        assert!(markdown.contains("| Sent | 1 (20.0%) |"));
        assert!(markdown.contains("| PENDING | 3 |"));
        assert!(markdown.contains("| FAMILY_REUNIFICATION | 3 |"));
        assert!(markdown.contains("| 1 | 2 | 2 |"));
    }

    #[test]
    fn test_generate_kpi_markdown_empty() {
        let markdown = generate_kpi_markdown(&KpiSummary::default(), &[], &ConfidenceBands::default());
        assert!(markdown.contains("| Total processed | 0 |"));
        assert!(!markdown.contains("## Outcomes"));
    }

    #[test]
    fn test_generate_records_markdown() {
        let markdown = generate_records_markdown(&sample_records());
        assert!(markdown.contains("agency.madrid@gmail.com"));
        assert!(markdown.contains("| SENT | 92% |"));

        let empty = generate_records_markdown(&[]);
        assert!(empty.contains("No records match"));
    }

    #[test]
    fn test_generate_daily_and_templates_markdown() {
        let records = sample_records();

        let daily = generate_daily_markdown(&daily_series(&records));
        assert!(daily.contains("| 2025-10-28 | 5 | 0.51 |"));

        let templates = generate_templates_markdown(&template_stats(&records));
        assert!(templates.contains("| ASYLUM | 1 | 0 | 0 | 1 | 0.0% | 20.0% |"));
    }

    #[test]
    fn test_escape_cell() {
        assert_eq!(escape_cell("a|b\nc"), "a\\|b c");
    }

    #[test]
    fn test_generate_json() {
        let json = generate_json(&calculate_kpis(&sample_records())).unwrap();
        assert!(json.contains("\"totalProcessed\": 5"));
        assert!(json.contains("\"responseRate\""));
    }
}
