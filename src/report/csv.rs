//! CSV export.

use crate::models::{DailyStat, KpiSummary, LogRecord, TemplateStat};

const RECORD_HEADERS: [&str; 8] = [
    "timestamp",
    "messageId",
    "threadId",
    "sender",
    "templateKey",
    "outcome",
    "confidence",
    "title",
];

/// Export records with one row per record.
pub fn records_to_csv(records: &[LogRecord]) -> String {
    let rows = records.iter().map(|r| {
        vec![
            r.timestamp.clone(),
            r.message_id.clone(),
            r.thread_id.clone(),
            r.sender.clone(),
            r.template_key.clone(),
            r.outcome.to_string(),
            r.confidence.to_string(),
            r.title.clone().unwrap_or_default(),
        ]
    });
    to_csv(&RECORD_HEADERS, rows)
}

pub fn kpis_to_csv(kpis: &KpiSummary) -> String {
    let rows = [
        ("totalProcessed", kpis.total_processed.to_string()),
        ("sentCount", kpis.sent_count.to_string()),
        ("pendingCount", kpis.pending_count.to_string()),
        ("doNotRespondCount", kpis.do_not_respond_count.to_string()),
        ("responseRate", kpis.response_rate.to_string()),
        ("ambiguityRate", kpis.ambiguity_rate.to_string()),
        ("rejectionRate", kpis.rejection_rate.to_string()),
        ("avgConfidence", kpis.avg_confidence.to_string()),
        ("avgConfidenceSent", kpis.avg_confidence_sent.to_string()),
    ];
    to_csv(
        &["metric", "value"],
        rows.into_iter().map(|(k, v)| vec![k.to_string(), v]),
    )
}

pub fn daily_to_csv(series: &[DailyStat]) -> String {
    to_csv(
        &["date", "count", "avgConfidence"],
        series.iter().map(|d| {
            vec![
                d.date.clone(),
                d.count.to_string(),
                d.avg_confidence.to_string(),
            ]
        }),
    )
}

pub fn templates_to_csv(stats: &[TemplateStat]) -> String {
    to_csv(
        &[
            "templateKey",
            "count",
            "sent",
            "pending",
            "doNotRespond",
            "responseRate",
            "avgConfidence",
        ],
        stats.iter().map(|s| {
            vec![
                s.template_key.clone(),
                s.count.to_string(),
                s.sent.to_string(),
                s.pending.to_string(),
                s.do_not_respond.to_string(),
                s.response_rate.to_string(),
                s.avg_confidence.to_string(),
            ]
        }),
    )
}

fn to_csv(headers: &[&str], rows: impl Iterator<Item = Vec<String>>) -> String {
    let mut lines = vec![headers.join(",")];
    lines.extend(rows.map(|row| {
        row.iter()
            .map(|field| escape_field(field))
            .collect::<Vec<_>>()
            .join(",")
    }));
    lines.join("\n") + "\n"
}

/// Quote a field containing a comma, quote or line break, doubling inner quotes.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::calculate_kpis;
    use crate::source::fixtures::sample_records;

    #[test]
    fn test_records_to_csv() {
        let mut records = sample_records();
        records.truncate(2);
        records[0].title = None;
        records[1].title = Some("Residency, spouse \"urgent\"".to_string());

        let csv = records_to_csv(&records);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "timestamp,messageId,threadId,sender,templateKey,outcome,confidence,title"
        );
        assert!(lines[1].ends_with(",PENDING,0.5,"));
        assert!(lines[2].ends_with(",SENT,0.92,\"Residency, spouse \"\"urgent\"\"\""));
    }

    #[test]
    fn test_empty_records_has_header_only() {
        assert_eq!(records_to_csv(&[]).lines().count(), 1);
    }

    #[test]
    fn test_kpis_to_csv() {
        let csv = kpis_to_csv(&calculate_kpis(&sample_records()));
        assert!(csv.contains("totalProcessed,5\n"));
        assert!(csv.contains("responseRate,20\n"));
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("line\nbreak"), "\"line\nbreak\"");
    }
}
