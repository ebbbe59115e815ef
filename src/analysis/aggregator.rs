//! Log filtering and KPI aggregation.
//!
//! Pure functions over a slice of [`LogRecord`]s. Nothing here performs I/O
//! or keeps state between calls; every view is recomputed from the
//! collection passed in.

use crate::models::{
    ConfidenceBands, DailyStat, FilterCriteria, KpiSummary, LogRecord, Outcome, SearchMode,
    TemplateStat,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::cmp::Reverse;
use std::collections::HashMap;
use tracing::debug;

/// Records grouped by day, keys in first-occurrence order.
pub type DayGroups = Vec<(String, Vec<LogRecord>)>;

/// A record attribute that can be tallied with [`count_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    Outcome,
    TemplateKey,
    Day,
}

impl RecordField {
    fn value<'a>(&self, record: &'a LogRecord) -> &'a str {
        match self {
            RecordField::Outcome => record.outcome.as_str(),
            RecordField::TemplateKey => &record.template_key,
            RecordField::Day => record.date_key(),
        }
    }
}

/// Keep the records that satisfy every present constraint, in input order.
///
/// With [`SearchMode::Override`] a search text replaces the other
/// constraints entirely; with [`SearchMode::Combine`] it is one more
/// conjunct. Date bounds that are not valid ISO dates are ignored.
pub fn filter(records: &[LogRecord], criteria: &FilterCriteria) -> Vec<LogRecord> {
    let start = date_bound(criteria.start_date.as_deref());
    let end = date_bound(criteria.end_date.as_deref());
    let min_confidence = criteria
        .min_confidence
        .filter(|c| c.is_finite() && *c != 0.0);
    let needle = criteria
        .search_text
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let passes_constraints = |record: &LogRecord| {
        if start.is_some_and(|s| record.timestamp.as_str() < s) {
            return false;
        }
        if end.is_some_and(|e| record.timestamp.as_str() > e) {
            return false;
        }
        if !criteria.outcomes.is_empty() && !criteria.outcomes.contains(&record.outcome) {
            return false;
        }
        if !criteria.template_keys.is_empty()
            && !criteria.template_keys.contains(&record.template_key)
        {
            return false;
        }
        if min_confidence.is_some_and(|min| record.confidence < min) {
            return false;
        }
        true
    };

    let filtered: Vec<LogRecord> = records
        .iter()
        .filter(|&record| match (&needle, criteria.search_mode) {
            (Some(needle), SearchMode::Override) => record.matches_text(needle),
            (Some(needle), SearchMode::Combine) => {
                passes_constraints(record) && record.matches_text(needle)
            }
            (None, _) => passes_constraints(record),
        })
        .cloned()
        .collect();

    debug!("Filtered {} records down to {}", records.len(), filtered.len());
    filtered
}

/// Returns the bound when it is a recognizable ISO date or date-time.
fn date_bound(raw: Option<&str>) -> Option<&str> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    let valid = DateTime::parse_from_rfc3339(raw).is_ok()
        || NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M").is_ok();

    if valid {
        Some(raw)
    } else {
        debug!("Ignoring malformed date bound '{}'", raw);
        None
    }
}

/// Group records by the date portion of their timestamp.
pub fn group_by_day(records: &[LogRecord]) -> DayGroups {
    let mut groups: DayGroups = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let day = record.date_key();
        match index.get(day) {
            Some(&i) => groups[i].1.push(record.clone()),
            None => {
                index.insert(day, groups.len());
                groups.push((day.to_string(), vec![record.clone()]));
            }
        }
    }

    groups
}

/// Tally records by a field, keys in first-occurrence order.
pub fn count_by(records: &[LogRecord], field: RecordField) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let key = field.value(record);
        match index.get(key) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(key, counts.len());
                counts.push((key.to_string(), 1));
            }
        }
    }

    counts
}

/// Arithmetic mean confidence; `0.0` for an empty slice.
pub fn mean_confidence(records: &[LogRecord]) -> f64 {
    mean_of(records.iter())
}

fn mean_of<'a>(records: impl Iterator<Item = &'a LogRecord>) -> f64 {
    let (sum, n) = records.fold((0.0, 0usize), |(sum, n), r| (sum + r.confidence, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn rate(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute the headline KPIs in a single pass.
pub fn calculate_kpis(records: &[LogRecord]) -> KpiSummary {
    let mut summary = KpiSummary {
        total_processed: records.len(),
        ..Default::default()
    };
    let mut confidence_sum = 0.0;
    let mut sent_confidence_sum = 0.0;

    for record in records {
        confidence_sum += record.confidence;
        match record.outcome {
            Outcome::Sent => {
                summary.sent_count += 1;
                sent_confidence_sum += record.confidence;
            }
            Outcome::Pending => summary.pending_count += 1,
            Outcome::DoNotRespond => summary.do_not_respond_count += 1,
        }
    }

    let total = summary.total_processed;
    summary.response_rate = rate(summary.sent_count, total);
    summary.ambiguity_rate = rate(summary.pending_count, total);
    summary.rejection_rate = rate(summary.do_not_respond_count, total);
    if total > 0 {
        summary.avg_confidence = confidence_sum / total as f64;
    }
    if summary.sent_count > 0 {
        summary.avg_confidence_sent = sent_confidence_sum / summary.sent_count as f64;
    }

    summary
}

/// Sort newest first. RFC 3339 timestamps are ordered by instant; records
/// whose timestamp does not parse come after them, in descending string
/// order. The sort is stable.
pub fn sort_newest_first(records: &mut [LogRecord]) {
    records.sort_by_cached_key(|record| Reverse(timestamp_key(&record.timestamp)));
}

fn timestamp_key(timestamp: &str) -> (Option<DateTime<Utc>>, String) {
    let instant = DateTime::parse_from_rfc3339(timestamp)
        .ok()
        .map(|t| t.with_timezone(&Utc));
    (instant, timestamp.to_string())
}

/// Per-day record count and mean confidence, ascending by date.
pub fn daily_series(records: &[LogRecord]) -> Vec<DailyStat> {
    let mut series: Vec<DailyStat> = group_by_day(records)
        .into_iter()
        .map(|(date, items)| DailyStat {
            date,
            count: items.len(),
            avg_confidence: round2(mean_confidence(&items)),
        })
        .collect();

    series.sort_by(|a, b| a.date.cmp(&b.date));
    series
}

/// Average number of records per active day.
pub fn average_per_day(records: &[LogRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let days = count_by(records, RecordField::Day).len().max(1);
    records.len() as f64 / days as f64
}

/// Outcome breakdown per template, in first-occurrence order.
pub fn template_stats(records: &[LogRecord]) -> Vec<TemplateStat> {
    count_by(records, RecordField::TemplateKey)
        .into_iter()
        .map(|(key, count)| {
            let of_template: Vec<&LogRecord> =
                records.iter().filter(|r| r.template_key == key).collect();
            let with_outcome = |outcome: Outcome| {
                of_template
                    .iter()
                    .filter(|r| r.outcome == outcome)
                    .count()
            };
            let sent = with_outcome(Outcome::Sent);

            TemplateStat {
                avg_confidence: mean_of(of_template.iter().copied()),
                sent,
                pending: with_outcome(Outcome::Pending),
                do_not_respond: with_outcome(Outcome::DoNotRespond),
                response_rate: rate(sent, count),
                count,
                template_key: key,
            }
        })
        .collect()
}

/// Bucket records into high / medium / low confidence.
pub fn confidence_bands(records: &[LogRecord], high: f64, medium: f64) -> ConfidenceBands {
    let mut bands = ConfidenceBands::default();
    for record in records {
        if record.confidence >= high {
            bands.high += 1;
        } else if record.confidence >= medium {
            bands.medium += 1;
        } else {
            bands.low += 1;
        }
    }
    bands
}

/// Distinct template keys in first-occurrence order.
pub fn distinct_templates(records: &[LogRecord]) -> Vec<String> {
    count_by(records, RecordField::TemplateKey)
        .into_iter()
        .map(|(key, _)| key)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fixtures::{record, sample_records};

    fn three_records() -> Vec<LogRecord> {
        vec![
            record("2025-01-01T09:00:00Z", "m1", 0.9, Outcome::Sent),
            record("2025-01-01T10:00:00Z", "m2", 0.5, Outcome::Pending),
            record("2025-01-02T11:00:00Z", "m3", 0.2, Outcome::DoNotRespond),
        ]
    }

    fn ids(records: &[LogRecord]) -> Vec<&str> {
        records.iter().map(|r| r.message_id.as_str()).collect()
    }

    #[test]
    fn test_filter_without_criteria_is_identity() {
        let records = sample_records();
        assert_eq!(filter(&records, &FilterCriteria::default()), records);
    }

    #[test]
    fn test_filter_preserves_order() {
        let records = sample_records();
        let criteria = FilterCriteria {
            outcomes: [Outcome::Pending].into_iter().collect(),
            ..Default::default()
        };

        let filtered = filter(&records, &criteria);
        let positions: Vec<usize> = filtered
            .iter()
            .map(|f| records.iter().position(|r| r == f).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(filtered.len(), 3);
    }

    #[test]
    fn test_filter_min_confidence() {
        let criteria = FilterCriteria {
            min_confidence: Some(0.5),
            ..Default::default()
        };
        assert_eq!(ids(&filter(&three_records(), &criteria)), vec!["m1", "m2"]);
    }

    #[test]
    fn test_filter_zero_min_confidence_is_unconstrained() {
        let criteria = FilterCriteria {
            min_confidence: Some(0.0),
            ..Default::default()
        };
        assert_eq!(filter(&three_records(), &criteria).len(), 3);
    }

    #[test]
    fn test_filter_outcome_and_template_are_conjunctive() {
        let mut records = three_records();
        records[1].template_key = "Y".to_string();
        let criteria = FilterCriteria {
            outcomes: [Outcome::Sent].into_iter().collect(),
            template_keys: ["X".to_string()].into_iter().collect(),
            ..Default::default()
        };

        let pending_y = &records[1..2];
        assert!(filter(pending_y, &criteria).is_empty());
    }

    #[test]
    fn test_filter_date_bounds_are_inclusive() {
        let criteria = FilterCriteria {
            start_date: Some("2025-01-01T10:00:00Z".to_string()),
            end_date: Some("2025-01-02T11:00:00Z".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&filter(&three_records(), &criteria)), vec!["m2", "m3"]);
    }

    #[test]
    fn test_filter_date_only_end_bound_compares_lexically() {
        let criteria = FilterCriteria {
            end_date: Some("2025-01-02".to_string()),
            ..Default::default()
        };
        // "2025-01-02T11:00:00Z" sorts after "2025-01-02"
        assert_eq!(ids(&filter(&three_records(), &criteria)), vec!["m1", "m2"]);
    }

    #[test]
    fn test_filter_ignores_malformed_dates() {
        let criteria = FilterCriteria {
            start_date: Some("next tuesday".to_string()),
            end_date: Some("2025-13-45".to_string()),
            ..Default::default()
        };
        assert_eq!(filter(&three_records(), &criteria).len(), 3);
    }

    #[test]
    fn test_search_text_overrides_other_constraints() {
        let mut records = three_records();
        records[1].sender = "Foo.Client@example.com".to_string();
        let criteria = FilterCriteria {
            outcomes: [Outcome::Sent].into_iter().collect(),
            search_text: Some("foo".to_string()),
            ..Default::default()
        };

        // The PENDING record is returned even though only SENT was requested.
        assert_eq!(ids(&filter(&records, &criteria)), vec!["m2"]);
    }

    #[test]
    fn test_search_text_combined_with_constraints() {
        let mut records = three_records();
        records[1].sender = "foo@example.com".to_string();
        let criteria = FilterCriteria {
            outcomes: [Outcome::Sent].into_iter().collect(),
            search_text: Some("foo".to_string()),
            search_mode: SearchMode::Combine,
            ..Default::default()
        };
        assert!(filter(&records, &criteria).is_empty());
    }

    #[test]
    fn test_search_matches_thread_and_message_ids() {
        let criteria = FilterCriteria {
            search_text: Some("M3".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&filter(&three_records(), &criteria)), vec!["m3"]);
    }

    #[test]
    fn test_group_by_day() {
        let groups = group_by_day(&three_records());

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "2025-01-01");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "2025-01-02");
        assert_eq!(groups[1].1.len(), 1);
    }

    #[test]
    fn test_group_by_day_partitions_input() {
        let records = sample_records();
        let groups = group_by_day(&records);

        let total: usize = groups.iter().map(|(_, items)| items.len()).sum();
        assert_eq!(total, records.len());
        for (day, items) in &groups {
            assert!(items.iter().all(|r| r.date_key() == day));
        }
    }

    #[test]
    fn test_count_by_outcome_and_template() {
        let records = sample_records();

        let outcomes = count_by(&records, RecordField::Outcome);
        assert_eq!(
            outcomes,
            vec![
                ("PENDING".to_string(), 3),
                ("SENT".to_string(), 1),
                ("DO_NOT_RESPOND".to_string(), 1),
            ]
        );

        let templates = count_by(&records, RecordField::TemplateKey);
        assert_eq!(templates[0], ("FAMILY_REUNIFICATION".to_string(), 3));
    }

    #[test]
    fn test_mean_confidence() {
        assert_eq!(mean_confidence(&[]), 0.0);

        let mut records = three_records();
        let forward = mean_confidence(&records);
        records.reverse();
        assert!((forward - mean_confidence(&records)).abs() < 1e-12);
        assert!((forward - 0.5333).abs() < 1e-3);
    }

    #[test]
    fn test_calculate_kpis() {
        let kpis = calculate_kpis(&three_records());

        assert_eq!(kpis.total_processed, 3);
        assert_eq!(kpis.sent_count, 1);
        assert!((kpis.response_rate - 33.33).abs() < 0.01);
        assert!((kpis.ambiguity_rate - 33.33).abs() < 0.01);
        assert!((kpis.rejection_rate - 33.33).abs() < 0.01);
        assert!((kpis.avg_confidence - 0.533).abs() < 1e-3);
        assert!((kpis.avg_confidence_sent - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_calculate_kpis_partitions_total() {
        let kpis = calculate_kpis(&sample_records());
        assert_eq!(
            kpis.sent_count + kpis.pending_count + kpis.do_not_respond_count,
            kpis.total_processed
        );
    }

    #[test]
    fn test_calculate_kpis_empty() {
        let kpis = calculate_kpis(&[]);
        assert_eq!(kpis, KpiSummary::default());
        assert_eq!(kpis.response_rate, 0.0);
        assert_eq!(kpis.avg_confidence, 0.0);
    }

    #[test]
    fn test_sort_newest_first() {
        let mut records = three_records();
        records.push(record("2025-01-01T09:30:00+01:00", "m4", 0.7, Outcome::Sent));
        sort_newest_first(&mut records);

        // 09:30+01:00 is 08:30Z, the earliest instant
        assert_eq!(ids(&records), vec!["m3", "m2", "m1", "m4"]);
    }

    #[test]
    fn test_sort_mixed_timestamp_formats() {
        let formats = ["T09:30:00+05:00", "T09:00:00Z", "T09:15:00"];
        let mut records: Vec<LogRecord> = (0..400)
            .map(|i| {
                let timestamp = format!("2025-01-{:02}{}", i % 28 + 1, formats[i % 3]);
                record(&timestamp, &format!("m{}", i), 0.5, Outcome::Pending)
            })
            .collect();

        sort_newest_first(&mut records);

        let (parsed, naive) = records.split_at(records.len() - 133);
        assert!(naive.iter().all(|r| r.timestamp.ends_with("T09:15:00")));
        assert!(parsed.iter().all(|r| !r.timestamp.ends_with("T09:15:00")));
        assert!(parsed.windows(2).all(|w| {
            let a = DateTime::parse_from_rfc3339(&w[0].timestamp).unwrap();
            let b = DateTime::parse_from_rfc3339(&w[1].timestamp).unwrap();
            a >= b
        }));
        assert!(naive.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[test]
    fn test_daily_series() {
        let mut records = three_records();
        records.reverse();
        let series = daily_series(&records);

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].date, "2025-01-01");
        assert_eq!(series[0].count, 2);
        assert_eq!(series[0].avg_confidence, 0.7);
        assert_eq!(series[1].avg_confidence, 0.2);
    }

    #[test]
    fn test_average_per_day() {
        assert_eq!(average_per_day(&[]), 0.0);
        assert_eq!(average_per_day(&three_records()), 1.5);
    }

    #[test]
    fn test_template_stats() {
        let stats = template_stats(&sample_records());

        let family = &stats[0];
        assert_eq!(family.template_key, "FAMILY_REUNIFICATION");
        assert_eq!(family.count, 3);
        assert_eq!(family.sent, 1);
        assert_eq!(family.pending, 2);
        assert!((family.response_rate - 33.33).abs() < 0.01);
        assert!((family.avg_confidence - 0.64).abs() < 1e-9);

        let asylum = stats.iter().find(|s| s.template_key == "ASYLUM").unwrap();
        assert_eq!(asylum.do_not_respond, 1);
        assert_eq!(asylum.response_rate, 0.0);
    }

    #[test]
    fn test_confidence_bands() {
        let bands = confidence_bands(&sample_records(), 0.8, 0.5);
        assert_eq!(
            bands,
            ConfidenceBands {
                high: 1,
                medium: 2,
                low: 2
            }
        );
    }

    #[test]
    fn test_distinct_templates() {
        assert_eq!(
            distinct_templates(&sample_records()),
            vec!["FAMILY_REUNIFICATION", "NATIONALITY_RESIDENCE", "ASYLUM"]
        );
    }
}
