use crate::analysis::{calculate_kpis, distinct_templates};
use crate::models::LogRecord;
use serde::{Deserialize, Serialize};

/// Dashboard summary sent alongside every question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantContext {
    pub total_logs: usize,
    pub sent: usize,
    pub pending: usize,
    pub do_not_respond: usize,
    pub avg_confidence: f64,
    pub templates: Vec<String>,
}

impl AssistantContext {
    pub fn from_records(records: &[LogRecord]) -> Self {
        let kpis = calculate_kpis(records);
        Self {
            total_logs: kpis.total_processed,
            sent: kpis.sent_count,
            pending: kpis.pending_count,
            do_not_respond: kpis.do_not_respond_count,
            avg_confidence: kpis.avg_confidence,
            templates: distinct_templates(records),
        }
    }
}
