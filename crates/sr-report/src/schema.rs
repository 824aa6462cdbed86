use serde::Serialize;
use serde_json::Value;
use sr_state::{BadRow, QueryWindow, ReconciliationState};

const MAX_DETAILS_PER_DIRECTION: usize = 100;

#[derive(Debug, Serialize)]
pub struct Summary {
    pub bus_messages_consumed: u64,
    pub db_rows_scanned: u64,
    pub total_matched: u64,
    pub total_mismatched: i64,
    pub matched_direct: u64,
    pub matched_via_overflow: u64,
    pub still_missing_in_db: i64,
    pub still_extra_in_db: i64,
    pub elapsed_seconds: f64,
}

impl Summary {
    pub fn from_state(state: &ReconciliationState, elapsed_seconds: f64) -> Self {
        Self {
            bus_messages_consumed: state.total_bus_consumed,
            db_rows_scanned: state.total_db_rows_scanned,
            total_matched: state.matched_total(),
            total_mismatched: state.mismatch_total(),
            matched_direct: state.matched_direct,
            matched_via_overflow: state.matched_via_overflow,
            still_missing_in_db: state.missing_total(),
            still_extra_in_db: state.extra_total(),
            elapsed_seconds,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DetailEntry {
    pub title: &'static str,
    pub record: Vec<Value>,
    pub count: i64,
}

/// Up to [`MAX_DETAILS_PER_DIRECTION`] sample rows per direction, not the
/// full multiset — §6 bounds this array so a large reconciliation run does
/// not balloon the output file.
pub fn details(state: &ReconciliationState) -> Vec<DetailEntry> {
    let mut out = Vec::new();
    for (key, count) in state.missing_from_db.iter().take(MAX_DETAILS_PER_DIRECTION) {
        out.push(DetailEntry {
            title: "Missing in DB",
            record: key.to_json_array(),
            count: *count,
        });
    }
    for (key, count) in state.pending_from_db.iter().take(MAX_DETAILS_PER_DIRECTION) {
        out.push(DetailEntry {
            title: "Extra in DB (unmatched)",
            record: key.to_json_array(),
            count: *count,
        });
    }
    out
}

pub type BadRowOut = BadRow;
pub type QueryWindowOut = QueryWindow;
