use crate::Multiset;
use serde::Serialize;

/// Invariant violations indicate a programming defect, not bad input — the
/// CLI treats these as fatal (§7: "fail fast").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateInvariantViolation {
    /// I2: `db_low_ns` must never exceed `db_watermark_ns`.
    LowAboveWatermark { db_low_ns: i64, db_watermark_ns: i64 },
    /// A forward query range was not strictly above the watermark.
    ForwardQueryNotAboveWatermark {
        start_ns: i64,
        db_watermark_ns: i64,
    },
    /// A backfill query range was not strictly below the low-water mark.
    BackfillNotBelowLowWaterMark { end_ns: i64, db_low_ns: i64 },
    /// The watermark regressed.
    WatermarkRegressed { from: i64, to: i64 },
    /// The low-water mark increased.
    LowWaterMarkIncreased { from: i64, to: i64 },
}

impl std::fmt::Display for StateInvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LowAboveWatermark { db_low_ns, db_watermark_ns } => write!(
                f,
                "invariant violated: db_low_ns ({db_low_ns}) > db_watermark_ns ({db_watermark_ns})"
            ),
            Self::ForwardQueryNotAboveWatermark { start_ns, db_watermark_ns } => write!(
                f,
                "invariant violated: forward query start {start_ns} is not strictly above watermark {db_watermark_ns}"
            ),
            Self::BackfillNotBelowLowWaterMark { end_ns, db_low_ns } => write!(
                f,
                "invariant violated: backfill query end {end_ns} is not strictly below low-water mark {db_low_ns}"
            ),
            Self::WatermarkRegressed { from, to } => {
                write!(f, "invariant violated: watermark regressed from {from} to {to}")
            }
            Self::LowWaterMarkIncreased { from, to } => {
                write!(f, "invariant violated: low-water mark increased from {from} to {to}")
            }
        }
    }
}

impl std::error::Error for StateInvariantViolation {}

/// Why a bus record failed decode (§6: bad-rows array schema).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadRowReason {
    NotObject,
    MissingTimestamp,
    InvalidTimestamp,
    InvalidEncoding,
}

/// One entry of the bad-rows audit array.
#[derive(Debug, Clone, Serialize)]
pub struct BadRow {
    pub reason: BadRowReason,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_sample: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One entry of the query-window audit log.
#[derive(Debug, Clone, Serialize)]
pub struct QueryWindow {
    pub window_start_ns: i64,
    pub window_end_ns: i64,
    pub row_count: usize,
    pub table: String,
}

/// All mutable state for one run. Created once, mutated only by the batch
/// reconciler, finalized once at run end. Nothing outlives a single run.
#[derive(Debug, Default)]
pub struct ReconciliationState {
    pub missing_from_db: Multiset,
    pub pending_from_db: Multiset,
    db_watermark_ns: Option<i64>,
    db_low_ns: Option<i64>,
    pub total_bus_consumed: u64,
    pub total_db_rows_scanned: u64,
    pub matched_direct: u64,
    pub matched_via_overflow: u64,
    pub bad_rows: Vec<BadRow>,
    pub db_query_windows: Vec<QueryWindow>,
}

impl ReconciliationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn db_watermark_ns(&self) -> Option<i64> {
        self.db_watermark_ns
    }

    pub fn db_low_ns(&self) -> Option<i64> {
        self.db_low_ns
    }

    /// Set the low-water mark the first time a batch is observed. Only valid
    /// when it is currently unset.
    pub fn init_low_water_mark(&mut self, batch_start_ns: i64) {
        debug_assert!(self.db_low_ns.is_none());
        self.db_low_ns = Some(batch_start_ns);
    }

    /// Lower the low-water mark after a backfill query, enforcing I2 and
    /// monotone non-increase.
    pub fn lower_low_water_mark(&mut self, new_low_ns: i64) -> Result<(), StateInvariantViolation> {
        if let Some(current) = self.db_low_ns {
            if new_low_ns > current {
                return Err(StateInvariantViolation::LowWaterMarkIncreased {
                    from: current,
                    to: new_low_ns,
                });
            }
        }
        if let Some(wm) = self.db_watermark_ns {
            if new_low_ns > wm {
                return Err(StateInvariantViolation::LowAboveWatermark {
                    db_low_ns: new_low_ns,
                    db_watermark_ns: wm,
                });
            }
        }
        self.db_low_ns = Some(new_low_ns);
        Ok(())
    }

    /// Advance the watermark, enforcing monotone non-decrease (I2 is implied
    /// since the low-water mark only ever moves down).
    pub fn advance_watermark(&mut self, batch_end_ns: i64) -> Result<(), StateInvariantViolation> {
        let next = match self.db_watermark_ns {
            Some(current) => {
                if batch_end_ns < current {
                    return Err(StateInvariantViolation::WatermarkRegressed {
                        from: current,
                        to: batch_end_ns,
                    });
                }
                batch_end_ns.max(current)
            }
            None => batch_end_ns,
        };
        self.db_watermark_ns = Some(next);
        Ok(())
    }

    /// Record a backfill query window (strictly below the low-water mark at
    /// time of issue per P4) and its row count.
    pub fn record_backfill_window(
        &mut self,
        start_ns: i64,
        end_ns: i64,
        row_count: usize,
        table: &str,
    ) -> Result<(), StateInvariantViolation> {
        if let Some(low) = self.db_low_ns {
            if end_ns >= low {
                return Err(StateInvariantViolation::BackfillNotBelowLowWaterMark {
                    end_ns,
                    db_low_ns: low,
                });
            }
        }
        self.total_db_rows_scanned += row_count as u64;
        self.db_query_windows.push(QueryWindow {
            window_start_ns: start_ns,
            window_end_ns: end_ns,
            row_count,
            table: table.to_string(),
        });
        Ok(())
    }

    /// Record a forward query window (strictly above the watermark at time
    /// of issue) and its row count. `row_count` is `0` for a skipped query
    /// (the audit log still reflects that the window was considered).
    pub fn record_forward_window(
        &mut self,
        start_ns: i64,
        end_ns: i64,
        row_count: usize,
        table: &str,
    ) -> Result<(), StateInvariantViolation> {
        if let Some(wm) = self.db_watermark_ns {
            if start_ns <= wm {
                return Err(StateInvariantViolation::ForwardQueryNotAboveWatermark {
                    start_ns,
                    db_watermark_ns: wm,
                });
            }
        }
        self.total_db_rows_scanned += row_count as u64;
        self.db_query_windows.push(QueryWindow {
            window_start_ns: start_ns,
            window_end_ns: end_ns,
            row_count,
            table: table.to_string(),
        });
        Ok(())
    }

    pub fn push_bad_row(&mut self, row: BadRow) {
        self.bad_rows.push(row);
    }

    pub fn missing_total(&self) -> i64 {
        self.missing_from_db.total()
    }

    pub fn extra_total(&self) -> i64 {
        self.pending_from_db.total()
    }

    pub fn matched_total(&self) -> u64 {
        self.matched_direct + self.matched_via_overflow
    }

    pub fn mismatch_total(&self) -> i64 {
        self.missing_total() + self.extra_total()
    }

    /// I4: every bus record consumed is accounted for exactly once.
    pub fn check_mass_balance(&self) -> bool {
        let accounted = self.matched_direct as i64
            + self.matched_via_overflow as i64
            + self.missing_total()
            + self.bad_rows.len() as i64;
        accounted == self.total_bus_consumed as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watermark_cannot_regress() {
        let mut st = ReconciliationState::new();
        st.advance_watermark(100).unwrap();
        assert!(st.advance_watermark(50).is_err());
        assert_eq!(st.db_watermark_ns(), Some(100));
    }

    #[test]
    fn low_water_mark_rejects_increase() {
        let mut st = ReconciliationState::new();
        st.init_low_water_mark(100);
        assert!(st.lower_low_water_mark(150).is_err());
        st.lower_low_water_mark(50).unwrap();
        assert_eq!(st.db_low_ns(), Some(50));
    }

    #[test]
    fn forward_window_must_be_above_watermark() {
        let mut st = ReconciliationState::new();
        st.advance_watermark(100).unwrap();
        assert!(st.record_forward_window(100, 200, 0, "t").is_err());
        st.record_forward_window(101, 200, 0, "t").unwrap();
    }

    #[test]
    fn backfill_window_must_be_below_low_water_mark() {
        let mut st = ReconciliationState::new();
        st.init_low_water_mark(100);
        assert!(st.record_backfill_window(0, 100, 0, "t").is_err());
        st.record_backfill_window(0, 99, 0, "t").unwrap();
    }

    #[test]
    fn mass_balance_holds_for_empty_state() {
        let st = ReconciliationState::new();
        assert!(st.check_mass_balance());
    }
}
