use anyhow::{Context, Result};
use serde::Serialize;
use sr_state::ReconciliationState;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::schema::{details, Summary};

/// Destination paths for the four output files, named after their CLI flags.
pub struct ReportPaths {
    pub summary: PathBuf,
    pub details: PathBuf,
    pub bad_rows: PathBuf,
    pub ch_query_log: PathBuf,
}

/// Writes all four reports, each atomically: serialize to a `NamedTempFile`
/// in the destination's parent directory, then `persist()` over the final
/// path (§6B). Either all four land or none does — a write is only ever
/// attempted after reconciliation has completed.
pub fn write_reports(paths: &ReportPaths, state: &ReconciliationState, elapsed_seconds: f64) -> Result<()> {
    let summary = Summary::from_state(state, elapsed_seconds);
    write_json_atomic(&paths.summary, &summary)?;
    write_json_atomic(&paths.details, &details(state))?;
    write_json_atomic(&paths.bad_rows, &state.bad_rows)?;
    write_json_atomic(&paths.ch_query_log, &state.db_query_windows)?;
    Ok(())
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp file next to {}", path.display()))?;
    serde_json::to_writer_pretty(&mut tmp, value)
        .with_context(|| format!("serialize report for {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("persist report to {}", path.display()))?;
    Ok(())
}
