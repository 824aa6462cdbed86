//! sr: the reconciliation run driver. Polls the bus cursor, batches decoded
//! records, invokes the reconciler, and emits the four JSON reports at the
//! end of a completed run (§4.5).

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};

use sr_bus::{BusCursor, BusPoll, BusSource};
use sr_db::{ClickHouseConfig, ClickHouseReader, DatabaseRangeReader, DbReaderError};
use sr_recon::{process_batch, BusItem, ReconcileError};
use sr_report::{write_reports, ReportPaths};
use sr_state::{BadRow, BadRowReason, ReconciliationState};

const POLL_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "sr", about = "Bus-to-warehouse reconciliation engine")]
struct Cli {
    /// Bus endpoint (host:port)
    #[arg(long)]
    broker: String,

    /// Topic name
    #[arg(long)]
    topic: String,

    /// Epoch ms, or "YYYY-MM-DD HH:MM:SS" UTC
    #[arg(long = "start-time")]
    start_time: String,

    #[arg(long = "batch-size", default_value_t = 10_000)]
    batch_size: usize,

    /// Commit bus offsets after each batch (advisory only)
    #[arg(long)]
    commit: bool,

    #[arg(long = "ch-host")]
    ch_host: String,
    #[arg(long = "ch-port", default_value_t = 9000)]
    ch_port: u16,
    #[arg(long = "ch-user")]
    ch_user: String,
    #[arg(long = "ch-password")]
    ch_password: Option<String>,
    #[arg(long = "ch-database")]
    ch_database: String,

    /// Target table
    #[arg(long)]
    table: String,

    #[arg(long)]
    summary: PathBuf,
    #[arg(long)]
    details: PathBuf,
    #[arg(long = "bad-rows")]
    bad_rows: PathBuf,
    #[arg(long = "ch-query-log")]
    ch_query_log: PathBuf,
}

impl Cli {
    fn resolve_ch_password(&self) -> Result<String> {
        if let Some(p) = &self.ch_password {
            return Ok(p.clone());
        }
        std::env::var("SR_CH_PASSWORD")
            .context("--ch-password not given and SR_CH_PASSWORD is not set")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) if e.to_string() == CANCELLED_MARKER => {
            warn!("run interrupted, no report written");
            std::process::exit(130);
        }
        Err(e) => {
            error!(error = %e, "reconciliation run failed");
            std::process::exit(1);
        }
    }
}

const CANCELLED_MARKER: &str = "interrupted";

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let start_ms = sr_bus::parse_start_time(&cli.start_time)?;
    let ch_password = cli.resolve_ch_password()?;

    let reader = ClickHouseReader::new(ClickHouseConfig {
        host: cli.ch_host.clone(),
        port: cli.ch_port,
        user: cli.ch_user.clone(),
        password: ch_password,
        database: cli.ch_database.clone(),
    });
    reader.ping().await.context("database unreachable at startup")?;

    let cursor = BusCursor::open(&cli.broker, &cli.topic, start_ms, "sr-reconciler")
        .context("opening bus cursor")?;

    let (state, elapsed_seconds) = drive(&cursor, &reader, &cli).await?;

    write_reports(
        &ReportPaths {
            summary: cli.summary,
            details: cli.details,
            bad_rows: cli.bad_rows,
            ch_query_log: cli.ch_query_log,
        },
        &state,
        elapsed_seconds,
    )?;

    Ok(())
}

async fn drive<S: BusSource, R: DatabaseRangeReader>(
    cursor: &S,
    reader: &R,
    cli: &Cli,
) -> Result<(ReconciliationState, f64)> {
    let started = Instant::now();
    let mut state = ReconciliationState::new();
    let mut batch: Vec<BusItem> = Vec::with_capacity(cli.batch_size);

    loop {
        let step = tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted, aborting with no partial report");
                anyhow::bail!(CANCELLED_MARKER);
            }
            poll = poll_once(cursor) => poll,
        };

        match step {
            BusPoll::Record(record) => match decode_record(&record) {
                Ok(payload) => batch.push(BusItem {
                    topic: record.topic,
                    partition: record.partition,
                    offset: record.offset,
                    payload,
                }),
                Err(bad) => state.push_bad_row(bad),
            },
            BusPoll::Timeout => {}
        }

        let should_flush = batch.len() >= cli.batch_size || cursor.is_complete();
        if should_flush && !batch.is_empty() {
            let flushed = std::mem::take(&mut batch);
            let flushed_len = flushed.len();
            let low_before = state.db_low_ns();
            let windows_before = state.db_query_windows.len();

            process_batch(reader, &cli.table, &mut state, flushed)
                .await
                .map_err(annotate_reconcile_error)?;

            let backfill_triggered = state.db_query_windows[windows_before..]
                .iter()
                .any(|w| low_before.is_none_or(|low| w.window_start_ns < low));
            info!(
                batch_size = flushed_len,
                watermark_ns = state.db_watermark_ns(),
                backfill_triggered,
                "batch reconciled"
            );

            if cli.commit {
                cursor.commit();
            }
        }

        if cursor.is_complete() && batch.is_empty() {
            break;
        }
    }

    let elapsed_seconds = started.elapsed().as_secs_f64();
    info!(
        elapsed_s = elapsed_seconds,
        matched = state.matched_total(),
        mismatched = state.mismatch_total(),
        "reconciliation run complete"
    );
    Ok((state, elapsed_seconds))
}

async fn poll_once<S: BusSource>(cursor: &S) -> BusPoll {
    cursor.next(POLL_TIMEOUT)
}

fn decode_record(record: &sr_bus::BusRecord) -> Result<serde_json::Value, BadRow> {
    serde_json::from_slice(&record.value).map_err(|e| {
        debug!(topic = %record.topic, partition = record.partition, offset = record.offset, error = %e, "invalid encoding");
        BadRow {
            reason: BadRowReason::InvalidEncoding,
            topic: record.topic.clone(),
            partition: record.partition,
            offset: record.offset,
            payload: None,
            raw_sample: Some(String::from_utf8_lossy(&record.value).chars().take(200).collect()),
            error: Some(e.to_string()),
        }
    })
}

fn annotate_reconcile_error(e: ReconcileError) -> anyhow::Error {
    match e {
        ReconcileError::Db(DbReaderError::DatabaseUnavailable(inner)) => {
            anyhow::anyhow!(inner).context("database unavailable")
        }
        ReconcileError::Db(err @ DbReaderError::DatabaseQueryFailed { .. }) => {
            anyhow::anyhow!(err.to_string())
        }
        ReconcileError::Invariant(v) => anyhow::anyhow!(v.to_string()),
    }
}
