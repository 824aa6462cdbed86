use async_trait::async_trait;
use clickhouse::{Client, Row};
use serde::Deserialize;
use sr_types::Key;

use crate::error::DbReaderError;

/// A single time-ranged query against the target table, returning rows as
/// record keys. Abstracted so `sr-recon`'s tests can swap in an in-memory
/// fake (`sr-testkit`) without a live warehouse.
#[async_trait]
pub trait DatabaseRangeReader {
    /// Inclusive on both ends. `start_ns > end_ns` is a no-op returning an
    /// empty sequence — a legitimate call the reconciler makes when the
    /// watermark already covers the batch.
    async fn query_range(
        &self,
        table: &str,
        start_ns: i64,
        end_ns: i64,
    ) -> Result<Vec<Key>, DbReaderError>;
}

pub struct ClickHouseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

pub struct ClickHouseReader {
    client: Client,
}

impl ClickHouseReader {
    pub fn new(config: ClickHouseConfig) -> Self {
        let url = format!("http://{}:{}", config.host, config.port);
        let client = Client::default()
            .with_url(url)
            .with_user(config.user)
            .with_password(config.password)
            .with_database(config.database);
        Self { client }
    }

    /// Cheap connectivity check, used once at startup to surface
    /// `DatabaseUnavailable` before the run loop begins.
    pub async fn ping(&self) -> Result<(), DbReaderError> {
        self.client
            .query("SELECT 1")
            .fetch_one::<u8>()
            .await
            .map(|_| ())
            .map_err(DbReaderError::DatabaseUnavailable)
    }
}

#[derive(Debug, Clone, Row, Deserialize)]
struct DbRow {
    dt_ns: i64,
    event_type: String,
    ticker: String,
    price: i64,
    quantity: i64,
    exchange: String,
    conditions: String,
}

#[async_trait]
impl DatabaseRangeReader for ClickHouseReader {
    async fn query_range(
        &self,
        table: &str,
        start_ns: i64,
        end_ns: i64,
    ) -> Result<Vec<Key>, DbReaderError> {
        if start_ns > end_ns {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT toUnixTimestamp64Nano(datetime) AS dt_ns, \
             event_type, ticker, price, quantity, exchange, conditions \
             FROM {table} \
             WHERE toUnixTimestamp64Nano(datetime) BETWEEN ? AND ?"
        );

        let rows: Vec<DbRow> = self
            .client
            .query(&sql)
            .bind(start_ns)
            .bind(end_ns)
            .fetch_all()
            .await
            .map_err(|e| DbReaderError::DatabaseQueryFailed {
                start_ns,
                end_ns,
                source: e,
            })?;

        Ok(rows
            .into_iter()
            .map(|r| {
                sr_types::key_from_db(
                    r.dt_ns,
                    r.event_type,
                    r.ticker,
                    r.price,
                    r.quantity,
                    r.exchange,
                    r.conditions,
                )
            })
            .collect())
    }
}
