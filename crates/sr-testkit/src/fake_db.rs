use std::sync::Mutex;

use async_trait::async_trait;
use sr_db::{DatabaseRangeReader, DbReaderError};
use sr_types::Key;

/// An in-memory table of `(timestamp_ns, key)` rows, queryable the same way
/// `ClickHouseReader` queries a live warehouse.
pub struct FakeDatabaseReader {
    rows: Mutex<Vec<(i64, Key)>>,
}

impl FakeDatabaseReader {
    pub fn new() -> Self {
        Self { rows: Mutex::new(Vec::new()) }
    }

    pub fn insert(&self, timestamp_ns: i64, key: Key) {
        self.rows.lock().unwrap().push((timestamp_ns, key));
    }
}

impl Default for FakeDatabaseReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseRangeReader for FakeDatabaseReader {
    async fn query_range(
        &self,
        _table: &str,
        start_ns: i64,
        end_ns: i64,
    ) -> Result<Vec<Key>, DbReaderError> {
        if start_ns > end_ns {
            return Ok(Vec::new());
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|(ts, _)| *ts >= start_ns && *ts <= end_ns)
            .map(|(_, k)| k.clone())
            .collect())
    }
}
