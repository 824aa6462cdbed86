//! sr-db
//!
//! The database range reader: a single operation, `query_range`, against a
//! ClickHouse-compatible warehouse. Inclusive on both ends; projects the
//! timestamp column to nanoseconds via `toUnixTimestamp64Nano`, matching the
//! wire detail the original validator used (spec.md itself is silent on the
//! projection expression).

mod error;
mod reader;

pub use error::DbReaderError;
pub use reader::{ClickHouseConfig, ClickHouseReader, DatabaseRangeReader};
