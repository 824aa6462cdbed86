//! sr-bus
//!
//! The bus cursor: opens a Kafka-compatible topic, resolves a start
//! timestamp to per-partition offsets, snapshots the topic's current
//! high-water marks into per-partition stop offsets, and yields decoded
//! records until every assigned partition has reached its stop offset.
//!
//! The topic may be actively receiving new records; the cursor reconciles a
//! *defined window*, never an open-ended tail.

mod cursor;
mod error;
mod start_time;

pub use cursor::{BusCursor, BusPoll, BusRecord, BusSource};
pub use error::BusCursorError;
pub use start_time::parse_start_time;
