use std::sync::Mutex;
use std::time::Duration;

use sr_bus::{BusPoll, BusRecord, BusSource};

/// A fixed, pre-scripted sequence of bus records, served one `next()` call
/// at a time. Completes once every scripted record has been delivered.
pub struct FakeBusSource {
    topic: String,
    remaining: Mutex<Vec<BusRecord>>,
}

impl FakeBusSource {
    pub fn new(topic: impl Into<String>, records: Vec<BusRecord>) -> Self {
        let mut records = records;
        records.reverse(); // pop() delivers in original order
        Self {
            topic: topic.into(),
            remaining: Mutex::new(records),
        }
    }
}

impl BusSource for FakeBusSource {
    fn is_complete(&self) -> bool {
        self.remaining.lock().unwrap().is_empty()
    }

    fn next(&self, _timeout: Duration) -> BusPoll {
        match self.remaining.lock().unwrap().pop() {
            Some(record) => BusPoll::Record(record),
            None => BusPoll::Timeout,
        }
    }

    fn commit(&self) {
        // Advisory only (§4.5); the fake has no position beyond its offsets,
        // so the last record handed out stands in for "current position".
    }

    fn topic(&self) -> &str {
        &self.topic
    }
}
