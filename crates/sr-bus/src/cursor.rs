use std::collections::HashMap;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use tracing::warn;

use crate::error::BusCursorError;

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
const WATERMARK_TIMEOUT: Duration = Duration::from_secs(10);
const OFFSETS_FOR_TIMES_TIMEOUT: Duration = Duration::from_secs(10);
const STOP_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// A decoded bus record together with its origin coordinates. The bus
/// timestamp is independent of the payload's own timestamp field and is
/// used only for partition seeking and stop-offset resolution, never for
/// equality.
#[derive(Debug, Clone)]
pub struct BusRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub bus_timestamp_ms: Option<i64>,
    pub value: Vec<u8>,
}

/// Result of one [`BusCursor::next`] call.
pub enum BusPoll {
    Record(BusRecord),
    /// No message arrived within the poll interval. Not an error — the
    /// caller should re-check [`BusCursor::is_complete`] and keep polling.
    Timeout,
}

/// The driver loop's view of a bus cursor, real or fake. Lets the run driver
/// (`sr-cli`) and its tests share one poll loop against either
/// [`BusCursor`] or `sr-testkit`'s in-memory fake.
pub trait BusSource {
    fn is_complete(&self) -> bool;
    fn next(&self, timeout: Duration) -> BusPoll;
    fn commit(&self);
    fn topic(&self) -> &str;
}

/// Delivers a finite, bounded sequence of records from a topic, given a
/// start timestamp. See the module docs for the windowing contract.
pub struct BusCursor {
    consumer: BaseConsumer,
    topic: String,
    stop_offsets: HashMap<i32, i64>,
    /// `None` when the topic had no resolvable stop timestamp (empty topic):
    /// the run completes immediately with all counters at zero.
    empty: bool,
}

impl BusCursor {
    /// Opens `topic`, seeks every partition to `start_ms`, and snapshots the
    /// topic's current end into per-partition stop offsets.
    pub fn open(broker: &str, topic: &str, start_ms: i64, group_id: &str) -> Result<Self, BusCursorError> {
        let consumer: BaseConsumer = ClientConfig::new()
            .set("bootstrap.servers", broker)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "true")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "45000")
            .set("max.poll.interval.ms", "300000")
            .set("fetch.message.max.bytes", "67108864")
            .set("queued.min.messages", "100000")
            .create()
            .map_err(BusCursorError::ClientError)?;

        let metadata = consumer
            .fetch_metadata(Some(topic), METADATA_TIMEOUT)
            .map_err(|e| BusCursorError::TopicUnavailable {
                topic: topic.to_string(),
                source: e,
            })?;

        let topic_meta = metadata
            .topics()
            .iter()
            .find(|t| t.name() == topic)
            .ok_or_else(|| BusCursorError::TopicUnavailable {
                topic: topic.to_string(),
                source: rdkafka::error::KafkaError::MetadataFetch(
                    rdkafka::error::RDKafkaErrorCode::UnknownTopic,
                ),
            })?;

        let partitions: Vec<i32> = topic_meta.partitions().iter().map(|p| p.id()).collect();

        let start_offsets = resolve_offsets_for_times(&consumer, topic, &partitions, start_ms)?;
        assign(&consumer, topic, &start_offsets)?;

        let stop_ms = topic_stop_time_ms(&consumer, topic, &partitions)?;
        let Some(stop_ms) = stop_ms else {
            return Ok(Self {
                consumer,
                topic: topic.to_string(),
                stop_offsets: HashMap::new(),
                empty: true,
            });
        };

        let stop_offsets = compute_stop_offsets(&consumer, topic, &partitions, stop_ms)?;

        // Re-seek to the originally resolved start offsets: probing the stop
        // timestamp above reassigned the consumer to single-partition probes.
        assign(&consumer, topic, &start_offsets)?;

        Ok(Self {
            consumer,
            topic: topic.to_string(),
            stop_offsets,
            empty: false,
        })
    }

    /// Topic had no resolvable stop timestamp: nothing to consume.
    pub fn is_empty_topic(&self) -> bool {
        self.empty
    }

    /// Declares completion when every assigned partition's current position
    /// is at or beyond its recorded stop offset. Partition-EOF alone never
    /// terminates the cursor — only position-vs-stop does.
    pub fn is_complete(&self) -> bool {
        if self.empty {
            return true;
        }
        let assignment = match self.consumer.assignment() {
            Ok(a) => a,
            Err(_) => return false,
        };
        if assignment.count() == 0 {
            return false;
        }
        let positions = match self.consumer.position() {
            Ok(p) => p,
            Err(_) => return false,
        };
        for elem in positions.elements() {
            let need = match self.stop_offsets.get(&elem.partition()) {
                Some(n) => *n,
                None => return false,
            };
            let have = match elem.offset() {
                Offset::Offset(o) => o,
                _ => -1,
            };
            if have < need {
                return false;
            }
        }
        true
    }

    /// Polls for one message, blocking up to `timeout`. Transient poll
    /// errors are logged and surfaced as [`BusPoll::Timeout`] — they never
    /// corrupt state.
    pub fn next(&self, timeout: Duration) -> BusPoll {
        match self.consumer.poll(timeout) {
            None => BusPoll::Timeout,
            Some(Ok(msg)) => BusPoll::Record(BusRecord {
                topic: msg.topic().to_string(),
                partition: msg.partition(),
                offset: msg.offset(),
                bus_timestamp_ms: msg.timestamp().to_millis(),
                value: msg.payload().map(|b| b.to_vec()).unwrap_or_default(),
            }),
            Some(Err(e)) => {
                warn!(error = %e, "transient kafka poll error, retrying");
                BusPoll::Timeout
            }
        }
    }

    /// Advisory commit of the current position. Failures are logged, never
    /// fatal — commit is side-effect-free w.r.t. correctness (§4.5).
    pub fn commit(&self) {
        if let Err(e) = self.consumer.commit_consumer_state(rdkafka::consumer::CommitMode::Async) {
            warn!(error = %e, "commit failed");
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl BusSource for BusCursor {
    fn is_complete(&self) -> bool {
        BusCursor::is_complete(self)
    }

    fn next(&self, timeout: Duration) -> BusPoll {
        BusCursor::next(self, timeout)
    }

    fn commit(&self) {
        BusCursor::commit(self)
    }

    fn topic(&self) -> &str {
        BusCursor::topic(self)
    }
}

fn assign(
    consumer: &BaseConsumer,
    topic: &str,
    offsets: &HashMap<i32, i64>,
) -> Result<(), BusCursorError> {
    let mut tpl = TopicPartitionList::new();
    for (&partition, &offset) in offsets {
        tpl.add_partition_offset(topic, partition, Offset::Offset(offset))
            .map_err(BusCursorError::ClientError)?;
    }
    consumer.assign(&tpl).map_err(BusCursorError::ClientError)
}

/// Resolve `start_ms` to a per-partition offset via the bus's
/// timestamp→offset facility; partitions with no offset at or after
/// `start_ms` fall back to that partition's earliest offset.
fn resolve_offsets_for_times(
    consumer: &BaseConsumer,
    topic: &str,
    partitions: &[i32],
    start_ms: i64,
) -> Result<HashMap<i32, i64>, BusCursorError> {
    let mut tpl = TopicPartitionList::new();
    for &p in partitions {
        tpl.add_partition_offset(topic, p, Offset::Offset(start_ms))
            .map_err(BusCursorError::ClientError)?;
    }
    let resolved = consumer
        .offsets_for_times(tpl, OFFSETS_FOR_TIMES_TIMEOUT)
        .map_err(BusCursorError::ClientError)?;

    let mut out = HashMap::new();
    for elem in resolved.elements() {
        let offset = match elem.offset() {
            Offset::Offset(o) if o >= 0 => o,
            _ => {
                let (low, _high) = consumer
                    .fetch_watermarks(topic, elem.partition(), WATERMARK_TIMEOUT)
                    .map_err(BusCursorError::ClientError)?;
                low
            }
        };
        out.insert(elem.partition(), offset);
    }
    Ok(out)
}

/// For each partition, read the timestamp of the message at
/// `high_watermark - 1`; the maximum across partitions is the topic's
/// current stop time. `None` if no partition has any message.
fn topic_stop_time_ms(
    consumer: &BaseConsumer,
    topic: &str,
    partitions: &[i32],
) -> Result<Option<i64>, BusCursorError> {
    let mut latest: Vec<i64> = Vec::new();
    for &p in partitions {
        if let Some(ts) = last_message_timestamp_ms(consumer, topic, p)? {
            latest.push(ts);
        }
    }
    Ok(latest.into_iter().max())
}

fn last_message_timestamp_ms(
    consumer: &BaseConsumer,
    topic: &str,
    partition: i32,
) -> Result<Option<i64>, BusCursorError> {
    let (low, high) = consumer
        .fetch_watermarks(topic, partition, WATERMARK_TIMEOUT)
        .map_err(BusCursorError::ClientError)?;
    if high <= low {
        return Ok(None);
    }

    let mut tpl = TopicPartitionList::new();
    tpl.add_partition_offset(topic, partition, Offset::Offset(high - 1))
        .map_err(BusCursorError::ClientError)?;
    consumer.assign(&tpl).map_err(BusCursorError::ClientError)?;

    match consumer.poll(STOP_PROBE_TIMEOUT) {
        Some(Ok(msg)) => Ok(msg.timestamp().to_millis()),
        _ => Ok(None),
    }
}

/// Resolve `stop_ms + 1` (exclusive upper bound) to a per-partition stop
/// offset; partitions with no such message use the current high-water mark.
fn compute_stop_offsets(
    consumer: &BaseConsumer,
    topic: &str,
    partitions: &[i32],
    stop_ms: i64,
) -> Result<HashMap<i32, i64>, BusCursorError> {
    let query_ts = stop_ms + 1;
    let mut tpl = TopicPartitionList::new();
    for &p in partitions {
        tpl.add_partition_offset(topic, p, Offset::Offset(query_ts))
            .map_err(BusCursorError::ClientError)?;
    }
    let resolved = consumer
        .offsets_for_times(tpl, OFFSETS_FOR_TIMES_TIMEOUT)
        .map_err(BusCursorError::ClientError)?;

    let mut out = HashMap::new();
    for elem in resolved.elements() {
        let offset = match elem.offset() {
            Offset::Offset(o) if o >= 0 => o,
            _ => {
                let (_low, high) = consumer
                    .fetch_watermarks(topic, elem.partition(), WATERMARK_TIMEOUT)
                    .map_err(BusCursorError::ClientError)?;
                high
            }
        };
        out.insert(elem.partition(), offset);
    }
    Ok(out)
}
