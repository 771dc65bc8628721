// # LogStore collaborator
//
// The physical mutation log and its transport (a broker-backed topic stream
// in production) live outside this crate. This module defines the trait
// boundary this crate consumes, the record schema mutation log entries are
// serialized with, and an in-memory reference implementation used by this
// crate's own tests.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam::channel::{bounded, Receiver};
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SvmapError};
use crate::types::{InstanceId, Label, MutationId, Supervoxel, VersionId};

/// Tag identifying the payload shape of one log record. `Other` carries
/// forward-compatible tags this crate doesn't know about yet; replayers
/// skip them rather than erroring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    MappingOp,
    SplitOp,
    Other(String),
}

/// One mutation log record: an entry-type tag plus a serialized payload.
/// The payload schema is free to evolve so long as it round-trips; this
/// crate uses `bincode` over the `MappingOp`/`SplitOp` structs below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub entry_type: EntryType,
    pub payload: Vec<u8>,
}

/// `{mutation-id, mapped-label, originals}` — the record every mutation
/// operation in `mutate` logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingOp {
    pub mutation_id: MutationId,
    pub mapped: Label,
    pub originals: Vec<Supervoxel>,
}

/// `{mutation-id, target-label, new-label}` — logged by the arbitrary-split
/// path that `repair`'s fix flow replays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitOp {
    pub mutation_id: MutationId,
    pub target: Label,
    pub new_label: Label,
}

impl LogRecord {
    pub fn mapping_op(op: &MappingOp) -> Result<Self> {
        let payload = bincode::serde::encode_to_vec(op, bincode::config::standard())
            .map_err(|e| SvmapError::Serialization(e.to_string()))?;
        Ok(LogRecord {
            entry_type: EntryType::MappingOp,
            payload,
        })
    }

    pub fn split_op(op: &SplitOp) -> Result<Self> {
        let payload = bincode::serde::encode_to_vec(op, bincode::config::standard())
            .map_err(|e| SvmapError::Serialization(e.to_string()))?;
        Ok(LogRecord {
            entry_type: EntryType::SplitOp,
            payload,
        })
    }

    /// Decode this record's payload as a `MappingOp`. Callers check
    /// `entry_type` first; this returns `LogUnmarshal` on malformed bytes so
    /// the replayer can skip-and-continue rather than abort.
    pub fn decode_mapping_op(&self) -> Result<MappingOp> {
        bincode::serde::decode_from_slice(&self.payload, bincode::config::standard())
            .map(|(op, _)| op)
            .map_err(|e| SvmapError::LogUnmarshal(e.to_string()))
    }

    pub fn decode_split_op(&self) -> Result<SplitOp> {
        bincode::serde::decode_from_slice(&self.payload, bincode::config::standard())
            .map(|(op, _)| op)
            .map_err(|e| SvmapError::LogUnmarshal(e.to_string()))
    }
}

/// Durable mutation-log transport this crate consumes. A real deployment
/// backs this with a broker-backed topic stream; this crate depends only on
/// this trait.
pub trait LogStore: Send + Sync {
    /// Durably append one record to the log for `(instance, v)`.
    fn append(&self, instance: InstanceId, v: VersionId, record: LogRecord) -> Result<()>;

    /// Stream every record previously appended for `(instance, v)`, in
    /// append order, over a bounded channel that the caller drains. The
    /// channel closes once all records have been sent; its zero capacity
    /// (see `InMemoryLogStore`) is what gives replay its one-at-a-time
    /// barrier: the producer cannot get ahead of the consumer.
    fn stream(&self, instance: InstanceId, v: VersionId) -> Result<Receiver<LogRecord>>;

    /// Archival append for messages that could not be durably logged
    /// through the normal path (see `SvmapError::LogAppendFailed`).
    fn topic_append(&self, topic: &str, bytes: Vec<u8>) -> Result<()>;
}

/// Literal `failed-<topic>` prefix used for archival appends of messages
/// the primary log append failed to durably record.
pub fn failed_topic_name(topic: &str) -> String {
    format!("failed-{topic}")
}

/// Sanitize a topic name against `[^A-Za-z0-9._-]+`, collapsing runs of
/// disallowed characters to a single `-` (mirrors `storage/kafka.go`'s
/// activity-topic sanitization).
pub fn sanitize_topic(raw: &str) -> String {
    let re = Regex::new(r"[^A-Za-z0-9._-]+").expect("static regex is valid");
    re.replace_all(raw, "-").into_owned()
}

type InstanceKey = (InstanceId, VersionId);

/// In-memory `LogStore` used by this crate's own test suite. Not a
/// production backend: records and failed-message archives live only for
/// the process's lifetime.
#[derive(Default)]
pub struct InMemoryLogStore {
    logs: Mutex<HashMap<InstanceKey, Vec<LogRecord>>>,
    failed: Mutex<HashMap<String, Vec<Vec<u8>>>>,
}

impl InMemoryLogStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records archived via `topic_append`, for test assertions.
    pub fn failed_messages(&self, topic: &str) -> Vec<Vec<u8>> {
        self.failed
            .lock()
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }
}

impl LogStore for InMemoryLogStore {
    fn append(&self, instance: InstanceId, v: VersionId, record: LogRecord) -> Result<()> {
        self.logs.lock().entry((instance, v)).or_default().push(record);
        Ok(())
    }

    fn stream(&self, instance: InstanceId, v: VersionId) -> Result<Receiver<LogRecord>> {
        let records = self
            .logs
            .lock()
            .get(&(instance, v))
            .cloned()
            .unwrap_or_default();
        // Zero-capacity channel: the sender thread blocks on each send until
        // the consumer receives it, giving replay a per-message barrier so
        // the producer can never get ahead of the consumer.
        let (tx, rx) = bounded(0);
        std::thread::spawn(move || {
            for record in records {
                if tx.send(record).is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    fn topic_append(&self, topic: &str, bytes: Vec<u8>) -> Result<()> {
        self.failed
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_disallowed_runs() {
        assert_eq!(sanitize_topic("my topic!!name"), "my-topic-name");
        assert_eq!(sanitize_topic("clean-topic.v1"), "clean-topic.v1");
    }

    #[test]
    fn failed_topic_prefix_is_literal() {
        assert_eq!(failed_topic_name("mappings-abc"), "failed-mappings-abc");
    }

    #[test]
    fn mapping_op_round_trips() {
        let op = MappingOp {
            mutation_id: MutationId(7),
            mapped: Label(100),
            originals: vec![Supervoxel(1), Supervoxel(2)],
        };
        let record = LogRecord::mapping_op(&op).unwrap();
        let decoded = record.decode_mapping_op().unwrap();
        assert_eq!(decoded, op);
    }

    #[test]
    fn split_op_round_trips() {
        let op = SplitOp {
            mutation_id: MutationId(1),
            target: Label(10),
            new_label: Label(20),
        };
        let record = LogRecord::split_op(&op).unwrap();
        assert_eq!(record.decode_split_op().unwrap(), op);
    }

    #[test]
    fn append_then_stream_preserves_order() {
        let store = InMemoryLogStore::new();
        let instance = InstanceId(uuid::Uuid::nil());
        let v = VersionId(0);
        for i in 0..5 {
            let op = MappingOp {
                mutation_id: MutationId(i),
                mapped: Label(i),
                originals: vec![Supervoxel(i)],
            };
            store.append(instance, v, LogRecord::mapping_op(&op).unwrap()).unwrap();
        }
        let rx = store.stream(instance, v).unwrap();
        let received: Vec<_> = rx.iter().collect();
        assert_eq!(received.len(), 5);
        for (i, record) in received.iter().enumerate() {
            let op = record.decode_mapping_op().unwrap();
            assert_eq!(op.mutation_id, MutationId(i as u64));
        }
    }
}
