//! File-backed broker: one append-only file per topic partition.
//!
//! Partition files are scanned on open to find the next offset. A record cut
//! short by a crash at the end of a file is dropped and the file truncated to
//! the last complete record; corruption anywhere else is an error.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use transitlog_types::{Offset, PartitionId, TopicName};

use crate::{
    AdminError, LogBroker, LogError, LogRecord, Partitioner, Record, RecordMetadata, TopicSpec,
    resolve_partition,
};

/// Manifest filename for topic metadata.
const MANIFEST_FILENAME: &str = "topics.json";

/// Formats a partition filename from its index.
fn partition_filename(partition: PartitionId) -> String {
    format!("partition-{:04}.log", partition.as_u32())
}

/// Append target of a partition file.
pub(crate) trait FrameSink: Write {
    fn size(&self) -> io::Result<u64>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl FrameSink for File {
    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Writes one encoded record. If the write or sync fails the sink is cut back
/// to its previous length, so a failed append leaves no partial frame behind.
pub(crate) fn write_frame<S: FrameSink>(
    sink: &mut S,
    frame: &[u8],
    fsync: bool,
) -> io::Result<()> {
    let len = sink.size()?;
    let written = sink
        .write_all(frame)
        .and_then(|()| if fsync { sink.sync() } else { Ok(()) });

    if let Err(e) = written {
        if let Err(rollback) = sink.truncate(len) {
            tracing::warn!(error = %rollback, len, "failed to roll back partial record");
        }
        return Err(e);
    }
    Ok(())
}

#[derive(Debug)]
struct PartitionLog {
    path: PathBuf,
    next_offset: Offset,
}

#[derive(Debug)]
struct FileTopic {
    spec: TopicSpec,
    partitions: Vec<PartitionLog>,
}

#[derive(Debug, Default)]
struct FileState {
    topics: BTreeMap<TopicName, FileTopic>,
}

impl FileState {
    fn topic(&self, topic: &TopicName) -> Result<&FileTopic, LogError> {
        self.topics
            .get(topic)
            .ok_or_else(|| LogError::TopicNotFound(topic.clone()))
    }

    fn partition(&self, topic: &TopicName, partition: PartitionId) -> Result<&PartitionLog, LogError> {
        let t = self.topic(topic)?;
        t.partitions
            .get(partition.as_u32() as usize)
            .ok_or_else(|| LogError::PartitionOutOfRange {
                topic: topic.clone(),
                partition,
                partitions: t.spec.partitions,
            })
    }

    fn save_manifest(&self, data_dir: &Path) -> Result<(), LogError> {
        let specs: Vec<&TopicSpec> = self.topics.values().map(|t| &t.spec).collect();
        let json = serde_json::to_string_pretty(&specs).map_err(std::io::Error::other)?;
        let tmp = data_dir.join(format!("{MANIFEST_FILENAME}.tmp"));
        fs::write(&tmp, json)?;
        fs::rename(tmp, data_dir.join(MANIFEST_FILENAME))?;
        Ok(())
    }
}

/// Broker persisting every partition to its own file under a data directory.
///
/// Handles are cheap to clone; clones share one lock, so appends from
/// different handles are serialized. Only one process should open a data
/// directory at a time.
#[derive(Debug, Clone)]
pub struct FileBroker {
    data_dir: Arc<PathBuf>,
    fsync: bool,
    state: Arc<Mutex<FileState>>,
    partitioner: Partitioner,
}

impl FileBroker {
    /// Opens (or creates) a broker rooted at `data_dir`, syncing every append.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, LogError> {
        Self::open_with_fsync(data_dir, true)
    }

    /// Opens a broker, choosing whether appends are followed by `fsync`.
    pub fn open_with_fsync(data_dir: impl Into<PathBuf>, fsync: bool) -> Result<Self, LogError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;

        let mut state = FileState::default();
        let manifest = data_dir.join(MANIFEST_FILENAME);
        if manifest.exists() {
            let json = fs::read_to_string(&manifest)?;
            let specs: Vec<TopicSpec> =
                serde_json::from_str(&json).map_err(|e| LogError::Manifest(e.to_string()))?;

            for spec in specs {
                let topic = recover_topic(&data_dir, spec)?;
                state.topics.insert(topic.spec.name.clone(), topic);
            }
        }

        tracing::info!(
            data_dir = %data_dir.display(),
            topics = state.topics.len(),
            "file broker opened"
        );

        Ok(Self {
            data_dir: Arc::new(data_dir),
            fsync,
            state: Arc::new(Mutex::new(state)),
            partitioner: Partitioner::new(),
        })
    }

    /// Returns the root data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// Rebuilds a topic's in-memory state by scanning its partition files.
fn recover_topic(data_dir: &Path, spec: TopicSpec) -> Result<FileTopic, LogError> {
    let topic_dir = data_dir.join(spec.name.as_str());
    fs::create_dir_all(&topic_dir)?;

    let mut partitions = Vec::with_capacity(spec.partitions as usize);
    for p in 0..spec.partitions {
        let partition = PartitionId::new(p);
        let path = topic_dir.join(partition_filename(partition));
        let next_offset = scan_partition(&spec.name, partition, &path)?;
        partitions.push(PartitionLog { path, next_offset });
    }

    Ok(FileTopic { spec, partitions })
}

/// Validates a partition file and returns its next offset.
fn scan_partition(topic: &TopicName, partition: PartitionId, path: &Path) -> Result<Offset, LogError> {
    if !path.exists() {
        return Ok(Offset::ZERO);
    }

    let data: Bytes = fs::read(path)?.into();
    let mut pos = 0;
    let mut expected = Offset::ZERO;

    while pos < data.len() {
        match Record::from_bytes(&data.slice(pos..)) {
            Ok((record, consumed)) => {
                if record.offset() != expected {
                    return Err(LogError::OffsetMismatch {
                        topic: topic.clone(),
                        partition,
                        expected,
                        found: record.offset(),
                    });
                }
                pos += consumed;
                expected = expected.next();
            }
            Err(LogError::UnexpectedEof) => {
                tracing::warn!(
                    %topic,
                    %partition,
                    valid_bytes = pos,
                    dropped_bytes = data.len() - pos,
                    "truncating incomplete record at end of partition"
                );
                let file = OpenOptions::new().write(true).open(path)?;
                file.set_len(pos as u64)?;
                file.sync_all()?;
                break;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(expected)
}

impl LogBroker for FileBroker {
    fn create_topic(&self, spec: &TopicSpec) -> Result<(), AdminError> {
        spec.validate()?;

        let mut state = self.state.lock().map_err(|_| LogError::poisoned())?;
        if state.topics.contains_key(&spec.name) {
            return Err(AdminError::TopicAlreadyExists(spec.name.clone()));
        }

        let topic_dir = self.data_dir.join(spec.name.as_str());
        fs::create_dir_all(&topic_dir)?;

        let partitions = (0..spec.partitions)
            .map(|p| PartitionLog {
                path: topic_dir.join(partition_filename(PartitionId::new(p))),
                next_offset: Offset::ZERO,
            })
            .collect();

        state.topics.insert(
            spec.name.clone(),
            FileTopic {
                spec: spec.clone(),
                partitions,
            },
        );
        state.save_manifest(&self.data_dir)?;

        tracing::debug!(topic = %spec.name, partitions = spec.partitions, "file topic created");
        Ok(())
    }

    fn describe_topic(&self, topic: &TopicName) -> Result<TopicSpec, LogError> {
        let state = self.state.lock().map_err(|_| LogError::poisoned())?;
        Ok(state.topic(topic)?.spec.clone())
    }

    fn list_topics(&self) -> Result<Vec<TopicName>, LogError> {
        let state = self.state.lock().map_err(|_| LogError::poisoned())?;
        Ok(state.topics.keys().cloned().collect())
    }

    fn append(
        &self,
        topic: &TopicName,
        partition: Option<PartitionId>,
        key: Option<Bytes>,
        value: Bytes,
        timestamp_ms: i64,
    ) -> Result<RecordMetadata, LogError> {
        let mut state = self.state.lock().map_err(|_| LogError::poisoned())?;
        let t = state
            .topics
            .get_mut(topic)
            .ok_or_else(|| LogError::TopicNotFound(topic.clone()))?;
        let partition = resolve_partition(&t.spec, &self.partitioner, partition, key.as_deref())?;
        let log = &mut t.partitions[partition.as_u32() as usize];

        let offset = log.next_offset;
        let record = Record::new(offset, timestamp_ms, key, value);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log.path)?;
        write_frame(&mut file, &record.to_bytes(), self.fsync)?;

        log.next_offset = offset.next();

        Ok(RecordMetadata {
            topic: topic.clone(),
            partition,
            offset,
            timestamp_ms,
        })
    }

    fn read(
        &self,
        topic: &TopicName,
        partition: PartitionId,
        from: Offset,
        max_records: usize,
    ) -> Result<Vec<LogRecord>, LogError> {
        let state = self.state.lock().map_err(|_| LogError::poisoned())?;
        let log = state.partition(topic, partition)?;

        if from >= log.next_offset || max_records == 0 || !log.path.exists() {
            return Ok(Vec::new());
        }

        let data: Bytes = fs::read(&log.path)?.into();
        let mut records = Vec::new();
        let mut pos = 0;

        while pos < data.len() && records.len() < max_records {
            let (record, consumed) = Record::from_bytes(&data.slice(pos..))?;
            pos += consumed;

            if record.offset() < from {
                continue;
            }

            let (offset, timestamp_ms, key, value) = record.into_parts();
            records.push(LogRecord {
                topic: topic.clone(),
                partition,
                offset,
                timestamp_ms,
                key,
                value,
            });
        }

        Ok(records)
    }

    fn end_offset(&self, topic: &TopicName, partition: PartitionId) -> Result<Offset, LogError> {
        let state = self.state.lock().map_err(|_| LogError::poisoned())?;
        Ok(state.partition(topic, partition)?.next_offset)
    }
}
