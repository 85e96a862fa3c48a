//! Keyed table backed by a changelog topic.

use std::collections::BTreeMap;
use std::collections::btree_map;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use transitlog_log::{LogBroker, LogRecord, TopicSpec};
use transitlog_types::{Offset, PartitionId, TopicName, time_millis};

use crate::StreamError;

const CHANGELOG_PARTITION: PartitionId = PartitionId::new(0);

// Records read per broker call during recovery.
const RECOVERY_BATCH: usize = 1024;

/// Creates a single-partition changelog topic unless it already exists.
pub(crate) fn ensure_changelog<B: LogBroker>(
    broker: &B,
    topic: &TopicName,
) -> Result<(), StreamError> {
    match broker.create_topic(&TopicSpec::new(topic.clone(), 1, 1)) {
        Ok(()) => {
            tracing::info!(%topic, "created changelog topic");
            Ok(())
        }
        Err(e) if e.is_already_exists() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// A last-write-wins table whose durable state is its changelog topic.
///
/// Keys and values are stored on the changelog as JSON, so a station id key
/// appears as its decimal string.
///
/// # Invariants
///
/// - The changelog has exactly one partition
/// - An entry is visible only after its changelog append succeeded
/// - Replaying the changelog from offset zero yields the current entries
#[derive(Debug)]
pub struct ChangelogTable<K, V, B: LogBroker> {
    broker: B,
    changelog: TopicName,
    entries: BTreeMap<K, V>,
}

impl<K, V, B> ChangelogTable<K, V, B>
where
    K: Ord + Clone + Serialize + DeserializeOwned,
    V: Clone + Serialize + DeserializeOwned,
    B: LogBroker,
{
    /// Opens an empty table over an existing changelog topic.
    ///
    /// Call [`ChangelogTable::recover`] to load the changelog's contents.
    pub fn open(broker: B, changelog: TopicName) -> Result<Self, StreamError> {
        let spec = broker.describe_topic(&changelog)?;
        if spec.partitions != 1 {
            return Err(StreamError::InvalidChangelog {
                topic: changelog,
                partitions: spec.partitions,
            });
        }

        Ok(Self {
            broker,
            changelog,
            entries: BTreeMap::new(),
        })
    }

    /// Rebuilds the entries by replaying the whole changelog.
    ///
    /// Returns the number of changelog records applied.
    pub fn recover(&mut self) -> Result<usize, StreamError> {
        self.entries.clear();
        let mut offset = Offset::ZERO;
        let mut applied = 0;

        loop {
            let records =
                self.broker
                    .read(&self.changelog, CHANGELOG_PARTITION, offset, RECOVERY_BATCH)?;
            let Some(last) = records.last() else {
                break;
            };
            offset = last.offset.next();

            for record in &records {
                let (key, value) = self.decode(record)?;
                self.entries.insert(key, value);
                applied += 1;
            }
        }

        tracing::info!(
            changelog = %self.changelog,
            applied,
            entries = self.entries.len(),
            "table recovered"
        );
        Ok(applied)
    }

    /// Inserts or overwrites `key`, stamped with the current time.
    pub fn upsert(&mut self, key: K, value: V) -> Result<Offset, StreamError> {
        self.upsert_at(key, value, time_millis())
    }

    /// Inserts or overwrites `key`.
    ///
    /// The change is appended to the changelog first; the entry only changes
    /// once the append succeeded. Returns the changelog offset.
    pub fn upsert_at(&mut self, key: K, value: V, timestamp_ms: i64) -> Result<Offset, StreamError> {
        let key_bytes = serde_json::to_vec(&key).map_err(StreamError::Encode)?;
        let value_bytes = serde_json::to_vec(&value).map_err(StreamError::Encode)?;

        let metadata = self.broker.append(
            &self.changelog,
            Some(CHANGELOG_PARTITION),
            Some(Bytes::from(key_bytes)),
            Bytes::from(value_bytes),
            timestamp_ms,
        )?;

        self.entries.insert(key, value);
        Ok(metadata.offset)
    }

    fn decode(&self, record: &LogRecord) -> Result<(K, V), StreamError> {
        let decode_err = |source| StreamError::Decode {
            topic: record.topic.clone(),
            partition: record.partition,
            offset: record.offset,
            source,
        };
        let key_bytes = record.key.as_ref().ok_or_else(|| StreamError::MissingKey {
            topic: record.topic.clone(),
            offset: record.offset,
        })?;

        let key = serde_json::from_slice(key_bytes).map_err(decode_err)?;
        let value = serde_json::from_slice(&record.value).map_err(decode_err)?;
        Ok((key, value))
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, K, V> {
        self.entries.iter()
    }

    /// Returns a copy of every entry.
    pub fn snapshot(&self) -> BTreeMap<K, V> {
        self.entries.clone()
    }

    pub fn changelog(&self) -> &TopicName {
        &self.changelog
    }
}
