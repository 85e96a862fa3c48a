//! In-memory broker for tests and single-process runs.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use transitlog_types::{Offset, PartitionId, TopicName};

use crate::{
    AdminError, LogBroker, LogError, LogRecord, Partitioner, RecordMetadata, TopicSpec,
    resolve_partition,
};

#[derive(Debug)]
struct MemoryTopic {
    spec: TopicSpec,
    partitions: Vec<Vec<LogRecord>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    topics: BTreeMap<TopicName, MemoryTopic>,
    /// Topics whose appends are rejected.
    failing_appends: HashSet<TopicName>,
    /// Topics whose creation is rejected.
    failing_creates: HashSet<TopicName>,
    /// Number of `create_topic` calls received, successful or not.
    create_calls: u64,
}

/// In-memory broker.
///
/// Not suitable for production - data is lost when the last handle drops.
/// Faults can be injected per topic to exercise failure paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    state: Arc<RwLock<MemoryState>>,
    partitioner: Partitioner,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent append to `topic` fail with [`LogError::Rejected`].
    pub fn fail_appends_to(&self, topic: impl Into<TopicName>) {
        if let Ok(mut state) = self.state.write() {
            state.failing_appends.insert(topic.into());
        }
    }

    /// Makes every subsequent creation of `topic` fail with [`AdminError::Rejected`].
    pub fn fail_topic_creation(&self, topic: impl Into<TopicName>) {
        if let Ok(mut state) = self.state.write() {
            state.failing_creates.insert(topic.into());
        }
    }

    /// Clears all injected faults.
    pub fn clear_faults(&self) {
        if let Ok(mut state) = self.state.write() {
            state.failing_appends.clear();
            state.failing_creates.clear();
        }
    }

    /// Returns how many admin create calls this broker has received.
    pub fn create_topic_calls(&self) -> u64 {
        self.state.read().map_or(0, |state| state.create_calls)
    }

    /// Returns every record in a partition, in offset order.
    pub fn records(
        &self,
        topic: &TopicName,
        partition: PartitionId,
    ) -> Result<Vec<LogRecord>, LogError> {
        self.read(topic, partition, Offset::ZERO, usize::MAX)
    }

    /// Returns every record in a topic, partition by partition.
    pub fn all_records(&self, topic: &TopicName) -> Result<Vec<LogRecord>, LogError> {
        let state = self.state.read().map_err(|_| LogError::poisoned())?;
        let t = state
            .topics
            .get(topic)
            .ok_or_else(|| LogError::TopicNotFound(topic.clone()))?;
        Ok(t.partitions.iter().flatten().cloned().collect())
    }
}

impl LogBroker for MemoryBroker {
    fn create_topic(&self, spec: &TopicSpec) -> Result<(), AdminError> {
        let mut state = self.state.write().map_err(|_| LogError::poisoned())?;
        state.create_calls += 1;

        spec.validate()?;

        if state.failing_creates.contains(&spec.name) {
            return Err(AdminError::Rejected {
                topic: spec.name.clone(),
                reason: "injected fault".to_string(),
            });
        }
        if state.topics.contains_key(&spec.name) {
            return Err(AdminError::TopicAlreadyExists(spec.name.clone()));
        }

        state.topics.insert(
            spec.name.clone(),
            MemoryTopic {
                spec: spec.clone(),
                partitions: vec![Vec::new(); spec.partitions as usize],
            },
        );
        tracing::debug!(topic = %spec.name, partitions = spec.partitions, "memory topic created");
        Ok(())
    }

    fn describe_topic(&self, topic: &TopicName) -> Result<TopicSpec, LogError> {
        let state = self.state.read().map_err(|_| LogError::poisoned())?;
        state
            .topics
            .get(topic)
            .map(|t| t.spec.clone())
            .ok_or_else(|| LogError::TopicNotFound(topic.clone()))
    }

    fn list_topics(&self) -> Result<Vec<TopicName>, LogError> {
        let state = self.state.read().map_err(|_| LogError::poisoned())?;
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
        let mut state = self.state.write().map_err(|_| LogError::poisoned())?;

        if state.failing_appends.contains(topic) {
            return Err(LogError::Rejected {
                topic: topic.clone(),
                reason: "injected fault".to_string(),
            });
        }

        let t = state
            .topics
            .get_mut(topic)
            .ok_or_else(|| LogError::TopicNotFound(topic.clone()))?;
        let partition = resolve_partition(&t.spec, &self.partitioner, partition, key.as_deref())?;

        let log = &mut t.partitions[partition.as_u32() as usize];
        let offset = Offset::new(log.len() as u64);
        log.push(LogRecord {
            topic: topic.clone(),
            partition,
            offset,
            timestamp_ms,
            key,
            value,
        });

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
        let state = self.state.read().map_err(|_| LogError::poisoned())?;
        let t = state
            .topics
            .get(topic)
            .ok_or_else(|| LogError::TopicNotFound(topic.clone()))?;
        let log = t
            .partitions
            .get(partition.as_u32() as usize)
            .ok_or_else(|| LogError::PartitionOutOfRange {
                topic: topic.clone(),
                partition,
                partitions: t.spec.partitions,
            })?;

        Ok(log
            .iter()
            .skip(from.as_usize())
            .take(max_records)
            .cloned()
            .collect())
    }

    fn end_offset(&self, topic: &TopicName, partition: PartitionId) -> Result<Offset, LogError> {
        let state = self.state.read().map_err(|_| LogError::poisoned())?;
        let t = state
            .topics
            .get(topic)
            .ok_or_else(|| LogError::TopicNotFound(topic.clone()))?;
        t.partitions
            .get(partition.as_u32() as usize)
            .map(|log| Offset::new(log.len() as u64))
            .ok_or_else(|| LogError::PartitionOutOfRange {
                topic: topic.clone(),
                partition,
                partitions: t.spec.partitions,
            })
    }
}
