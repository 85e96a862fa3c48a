//! Partition selection for appends without an explicit partition.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use transitlog_types::PartitionId;

/// Maps a key onto one of `partitions` partitions.
///
/// Uses the first eight bytes of the key's BLAKE3 hash so the mapping is
/// stable across processes and platforms.
///
/// # Examples
///
/// ```
/// # use transitlog_log::partition_for_key;
/// let p = partition_for_key(b"40380", 2);
/// assert_eq!(p, partition_for_key(b"40380", 2));
/// assert!(p.as_u32() < 2);
/// ```
pub fn partition_for_key(key: &[u8], partitions: u32) -> PartitionId {
    assert!(partitions > 0, "topic must have at least one partition");
    let hash = blake3::hash(key);
    let bytes: [u8; 8] = hash.as_bytes()[..8]
        .try_into()
        .expect("blake3 output is 32 bytes");
    PartitionId::new((u64::from_le_bytes(bytes) % u64::from(partitions)) as u32)
}

/// Chooses partitions for appends: key hash when keyed, round-robin otherwise.
///
/// Clones share the round-robin counter.
#[derive(Debug, Clone, Default)]
pub struct Partitioner {
    next: Arc<AtomicU32>,
}

impl Partitioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&self, key: Option<&[u8]>, partitions: u32) -> PartitionId {
        match key {
            Some(key) => partition_for_key(key, partitions),
            None => PartitionId::new(self.next.fetch_add(1, Ordering::Relaxed) % partitions),
        }
    }
}
