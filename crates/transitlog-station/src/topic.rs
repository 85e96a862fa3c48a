//! Arrival topic naming and partitioning policy.

use transitlog_log::{TopicSpec, partition_for_key};
use transitlog_types::{PartitionId, StationId, TopicName};

/// Prefix of per-station arrival topics.
pub const DEFAULT_ARRIVAL_PREFIX: &str = "org.chicago.cta.station.arrivals";

/// Normalizes a station name for use in a topic name.
///
/// `/` becomes `_and_` before anything else, then the name is lowercased,
/// spaces and hyphens become underscores and apostrophes are dropped.
///
/// ```
/// use transitlog_station::normalize_station_name;
///
/// assert_eq!(normalize_station_name("Washington/Wabash"), "washington_and_wabash");
/// assert_eq!(normalize_station_name("O'Hare"), "ohare");
/// ```
pub fn normalize_station_name(name: &str) -> String {
    name.replace('/', "_and_")
        .to_lowercase()
        .replace([' ', '-'], "_")
        .replace('\'', "")
}

/// Which topic a station publishes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicNaming {
    /// `{prefix}.{station_id}-{normalized_name}`, one topic per station.
    PerStation { prefix: String },
    /// Every station publishes to the same topic.
    Shared(TopicName),
}

/// How arrival events are spread over a topic's partitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArrivalPartitioning {
    /// Hash of the timestamp key. Arrivals of one station may be reordered
    /// across partitions.
    #[default]
    ByKey,
    /// Partition derived from the station id, so each station's arrivals
    /// keep their order.
    ByStation,
}

/// Topic layout for arrival events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrivalTopicPolicy {
    pub naming: TopicNaming,
    pub partitions: u32,
    pub replication_factor: u16,
    pub partitioning: ArrivalPartitioning,
}

impl Default for ArrivalTopicPolicy {
    fn default() -> Self {
        Self::per_station(DEFAULT_ARRIVAL_PREFIX)
    }
}

impl ArrivalTopicPolicy {
    /// One topic per station, 2 partitions, replication factor 1.
    pub fn per_station(prefix: impl Into<String>) -> Self {
        Self {
            naming: TopicNaming::PerStation {
                prefix: prefix.into(),
            },
            partitions: 2,
            replication_factor: 1,
            partitioning: ArrivalPartitioning::ByKey,
        }
    }

    /// One topic shared by every station.
    pub fn shared(topic: impl Into<TopicName>) -> Self {
        Self {
            naming: TopicNaming::Shared(topic.into()),
            ..Self::default()
        }
    }

    pub fn with_partitions(mut self, partitions: u32) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_replication_factor(mut self, replication_factor: u16) -> Self {
        self.replication_factor = replication_factor;
        self
    }

    pub fn with_partitioning(mut self, partitioning: ArrivalPartitioning) -> Self {
        self.partitioning = partitioning;
        self
    }

    pub fn topic_name(&self, station_id: StationId, station_name: &str) -> TopicName {
        match &self.naming {
            TopicNaming::PerStation { prefix } => TopicName::new(format!(
                "{prefix}.{station_id}-{}",
                normalize_station_name(station_name)
            )),
            TopicNaming::Shared(topic) => topic.clone(),
        }
    }

    pub fn topic_spec(&self, station_id: StationId, station_name: &str) -> TopicSpec {
        TopicSpec::new(
            self.topic_name(station_id, station_name),
            self.partitions,
            self.replication_factor,
        )
    }

    /// Returns the partition a station's arrivals are pinned to, if any.
    pub fn partition_for(&self, station_id: StationId) -> Option<PartitionId> {
        match self.partitioning {
            ArrivalPartitioning::ByKey => None,
            ArrivalPartitioning::ByStation => Some(partition_for_key(
                &station_id.as_i64().to_be_bytes(),
                self.partitions,
            )),
        }
    }
}
