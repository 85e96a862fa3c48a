//! Process bootstrap: one broker, one schema registry, settings from config.

use std::time::Duration;

use transitlog_config::{OffsetResetMode, PartitioningMode, TransitConfig};
use transitlog_log::{FileBroker, LogBroker, TopicSpec};
use transitlog_producer::ProducerConfig;
use transitlog_schema::MemorySchemaRegistry;
use transitlog_station::{ArrivalPartitioning, ArrivalSchemas, ArrivalTopicPolicy, StationContext};
use transitlog_stream::{ChangelogTable, OffsetReset, StationTransformer, TransformerConfig};
use transitlog_types::{DerivedStationRecord, StationId, TopicName};

use crate::Result;

/// The derived stations table as read back from its changelog.
pub type StationsTable<B> = ChangelogTable<StationId, DerivedStationRecord, B>;

/// Everything a transitlog process shares: the configuration, the broker and
/// the schema registry.
///
/// Components are built from a runtime rather than from raw configuration,
/// so every station and the transformer agree on topic names and layout.
#[derive(Debug)]
pub struct Runtime<B: LogBroker = FileBroker> {
    config: TransitConfig,
    broker: B,
    registry: MemorySchemaRegistry,
}

impl Runtime<FileBroker> {
    /// Opens the file-backed log under `storage.data_dir`.
    pub fn open(config: TransitConfig) -> Result<Self> {
        let broker =
            FileBroker::open_with_fsync(config.storage.data_dir.clone(), config.storage.fsync)?;
        tracing::info!(
            bootstrap_servers = %config.broker.bootstrap_servers,
            data_dir = %config.storage.data_dir.display(),
            "opened file broker"
        );
        Ok(Self::with_broker(config, broker))
    }
}

impl<B: LogBroker> Runtime<B> {
    pub fn with_broker(config: TransitConfig, broker: B) -> Self {
        let registry = MemorySchemaRegistry::new(config.schema_registry.url.clone());
        Self {
            config,
            broker,
            registry,
        }
    }

    pub fn config(&self) -> &TransitConfig {
        &self.config
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn registry(&self) -> &MemorySchemaRegistry {
        &self.registry
    }

    // ========================================================================
    // Settings
    // ========================================================================

    pub fn arrival_policy(&self) -> ArrivalTopicPolicy {
        let topics = &self.config.topics;
        let policy = match &topics.shared_arrivals {
            Some(topic) => ArrivalTopicPolicy::shared(topic.as_str()),
            None => ArrivalTopicPolicy::per_station(topics.arrival_prefix.clone()),
        };
        let partitioning = match topics.arrival_partitioning {
            PartitioningMode::Key => ArrivalPartitioning::ByKey,
            PartitioningMode::Station => ArrivalPartitioning::ByStation,
        };

        policy
            .with_partitions(topics.arrival_partitions)
            .with_replication_factor(topics.arrival_replication)
            .with_partitioning(partitioning)
    }

    pub fn producer_config(&self) -> ProducerConfig {
        ProducerConfig {
            batch_size: self.config.producer.batch_size,
        }
    }

    /// Time waited after creating a topic.
    pub fn provision_delay(&self) -> Duration {
        Duration::from_millis(self.config.topics.provision_delay_ms)
    }

    pub fn transformer_config(&self) -> TransformerConfig {
        let stream = &self.config.stream;
        TransformerConfig {
            source: TopicName::new(self.config.topics.raw_stations.as_str()),
            changelog: TopicName::new(self.config.topics.stations_table.as_str()),
            offsets: TopicName::new(self.config.topics.stations_offsets.as_str()),
            offset_reset: match stream.offset_reset {
                OffsetResetMode::Earliest => OffsetReset::Earliest,
                OffsetResetMode::Latest => OffsetReset::Latest,
            },
            poll_max_records: stream.poll_max_records,
            idle_backoff: Duration::from_millis(stream.idle_backoff_ms),
        }
    }

    // ========================================================================
    // Components
    // ========================================================================

    /// Registers the arrival schemas and builds the context stations are
    /// created from.
    pub fn station_context(&self) -> Result<StationContext<B>> {
        let schemas = ArrivalSchemas::register(&self.registry)?;
        Ok(StationContext::new(self.broker.clone(), schemas)
            .with_policy(self.arrival_policy())
            .with_producer_config(self.producer_config())
            .with_propagation_delay(self.provision_delay()))
    }

    /// Creates the raw stations topic if it does not exist yet.
    ///
    /// Returns true if this call created it.
    pub fn ensure_source_topic(&self) -> Result<bool> {
        let spec = TopicSpec::new(self.config.topics.raw_stations.as_str(), 1, 1);
        match self.broker.create_topic(&spec) {
            Ok(()) => {
                tracing::info!(topic = %spec.name, "created source topic");
                Ok(true)
            }
            Err(e) if e.is_already_exists() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn open_transformer(&self) -> Result<StationTransformer<B>> {
        Ok(StationTransformer::open(
            self.broker.clone(),
            self.transformer_config(),
        )?)
    }

    /// Replays the stations changelog. Returns `None` if the transformer has
    /// never run against this broker.
    pub fn open_table(&self) -> Result<Option<StationsTable<B>>> {
        let changelog = TopicName::new(self.config.topics.stations_table.as_str());
        if !self.broker.topic_exists(&changelog)? {
            return Ok(None);
        }

        let mut table = ChangelogTable::open(self.broker.clone(), changelog)?;
        table.recover()?;
        Ok(Some(table))
    }
}
