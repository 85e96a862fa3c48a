//! # transitlog
//!
//! Rail transit events on a durable, partitioned, append-only log.
//!
//! Simulated stations publish schema-framed arrival events through buffered
//! producers, and a single-writer stream transformer turns raw station rows
//! into a changelog-backed stations table:
//!
//! ```text
//! ┌──────────┐  arrivals   ┌──────────────┐
//! │ Stations │ ──────────> │              │
//! └──────────┘             │              │   raw rows   ┌─────────────┐   upserts   ┌───────────┐
//!                          │  Log broker  │ ───────────> │ Transformer │ ──────────> │ Changelog │
//!  CDC source ───────────> │              │              └─────────────┘             └───────────┘
//!                          └──────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//! use transitlog::{
//!     ArrivalSchemas, Line, MemoryBroker, MemorySchemaRegistry, Station, StationContext,
//!     StationId, Train, TrainStatus,
//! };
//!
//! let broker = MemoryBroker::new();
//! let registry = MemorySchemaRegistry::new("http://localhost:8081");
//! let schemas = ArrivalSchemas::register(&registry)?;
//! let ctx = StationContext::new(broker.clone(), schemas)
//!     .with_propagation_delay(Duration::ZERO);
//!
//! let mut austin = Station::new(&ctx, StationId::new(40380), "Austin", Line::Red, None, None)?;
//! austin.arrive_a(Train::new("T1", TrainStatus::InService), None, None)?;
//!
//! let report = austin.close();
//! assert!(report.is_complete());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Modules
//!
//! - **Foundation**: identifiers and records, the log broker, schemas
//! - **Producers**: topic provisioning, buffered producers, stations
//! - **Streams**: consumers, changelog tables, the station transformer
//! - **Bootstrap**: [`Runtime`] wires all of the above from a [`TransitConfig`]

mod error;
mod runtime;


pub use error::{Result, RuntimeError};
pub use runtime::{Runtime, StationsTable};

// Re-export core types
pub use transitlog_types::{
    ArrivalKey, ArrivalValue, DerivedStationRecord, Direction, Line, Offset, ParseError,
    PartitionId, RawStationRecord, StationId, TopicName, TrainStatus,
};

// Re-export the log
pub use transitlog_log::{
    AdminError, FileBroker, LogBroker, LogError, LogRecord, MemoryBroker, Partitioner,
    RecordMetadata, TopicSpec, partition_for_key,
};

// Re-export schemas
pub use transitlog_schema::{
    MemorySchemaRegistry, Schema, SchemaError, SchemaHandle, SchemaId, SchemaRegistry,
    decode_record, encode_record,
};

// Re-export producers
pub use transitlog_producer::{
    DeliveryError, DeliveryHandle, EventProducer, Flush, FlushReport, ProducerConfig,
    ProducerError, ProducerStats, ProvisionError, ProvisionRegistry, Provisioned,
    TopicProvisioner,
};

// Re-export stations
pub use transitlog_station::{
    ArrivalPartitioning, ArrivalSchemas, ArrivalTopicPolicy, DEFAULT_ARRIVAL_PREFIX, Station,
    StationCloseReport, StationContext, StationError, StationLink, Train, normalize_station_name,
};

// Re-export streams
pub use transitlog_stream::{
    ChangelogTable, DEFAULT_CHANGELOG_TOPIC, DEFAULT_OFFSETS_TOPIC, DEFAULT_SOURCE_TOPIC,
    OffsetReset, OffsetStore, StationTransformer, StopSignal, StreamConsumer, StreamError,
    TransformerConfig, TransformerStats,
};

// Re-export configuration
pub use transitlog_config::TransitConfig;
