//! Raw station rows to the derived stations table.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use transitlog_log::{LogBroker, LogRecord};
use transitlog_types::{
    DerivedStationRecord, Line, Offset, PartitionId, RawStationRecord, StationId, TopicName,
};

use crate::{ChangelogTable, OffsetReset, OffsetStore, StreamConsumer, StreamError, table};

/// CDC topic carrying raw station rows.
pub const DEFAULT_SOURCE_TOPIC: &str = "org.chicago.cta.postgres.table.stations";

/// Changelog of the derived stations table.
pub const DEFAULT_CHANGELOG_TOPIC: &str = "org.chicago.cta.stations.table.v1";

/// Committed source offsets of the stations transformer.
pub const DEFAULT_OFFSETS_TOPIC: &str = "org.chicago.cta.stations.table.v1.offsets";

/// Cooperative stop flag shared between a running loop and its owner.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the loop to stop after its current iteration.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Returns the underlying flag, for signal handler registration.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stopped)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformerConfig {
    pub source: TopicName,
    pub changelog: TopicName,
    /// Where source positions are committed.
    pub offsets: TopicName,
    /// Start position of partitions with no committed offset.
    pub offset_reset: OffsetReset,
    pub poll_max_records: usize,
    /// Sleep after a poll that returned nothing.
    pub idle_backoff: Duration,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            source: TopicName::new(DEFAULT_SOURCE_TOPIC),
            changelog: TopicName::new(DEFAULT_CHANGELOG_TOPIC),
            offsets: TopicName::new(DEFAULT_OFFSETS_TOPIC),
            offset_reset: OffsetReset::Earliest,
            poll_max_records: 500,
            idle_backoff: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformerStats {
    /// Rows derived and written to the table.
    pub processed: u64,
    /// Rows skipped because they could not be decoded.
    pub skipped: u64,
    /// Rows with no line flag set, stored with [`Line::Unknown`].
    pub unknown_line: u64,
}

/// Single-writer stream processor maintaining the stations table.
#[derive(Debug)]
pub struct StationTransformer<B: LogBroker> {
    consumer: StreamConsumer<B>,
    table: ChangelogTable<StationId, DerivedStationRecord, B>,
    offsets: OffsetStore<B>,
    config: TransformerConfig,
    stats: TransformerStats,
}

impl<B: LogBroker> StationTransformer<B> {
    /// Creates the changelog and offsets topics if needed, recovers the
    /// table and subscribes to the source topic.
    ///
    /// Partitions with a committed offset resume from it; the others start
    /// where `offset_reset` says.
    pub fn open(broker: B, config: TransformerConfig) -> Result<Self, StreamError> {
        table::ensure_changelog(&broker, &config.changelog)?;
        let mut table = ChangelogTable::open(broker.clone(), config.changelog.clone())?;
        table.recover()?;

        let offsets = OffsetStore::open(broker.clone(), config.offsets.clone())?;
        let mut consumer =
            StreamConsumer::subscribe(broker, config.source.clone(), config.offset_reset)?;
        for p in 0..consumer.partitions() {
            let partition = PartitionId::new(p);
            if let Some(offset) = offsets.committed(&config.source, partition) {
                consumer.seek(partition, offset);
                tracing::debug!(
                    source = %config.source,
                    %partition,
                    %offset,
                    "resuming from committed offset"
                );
            }
        }

        Ok(Self {
            consumer,
            table,
            offsets,
            config,
            stats: TransformerStats::default(),
        })
    }

    /// Derives one raw row and upserts it. Returns the changelog offset.
    pub fn process(&mut self, record: &LogRecord) -> Result<Offset, StreamError> {
        let raw: RawStationRecord =
            serde_json::from_slice(&record.value).map_err(|source| StreamError::Decode {
                topic: record.topic.clone(),
                partition: record.partition,
                offset: record.offset,
                source,
            })?;

        let derived = DerivedStationRecord::from_raw(&raw);
        match derived.line {
            Line::Unknown => {
                self.stats.unknown_line += 1;
                tracing::warn!(
                    station_id = %raw.station_id,
                    stop_id = raw.stop_id,
                    "no line flag set, storing line as unknown"
                );
            }
            _ if raw.flag_count() > 1 => {
                tracing::debug!(
                    station_id = %raw.station_id,
                    line = %derived.line,
                    "several line flags set, resolved by priority"
                );
            }
            _ => {}
        }

        let offset = self
            .table
            .upsert_at(derived.station_id, derived, record.timestamp_ms)?;
        self.stats.processed += 1;
        Ok(offset)
    }

    /// Polls one batch, processes it and commits the new source positions.
    /// Returns the number of rows polled.
    ///
    /// Undecodable rows are logged and skipped. On any other failure the
    /// unprocessed part of the batch is rewound so the next call retries it,
    /// and nothing is committed.
    pub fn run_once(&mut self) -> Result<usize, StreamError> {
        let records = self.consumer.poll(self.config.poll_max_records)?;

        for (i, record) in records.iter().enumerate() {
            match self.process(record) {
                Ok(_) => {}
                Err(e) if e.is_malformed_record() => {
                    self.stats.skipped += 1;
                    tracing::warn!(error = %e, "skipping malformed station record");
                }
                Err(e) => {
                    self.consumer.rewind(&records[i..]);
                    return Err(e);
                }
            }
        }

        self.commit()?;
        Ok(records.len())
    }

    /// Commits the consumer's current position of every source partition.
    fn commit(&mut self) -> Result<(), StreamError> {
        for p in 0..self.consumer.partitions() {
            let partition = PartitionId::new(p);
            if let Some(next) = self.consumer.position(partition) {
                self.offsets.commit(&self.config.source, partition, next)?;
            }
        }
        Ok(())
    }

    /// Processes until `stop` is raised, checking it between batches.
    pub fn run(&mut self, stop: &StopSignal) -> Result<TransformerStats, StreamError> {
        tracing::info!(
            source = %self.config.source,
            changelog = %self.config.changelog,
            entries = self.table.len(),
            "stream transformer started"
        );

        while !stop.is_stopped() {
            if self.run_once()? == 0 && !self.config.idle_backoff.is_zero() {
                thread::sleep(self.config.idle_backoff);
            }
        }

        tracing::info!(
            processed = self.stats.processed,
            skipped = self.stats.skipped,
            "stream transformer stopped"
        );
        Ok(self.stats)
    }

    pub fn table(&self) -> &ChangelogTable<StationId, DerivedStationRecord, B> {
        &self.table
    }

    pub fn consumer(&self) -> &StreamConsumer<B> {
        &self.consumer
    }

    pub fn offsets(&self) -> &OffsetStore<B> {
        &self.offsets
    }

    pub fn stats(&self) -> TransformerStats {
        self.stats
    }
}
