//! # transitlog-stream: Changelog-backed tables and the station transformer
//!
//! [`StationTransformer`] reads raw station rows from the CDC topic, derives
//! one [`DerivedStationRecord`](transitlog_types::DerivedStationRecord) per
//! row and upserts it into a [`ChangelogTable`] keyed by station id.
//!
//! The table is only a cache of its changelog topic. Every upsert is appended
//! to the changelog before the in-memory map changes, so replaying the
//! changelog from offset zero always rebuilds the table as it was after the
//! last successful upsert:
//!
//! ```text
//! raw topic ──poll──> derive ──append──> changelog ──apply──> BTreeMap
//!                                            │
//!                          recover() ────────┘ (replay from 0)
//! ```
//!
//! After each batch the transformer commits the next source offset of every
//! partition to an [`OffsetStore`], itself a changelog table. A restarted
//! transformer resumes from those offsets and falls back to its
//! [`OffsetReset`] only for partitions that were never committed.
//! Consumption is at-least-once: rows of a batch cut short by a crash are
//! processed again, which is harmless because upserts are idempotent.

mod consumer;
mod error;
mod offsets;
mod table;
mod transformer;

#[cfg(test)]
mod tests;

pub use consumer::{OffsetReset, StreamConsumer};
pub use error::StreamError;
pub use offsets::{OffsetStore, SourcePartition};
pub use table::ChangelogTable;
pub use transformer::{
    DEFAULT_CHANGELOG_TOPIC, DEFAULT_OFFSETS_TOPIC, DEFAULT_SOURCE_TOPIC, StationTransformer,
    StopSignal, TransformerConfig, TransformerStats,
};
