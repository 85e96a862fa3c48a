//! # transitlog-types: Core types for `transitlog`
//!
//! This crate contains shared types used across the `transitlog` system:
//! - Log positions ([`Offset`], [`PartitionId`]) and record time ([`time_millis`])
//! - Names and identifiers ([`TopicName`], [`StationId`])
//! - Line membership ([`Line`]) and train state ([`Direction`], [`TrainStatus`])
//! - Wire records ([`RawStationRecord`], [`DerivedStationRecord`],
//!   [`ArrivalKey`], [`ArrivalValue`])

use std::{
    fmt::{Debug, Display},
    ops::{Add, AddAssign},
    str::FromStr,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

/// Returns the current wall-clock time in epoch milliseconds.
///
/// A clock set before 1970 reads as 0.
pub fn time_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

// ============================================================================
// Log Positions - All Copy (cheap fixed-size values)
// ============================================================================

/// Position of a record within a topic partition.
///
/// Offsets are zero-indexed and sequential. The first record in a partition
/// has offset 0, the second has offset 1, and so on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Offset(u64);

impl Offset {
    pub const ZERO: Offset = Offset(0);

    pub fn new(offset: u64) -> Self {
        Self(offset)
    }

    /// Returns the offset as a `u64`.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the offset as a `usize` for indexing.
    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }

    /// Returns the offset immediately after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Offset {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Offset {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl From<u64> for Offset {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Offset> for u64 {
    fn from(offset: Offset) -> Self {
        offset.0
    }
}

/// Index of a partition within a topic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct PartitionId(u32);

impl PartitionId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl Display for PartitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PartitionId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<PartitionId> for u32 {
    fn from(id: PartitionId) -> Self {
        id.0
    }
}

// ============================================================================
// Names and Identifiers
// ============================================================================

/// Name of a topic on the log.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TopicName(String);

impl TopicName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TopicName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TopicName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&str> for TopicName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<TopicName> for String {
    fn from(value: TopicName) -> Self {
        value.0
    }
}

impl AsRef<str> for TopicName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of a station, unique across the network.
///
/// Serializes as a bare integer so it can sit directly in wire records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(i64);

impl StationId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for StationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for StationId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<StationId> for i64 {
    fn from(id: StationId) -> Self {
        id.0
    }
}

// ============================================================================
// Line Membership
// ============================================================================

/// The rail line a station belongs to.
///
/// `Unknown` is produced only by [`Line::from_flags`] when a raw record has no
/// membership flag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Line {
    Red,
    Blue,
    Green,
    Unknown,
}

impl Line {
    /// Derives the line from the three membership flags of a raw record.
    ///
    /// First match wins in the order red, blue, green. A record with several
    /// flags set resolves to the highest-priority one; a record with none set
    /// resolves to [`Line::Unknown`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use transitlog_types::Line;
    /// assert_eq!(Line::from_flags(true, false, false), Line::Red);
    /// assert_eq!(Line::from_flags(false, true, true), Line::Blue);
    /// assert_eq!(Line::from_flags(false, false, false), Line::Unknown);
    /// ```
    pub fn from_flags(red: bool, blue: bool, green: bool) -> Self {
        if red {
            Line::Red
        } else if blue {
            Line::Blue
        } else if green {
            Line::Green
        } else {
            Line::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Line::Red => "red",
            Line::Blue => "blue",
            Line::Green => "green",
            Line::Unknown => "unknown",
        }
    }
}

impl Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Line {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(Line::Red),
            "blue" => Ok(Line::Blue),
            "green" => Ok(Line::Green),
            "unknown" => Ok(Line::Unknown),
            _ => Err(ParseError::Line(s.to_string())),
        }
    }
}

/// Travel direction along a line. Every station has an `a` and a `b` side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    A,
    B,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::A => "a",
            Direction::B => "b",
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "a" | "A" => Ok(Direction::A),
            "b" | "B" => Ok(Direction::B),
            _ => Err(ParseError::Direction(s.to_string())),
        }
    }
}

/// Operational status of a train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrainStatus {
    OutOfService,
    #[default]
    InService,
    BrokenDown,
}

impl TrainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainStatus::OutOfService => "out_of_service",
            TrainStatus::InService => "in_service",
            TrainStatus::BrokenDown => "broken_down",
        }
    }
}

impl Display for TrainStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors parsing textual forms of the enums above.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown line color: {0:?}")]
    Line(String),

    #[error("unknown direction: {0:?}")]
    Direction(String),
}

// ============================================================================
// Wire Records
// ============================================================================

/// A station row as emitted by the change-data-capture connector on the raw
/// stations topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStationRecord {
    pub stop_id: i64,
    pub direction_id: String,
    pub stop_name: String,
    pub station_name: String,
    pub station_descriptive_name: String,
    pub station_id: StationId,
    pub order: i64,
    pub red: bool,
    pub blue: bool,
    pub green: bool,
}

impl RawStationRecord {
    /// Returns the line this record belongs to. See [`Line::from_flags`].
    pub fn line(&self) -> Line {
        Line::from_flags(self.red, self.blue, self.green)
    }

    /// Returns how many membership flags are set. Well-formed rows have one.
    pub fn flag_count(&self) -> usize {
        [self.red, self.blue, self.green]
            .into_iter()
            .filter(|f| *f)
            .count()
    }
}

/// The compact station row kept in the stations table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedStationRecord {
    pub station_id: StationId,
    pub station_name: String,
    pub order: i64,
    pub line: Line,
}

impl DerivedStationRecord {
    pub fn from_raw(raw: &RawStationRecord) -> Self {
        Self {
            station_id: raw.station_id,
            station_name: raw.station_name.clone(),
            order: raw.order,
            line: raw.line(),
        }
    }
}

impl From<&RawStationRecord> for DerivedStationRecord {
    fn from(raw: &RawStationRecord) -> Self {
        Self::from_raw(raw)
    }
}

/// Key of an arrival event: the wall-clock time it was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrivalKey {
    /// Epoch milliseconds.
    pub timestamp: i64,
}

/// Value of an arrival event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrivalValue {
    pub station_id: StationId,
    pub train_id: String,
    pub direction: Direction,
    pub line: Line,
    pub train_status: TrainStatus,
    pub prev_station_id: Option<StationId>,
    pub prev_direction: Option<Direction>,
}

#[cfg(test)]
mod tests;
