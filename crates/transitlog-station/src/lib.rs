//! # transitlog-station: Simulated stations emitting arrival events
//!
//! A [`Station`] tracks the last train seen in each direction and publishes
//! an arrival event every time one arrives. Each station owns its producer
//! and, under the default [`ArrivalTopicPolicy`], its own topic:
//!
//! ```text
//! org.chicago.cta.station.arrivals.{station_id}-{normalized_name}
//! ```
//!
//! The topic is provisioned once when the station is built. Everything a
//! station needs from the process (broker, provisioning registry, registered
//! schemas, topic policy) comes from a [`StationContext`] created at
//! bootstrap.

mod error;
mod schemas;
mod station;
mod topic;

#[cfg(test)]
mod tests;

pub use error::StationError;
pub use schemas::{ARRIVAL_KEY_SCHEMA, ARRIVAL_VALUE_SCHEMA, ArrivalSchemas};
pub use station::{Station, StationCloseReport, StationContext, StationLink, Train};
pub use topic::{
    ArrivalPartitioning, ArrivalTopicPolicy, DEFAULT_ARRIVAL_PREFIX, TopicNaming,
    normalize_station_name,
};
