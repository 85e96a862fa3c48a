//! Arrive command - publishes one train arrival from a station.

use anyhow::{Context, Result, bail};
use transitlog::{Direction, Line, Runtime, Station, StationId, Train, TrainStatus};
use transitlog_config::TransitConfig;

/// Arguments of a single arrival.
pub struct Arrival {
    pub station_id: i64,
    pub name: String,
    pub line: Line,
    pub direction: Direction,
    pub train: String,
    pub prev_station: Option<i64>,
    pub prev_direction: Option<Direction>,
}

pub fn run(config: &TransitConfig, arrival: &Arrival) -> Result<()> {
    let runtime = Runtime::open(config.clone()).context("Failed to open log")?;
    let ctx = runtime.station_context()?;

    let mut station = Station::new(
        &ctx,
        StationId::new(arrival.station_id),
        arrival.name.as_str(),
        arrival.line,
        None,
        None,
    )
    .with_context(|| format!("Failed to set up station {}", arrival.station_id))?;

    let train = Train::new(arrival.train.as_str(), TrainStatus::InService);
    let prev_station = arrival.prev_station.map(StationId::new);
    let handle = match arrival.direction {
        Direction::A => station.arrive_a(train, prev_station, arrival.prev_direction)?,
        Direction::B => station.arrive_b(train, prev_station, arrival.prev_direction)?,
    };

    let topic = station.topic().clone();
    let report = station.close();
    if !report.is_complete() {
        bail!("arrival was not delivered to {topic}");
    }

    let metadata = handle.wait()?;
    println!(
        "{} arrived at {} ({}), direction {}",
        arrival.train, arrival.name, arrival.station_id, arrival.direction
    );
    println!(
        "  Topic: {}  Partition: {}  Offset: {}",
        metadata.topic, metadata.partition, metadata.offset
    );

    Ok(())
}
