//! Transform command - runs the stations stream transformer.

use anyhow::{Context, Result};
use signal_hook::consts::{SIGINT, SIGTERM};
use transitlog::{Runtime, StopSignal};
use transitlog_config::TransitConfig;
use tracing::info;

pub fn run(config: &TransitConfig, once: bool) -> Result<()> {
    let runtime = Runtime::open(config.clone()).context("Failed to open log")?;

    if runtime.ensure_source_topic()? {
        info!(topic = %config.topics.raw_stations, "source topic was missing and has been created");
    }
    let mut transformer = runtime
        .open_transformer()
        .context("Failed to start stream transformer")?;

    println!("Stations stream transformer");
    println!();
    println!("  Broker:         {}", config.broker.bootstrap_servers);
    println!("  Data directory: {}", config.storage.data_dir.display());
    println!("  Source:         {}", config.topics.raw_stations);
    println!("  Table:          {}", config.topics.stations_table);
    println!("  Offsets:        {}", config.topics.stations_offsets);
    println!("  Recovered rows: {}", transformer.table().len());
    println!();

    if once {
        // Drain what is on the source topic now
        while transformer.run_once()? > 0 {}
    } else {
        let stop = StopSignal::new();
        signal_hook::flag::register(SIGINT, stop.flag())
            .context("Failed to register SIGINT handler")?;
        signal_hook::flag::register(SIGTERM, stop.flag())
            .context("Failed to register SIGTERM handler")?;

        println!("Running. Press Ctrl+C to stop.");
        transformer.run(&stop)?;
    }

    let stats = transformer.stats();
    println!("Processed: {}", stats.processed);
    println!("Skipped:   {}", stats.skipped);
    println!("No line:   {}", stats.unknown_line);
    println!("Rows:      {}", transformer.table().len());

    Ok(())
}
