//! Table command - prints the derived stations table.

use anyhow::{Context, Result};
use transitlog::Runtime;
use transitlog_config::TransitConfig;

pub fn run(config: &TransitConfig, json: bool) -> Result<()> {
    let runtime = Runtime::open(config.clone()).context("Failed to open log")?;

    let Some(table) = runtime.open_table().context("Failed to read stations table")? else {
        if !json {
            println!(
                "No stations table yet. Run 'transitlog transform' to build {}.",
                config.topics.stations_table
            );
        }
        return Ok(());
    };

    if json {
        for (_, row) in table.iter() {
            println!("{}", serde_json::to_string(row)?);
        }
        return Ok(());
    }

    println!("{:>10}  {:<32} {:>6}  {:<8}", "STATION", "NAME", "ORDER", "LINE");
    for (id, row) in table.iter() {
        println!(
            "{:>10}  {:<32} {:>6}  {:<8}",
            id.as_i64(),
            row.station_name,
            row.order,
            row.line.as_str()
        );
    }
    println!();
    println!("{} stations", table.len());

    Ok(())
}
