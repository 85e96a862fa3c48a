//! transitlog command line.
//!
//! # Quick Start
//!
//! ```bash
//! # Run the stations stream transformer until Ctrl-C
//! transitlog transform
//!
//! # Print the derived stations table
//! transitlog table
//!
//! # Emit one arrival from a station
//! transitlog arrive 40380 Austin --line red --train T1 --prev-station 40390 --prev-direction b
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use transitlog::{Direction, Line};

/// transitlog - rail transit events on a durable partitioned log.
#[derive(Parser)]
#[command(name = "transitlog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Read configuration from this file instead of transitlog.toml.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the log data directory.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Run the stations stream transformer until SIGINT or SIGTERM.
    Transform {
        /// Process what is currently on the raw topic, then exit.
        #[arg(long)]
        once: bool,
    },

    /// Replay the stations changelog and print the table.
    Table {
        /// Print one JSON object per line.
        #[arg(long)]
        json: bool,
    },

    /// Publish a single train arrival from a station.
    Arrive {
        /// Station id.
        station_id: i64,

        /// Station name, as shown on the line map.
        name: String,

        /// Line color (red, blue, green).
        #[arg(short, long, default_value = "red", value_parser = service_line)]
        line: Line,

        /// Direction the train arrived in (a or b).
        #[arg(short, long, default_value = "a")]
        direction: Direction,

        /// Train id.
        #[arg(short, long)]
        train: String,

        /// Station the train came from.
        #[arg(long)]
        prev_station: Option<i64>,

        /// Direction the train had at the previous station.
        #[arg(long)]
        prev_direction: Option<Direction>,
    },
}

/// Parses a line a station can serve. `unknown` only marks unflagged rows.
fn service_line(s: &str) -> std::result::Result<Line, String> {
    match s.parse::<Line>() {
        Ok(Line::Unknown) => Err("expected one of red, blue, green".to_string()),
        Ok(line) => Ok(line),
        Err(e) => Err(e.to_string()),
    }
}

fn main() -> Result<()> {
    // Initialize logging; stdout carries command output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let Cli {
        config,
        data_dir,
        command,
    } = Cli::parse();
    let load = || commands::load_config(config.as_deref(), data_dir.as_deref());

    match command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Transform { once } => commands::transform::run(&load()?, once),
        Commands::Table { json } => commands::table::run(&load()?, json),
        Commands::Arrive {
            station_id,
            name,
            line,
            direction,
            train,
            prev_station,
            prev_direction,
        } => commands::arrive::run(
            &load()?,
            &commands::arrive::Arrival {
                station_id,
                name,
                line,
                direction,
                train,
                prev_station,
                prev_direction,
            },
        ),
    }
}
