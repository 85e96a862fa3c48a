//! Version command implementation.

use transitlog::{DEFAULT_CHANGELOG_TOPIC, DEFAULT_SOURCE_TOPIC};

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run() {
    println!("transitlog {VERSION}");
    println!();
    println!("Rail transit events on a durable partitioned log.");
    println!();
    println!("Default topics:");
    println!("  Raw stations:   {DEFAULT_SOURCE_TOPIC}");
    println!("  Stations table: {DEFAULT_CHANGELOG_TOPIC}");
    println!("  Arrivals:       {}.<id>-<name>", transitlog::DEFAULT_ARRIVAL_PREFIX);
    println!();
    println!("Build target: {} ({})", std::env::consts::ARCH, std::env::consts::OS);
}
