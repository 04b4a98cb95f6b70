//! Command-line interface for the wave simulation.

use clap::Parser;
use std::path::PathBuf;

/// Headless tower-defense wave simulation
#[derive(Parser, Debug)]
#[command(name = "rampart-sim")]
#[command(about = "Run a wave against the Rampart combat core and print a JSON summary")]
#[command(version)]
pub struct Args {
    /// Content catalog (RON)
    #[arg(long, value_name = "CATALOG", default_value = "content/catalog.ron")]
    pub catalog: PathBuf,

    /// Wave scenario (RON)
    #[arg(long, value_name = "WAVE", default_value = "content/wave.ron")]
    pub wave: PathBuf,

    /// Combat config (TOML); defaults are used if missing
    #[arg(long, value_name = "CONFIG", default_value = "content/rampart.toml")]
    pub config: PathBuf,

    /// Seed for the combat random source; random if omitted
    #[arg(long)]
    pub seed: Option<u64>,

    /// Pretty-print the summary
    #[arg(long)]
    pub pretty: bool,
}

/// Parse the process arguments.
pub fn parse_args() -> Args {
    Args::parse()
}
