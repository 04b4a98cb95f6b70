//! # Rampart Sim
//!
//! Headless wave simulation on top of the Rampart combat core.
//!
//! Loads a content catalog, a wave scenario and a combat config, runs the
//! wave to completion and prints a JSON summary on stdout.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod cli;
mod scenario;
mod sim;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rampart_combat::{CombatCatalog, CombatConfig, CombatEngine, FastRng};

use crate::scenario::WaveScenario;
use crate::sim::WaveRunner;

/// Main entry point.
fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the summary
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("rampart=info".parse()?))
        .init();

    info!("Rampart sim starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = cli::parse_args();

    let config = CombatConfig::load_or_default(&args.config);
    let catalog = CombatCatalog::load_from(&args.catalog)
        .with_context(|| format!("Failed to load catalog {}", args.catalog.display()))?;
    let wave = WaveScenario::load_from(&args.wave)?;

    let rng = match args.seed {
        Some(seed) => FastRng::seeded(seed),
        None => FastRng::new(),
    };
    let engine = CombatEngine::new(config, catalog, Box::new(rng)).context("Invalid combat config")?;
    let summary = WaveRunner::new(engine, wave)?.run()?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&summary)?
    } else {
        serde_json::to_string(&summary)?
    };
    println!("{json}");

    info!("Rampart sim shutdown complete");
    Ok(())
}
