use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use landslide_rs::config::{LandslideConfig, RechargeDistribution};
use landslide_rs::fields::FieldAccessor;
use landslide_rs::io;
use landslide_rs::LandslideProbability;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Args, get_args};

fn main() -> Result<()> {
    let args = get_args();
    init_logging(args.verbose);

    // Configuration
    let config = build_config(&args)?;

    // Load node fields
    println!("Loading node fields from {:?}...", args.fields);
    let mut grid = io::csv::load_node_fields(&args.fields)?;
    let config = attach_recharge_sources(config, &args, grid.node_count())?;

    let engine = LandslideProbability::new(config).context("Invalid configuration")?;
    let config = engine.config();

    println!("\nSimulation Configuration:");
    println!("  Nodes: {}", grid.node_count());
    println!("  Core nodes: {}", grid.core_nodes().len());
    println!("  Iterations: {}", config.number_of_iterations);
    println!("  Recharge distribution: {}", config.recharge.kind());
    println!("  Seed: {}", config.seed);

    // Create progress bar
    let pb = ProgressBar::new(config.number_of_iterations as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} iterations ({eta})")?
            .progress_chars("#>-")
    );
    let engine = engine.with_progress(Arc::new(pb));

    println!("\nStarting Monte Carlo simulation...");
    let outputs = engine
        .calculate_landslide_probability(&mut grid)
        .context("Simulation failed")?;

    let mut wtr = io::csv::create_csv_writer(&args.output)?;
    io::csv::write_outputs(&mut wtr, &outputs)?;
    println!("CSV results saved to {:?}", args.output);

    #[cfg(feature = "netcdf")]
    if let Some(path) = &args.netcdf {
        io::netcdf::write_netcdf_output(path, &outputs, engine.config())?;
        println!("NetCDF results saved to {:?}", path);
    }

    let core = grid.core_nodes();
    let failing = core
        .iter()
        .filter(|&&node| outputs.probability_of_failure[node] > 0.5)
        .count();
    println!(
        "\nLandslide probability complete. {} of {} core nodes fail in more than half of the trials.",
        failing,
        core.len()
    );
    Ok(())
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(args: &Args) -> Result<LandslideConfig> {
    let mut config = match &args.config {
        Some(path) => LandslideConfig::from_path(path)
            .with_context(|| format!("Failed to load configuration {:?}", path))?,
        None => LandslideConfig::default(),
    };
    // validated by LandslideProbability::new, after the overrides
    args.apply_overrides(&mut config);
    Ok(config)
}

// Data-driven recharge inputs given on the command line replace the configured distribution
fn attach_recharge_sources(
    mut config: LandslideConfig,
    args: &Args,
    node_count: usize,
) -> Result<LandslideConfig> {
    if let (Some(sources_path), Some(shares_path)) = (&args.recharge_sources, &args.recharge_shares)
    {
        let sources = io::csv::load_recharge_sources(sources_path)?;
        let node_sources = io::csv::load_node_source_shares(shares_path, node_count)?;
        config.recharge = RechargeDistribution::DataDriven {
            sources,
            node_sources,
        };
    }
    Ok(config)
}
