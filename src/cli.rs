use clap::Parser;
use landslide_rs::config::LandslideConfig;
use std::path::PathBuf;

/// Monte Carlo landslide probability over a table of grid nodes
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// CSV node table with one column per input field
    pub fields: PathBuf,

    /// JSON configuration (iterations, seed, recharge distribution)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output CSV for the probability fields
    #[arg(short, long, default_value = "landslide_probability.csv")]
    pub output: PathBuf,

    /// Also write the outputs to this NetCDF file
    #[cfg(feature = "netcdf")]
    #[arg(long)]
    pub netcdf: Option<PathBuf>,

    /// Override the number of Monte Carlo iterations
    #[arg(short = 'n', long)]
    pub iterations: Option<usize>,

    /// Override the random seed
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Recharge records (`source_id,recharge`) for data-driven recharge
    #[arg(long, requires = "recharge_shares")]
    pub recharge_sources: Option<PathBuf>,

    /// Node source shares (`node,source_id,fraction`) for data-driven recharge
    #[arg(long, requires = "recharge_sources")]
    pub recharge_shares: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Replace configured values with the ones given on the command line.
    pub fn apply_overrides(&self, config: &mut LandslideConfig) {
        if let Some(iterations) = self.iterations {
            config.number_of_iterations = iterations;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(threads) = self.threads {
            config.threads = Some(threads);
        }
    }
}

pub fn get_args() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn overrides_parse() {
        let args = Args::parse_from(["landslide_rs", "nodes.csv", "-n", "10", "--seed", "3", "-vv"]);
        assert_eq!(args.fields, PathBuf::from("nodes.csv"));
        assert_eq!(args.iterations, Some(10));
        assert_eq!(args.seed, Some(3));
        assert_eq!(args.verbose, 2);
        assert!(args.config.is_none());
    }

    #[test]
    fn iteration_override_is_validated_with_the_file() {
        let mut config = LandslideConfig::from_json(
            r#"{
                "groundwater__recharge_distribution": "fixed",
                "groundwater__recharge_values": [40.0, 60.0]
            }"#,
        )
        .unwrap();
        let args = Args::parse_from(["landslide_rs", "nodes.csv", "-n", "2", "-t", "3"]);
        args.apply_overrides(&mut config);
        assert_eq!(config.number_of_iterations, 2);
        assert_eq!(config.threads, Some(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn data_driven_inputs_come_in_pairs() {
        let result = Args::try_parse_from([
            "landslide_rs",
            "nodes.csv",
            "--recharge-sources",
            "sources.csv",
        ]);
        assert!(result.is_err());
    }
}
