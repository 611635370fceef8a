//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// OpinionTables - aggregate opinion-dynamics output for plotting
///
/// Builds joint opinion × age-group histograms and per-age-group average
/// opinions from a simulation run, for one frame or an animation.
///
/// Examples:
///   opinion-tables --input run.json
///   opinion-tables --input run.json --time-idx -1 --format markdown
///   opinion-tables --input run.json --stride 10 --ages 0,20,40,60,121
///   opinion-tables --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// JSON file with the attribute and age matrices
    #[arg(
        short,
        long,
        value_name = "FILE",
        required_unless_present = "init_config"
    )]
    pub input: Option<PathBuf>,

    /// Output file path for the report
    ///
    /// Defaults to the config file setting (opinion_tables.json)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .opinion-tables.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (json, markdown)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Number of equal-width value bins
    #[arg(long, value_name = "COUNT", env = "OPINION_TABLES_BINS")]
    pub num_bins: Option<usize>,

    /// Value range covered by the bins (LOW,HIGH)
    ///
    /// Example: --range 0,1
    #[arg(
        long,
        value_name = "LOW,HIGH",
        value_delimiter = ',',
        allow_hyphen_values = true
    )]
    pub range: Option<Vec<f64>>,

    /// Age breakpoints, strictly increasing (comma-separated)
    ///
    /// A last breakpoint above 120 makes the oldest group open-ended.
    /// Example: --ages 0,18,65,121
    #[arg(
        long,
        value_name = "AGES",
        value_delimiter = ',',
        allow_hyphen_values = true
    )]
    pub ages: Option<Vec<f64>>,

    /// Timestep to render (-1 for the last one)
    #[arg(
        long,
        value_name = "INDEX",
        allow_negative_numbers = true,
        conflicts_with = "stride"
    )]
    pub time_idx: Option<i64>,

    /// Render an animation visiting every STRIDE-th timestep
    #[arg(long, value_name = "STRIDE")]
    pub stride: Option<usize>,

    /// Raw time units per year
    #[arg(long, value_name = "UNITS")]
    pub life_cycle: Option<f64>,

    /// Treat ages as constant and group users only once
    #[arg(long)]
    pub no_ageing: bool,

    /// Exit with code 2 if any user falls outside the bins or age groups
    #[arg(long)]
    pub fail_on_dropped: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .opinion-tables.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// Markdown format
    Markdown,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref input) = self.input {
            if !input.is_file() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        if self.num_bins == Some(0) {
            return Err("Number of bins must be at least 1".to_string());
        }

        if let Some(ref range) = self.range {
            if range.len() != 2 {
                return Err("Range must be given as LOW,HIGH".to_string());
            }
            if range[0] >= range[1] {
                return Err("Range LOW must be below HIGH".to_string());
            }
        }

        if let Some(ref ages) = self.ages {
            if ages.len() < 2 {
                return Err("At least two age breakpoints are required".to_string());
            }
        }

        if let Some(time_idx) = self.time_idx {
            if time_idx < -1 {
                return Err("Time index must be -1 (last) or non-negative".to_string());
            }
        }

        if self.stride == Some(0) {
            return Err("Stride must be at least 1".to_string());
        }

        if let Some(life_cycle) = self.life_cycle {
            if !(life_cycle > 0.0) {
                return Err("Life cycle must be positive".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            input: None,
            output: None,
            config: None,
            format: None,
            num_bins: None,
            range: None,
            ages: None,
            time_idx: None,
            stride: None,
            life_cycle: None,
            no_ageing: false,
            fail_on_dropped: false,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "opinion-tables",
            "--input",
            "run.json",
            "--ages",
            "0,18,65,121",
            "--range",
            "-1,1",
            "--time-idx",
            "-1",
            "--format",
            "markdown",
        ])
        .unwrap();

        assert_eq!(args.ages, Some(vec![0.0, 18.0, 65.0, 121.0]));
        assert_eq!(args.range, Some(vec![-1.0, 1.0]));
        assert_eq!(args.time_idx, Some(-1));
        assert_eq!(args.format, Some(OutputFormat::Markdown));
    }

    #[test]
    fn test_time_idx_conflicts_with_stride() {
        let result = Args::try_parse_from([
            "opinion-tables",
            "--input",
            "run.json",
            "--time-idx",
            "2",
            "--stride",
            "5",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_bad_range() {
        let mut args = make_args();
        args.range = Some(vec![1.0, 0.0]);
        assert!(args.validate().is_err());

        args.range = Some(vec![0.0]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_values() {
        let mut args = make_args();
        args.num_bins = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.stride = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_time_idx() {
        let mut args = make_args();
        args.time_idx = Some(-1);
        assert!(args.validate().is_ok());

        args.time_idx = Some(-3);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
