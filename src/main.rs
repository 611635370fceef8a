//! OpinionTables - aggregate opinion-dynamics output for plotting
//!
//! A CLI tool that bins per-user opinions and ages from a simulation run
//! into joint histograms and age-group averages, ready for a renderer.
//!
//! Exit codes:
//!   0 - Success (no users dropped, or no --fail-on-dropped set)
//!   1 - Runtime error (bad input, bad config, shape mismatch, etc.)
//!   2 - Users fell outside the bins or age groups with --fail-on-dropped

use anyhow::{Context, Result};
use chrono::Utc;
use opinion_tables::aggregate;
use opinion_tables::cli::{Args, OutputFormat};
use opinion_tables::config::{Config, DEFAULT_CONFIG_FILE};
use opinion_tables::frames::select_frames;
use opinion_tables::models::ReportMetadata;
use opinion_tables::provider::load_simulation_output;
use opinion_tables::report::{self, ReportContext};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("OpinionTables v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(&args) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Aggregation failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .opinion-tables.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize bins, age groups, frames, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete aggregation workflow. Returns exit code (0 or 2).
fn run(args: &Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(args)?;
    config.merge_with_args(args);

    // Step 1: Load the simulation output
    let input = args.input.as_deref().context("An input file is required")?;
    if !args.quiet {
        println!("📥 Loading simulation output: {}", input.display());
    }
    let simulation = load_simulation_output(input)?;

    // Step 2: Resolve bins, age groups, time axis, and frames
    let settings = config.aggregation_settings()?;
    let time_axis = simulation.time_axis(config.data.life_cycle, settings.user_ageing)?;
    let frame_mode = config.frame_mode()?;
    let timesteps = simulation.attribute.timesteps();
    let (frames, sequence_warning) = select_frames(frame_mode, timesteps)?;

    if !args.quiet {
        println!("🗂️  Binning setup:");
        println!(
            "   Value bins: {} over [{}, {}]",
            settings.value_bins.num_bins(),
            settings.value_bins.low(),
            settings.value_bins.high()
        );
        let labels = settings.breakpoints.labels();
        println!("   Age groups: {}", labels.join(", "));
        println!(
            "   Ageing: {}",
            if settings.user_ageing { "on" } else { "off" }
        );
        println!("   Frames: {}", frames.len());
    }

    // Step 3: Aggregate
    if !args.quiet {
        println!("\n🔬 Aggregating...");
    }
    let aggregation = aggregate(&simulation.attribute, &simulation.age, &settings)
        .context("Aggregation rejected the input")?;

    // Step 4: Build the report
    let metadata = ReportMetadata {
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        generated_at: Utc::now(),
        attribute: simulation.attribute_name.clone(),
        users: aggregation.users,
        timesteps: aggregation.timesteps(),
        life_cycle: config.data.life_cycle,
        user_ageing: settings.user_ageing,
    };

    let report = report::assemble_report(
        &aggregation,
        ReportContext {
            metadata,
            value_bins: &settings.value_bins,
            time_axis: &time_axis,
            frames: &frames,
            sequence_warning,
            show_progress: !args.quiet,
        },
    );

    // Step 5: Render and save the report
    let output = match config.general.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    let output_path = Path::new(&config.general.output);
    report::write_report(&output, output_path)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    // Print summary
    let dropped = &aggregation.dropped;
    let duration = start_time.elapsed().as_secs_f64();
    if !args.quiet {
        println!("\n📊 Aggregation Summary:");
        println!("   Users: {}", aggregation.users);
        println!("   Timesteps: {}", aggregation.timesteps());
        println!("   Frames rendered: {}", report.frames.len());
        println!(
            "   Dropped: {} user-timesteps across {} timesteps",
            dropped.total(),
            dropped.affected_timesteps()
        );
        println!("   Duration: {:.2}s", duration);
        println!(
            "\n✅ Aggregation complete! Report saved to: {}",
            output_path.display()
        );
    }

    // Check --fail-on-dropped
    if args.fail_on_dropped && dropped.any() {
        eprintln!(
            "\n⛔ {} user-timesteps fell outside the bins or age groups. Failing (exit code 2).",
            dropped.total()
        );
        return Ok(2);
    }

    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
