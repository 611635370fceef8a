//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.opinion-tables.toml` files.

use crate::analysis::AggregationSettings;
use crate::binning::{AgeBreakpoints, ValueBinConfig, DEFAULT_OPEN_ENDED_ABOVE};
use crate::cli::OutputFormat;
use crate::error::AggregationError;
use crate::frames::{FrameIndex, FrameMode};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".opinion-tables.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Value binning settings.
    #[serde(default)]
    pub binning: BinningConfig,

    /// Age group settings.
    #[serde(default)]
    pub ages: AgesConfig,

    /// Frame selection settings.
    #[serde(default)]
    pub frames: FramesConfig,

    /// Input data settings.
    #[serde(default)]
    pub data: DataConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Default report format.
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            format: OutputFormat::default(),
        }
    }
}

fn default_output() -> String {
    "opinion_tables.json".to_string()
}

/// Attribute binning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinningConfig {
    /// Number of equal-width bins.
    #[serde(default = "default_num_bins")]
    pub num_bins: usize,

    /// Lower end of the binned range.
    #[serde(default)]
    pub low: f64,

    /// Upper end of the binned range.
    #[serde(default = "default_high")]
    pub high: f64,
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            num_bins: default_num_bins(),
            low: 0.0,
            high: default_high(),
        }
    }
}

fn default_num_bins() -> usize {
    50
}

fn default_high() -> f64 {
    1.0
}

/// Age group settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgesConfig {
    /// Strictly increasing group boundaries.
    #[serde(default = "default_breakpoints")]
    pub breakpoints: Vec<f64>,

    /// A last breakpoint above this makes the oldest group open-ended.
    #[serde(default = "default_open_ended_above")]
    pub open_ended_above: f64,
}

impl Default for AgesConfig {
    fn default() -> Self {
        Self {
            breakpoints: default_breakpoints(),
            open_ended_above: default_open_ended_above(),
        }
    }
}

fn default_breakpoints() -> Vec<f64> {
    vec![0.0, 18.0, 65.0, 121.0]
}

fn default_open_ended_above() -> f64 {
    DEFAULT_OPEN_ENDED_ABOVE
}

/// Frame selection. `stride` switches to animation mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FramesConfig {
    /// Single timestep to render; -1 for the last one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_idx: Option<i64>,

    /// Step between animation frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stride: Option<usize>,
}

/// Properties of the input data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Raw time units per year.
    #[serde(default = "default_life_cycle")]
    pub life_cycle: f64,

    /// Whether user ages change over time.
    #[serde(default = "default_true")]
    pub user_ageing: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            life_cycle: default_life_cycle(),
            user_ageing: true,
        }
    }
}

fn default_life_cycle() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }

        if let Some(num_bins) = args.num_bins {
            self.binning.num_bins = num_bins;
        }
        if let Some([low, high]) = args.range.as_deref() {
            self.binning.low = *low;
            self.binning.high = *high;
        }

        if let Some(ref ages) = args.ages {
            self.ages.breakpoints = ages.clone();
        }

        // A frame flag on the command line replaces the configured mode
        if args.time_idx.is_some() || args.stride.is_some() {
            self.frames.time_idx = args.time_idx;
            self.frames.stride = args.stride;
        }

        if let Some(life_cycle) = args.life_cycle {
            self.data.life_cycle = life_cycle;
        }
        if args.no_ageing {
            self.data.user_ageing = false;
        }
    }

    /// Validated bin definitions for an aggregation run.
    pub fn aggregation_settings(
        &self,
    ) -> std::result::Result<AggregationSettings, AggregationError> {
        Ok(AggregationSettings {
            value_bins: ValueBinConfig::new(
                self.binning.num_bins,
                self.binning.low,
                self.binning.high,
            )?,
            breakpoints: AgeBreakpoints::with_open_ended_above(
                self.ages.breakpoints.clone(),
                self.ages.open_ended_above,
            )?,
            user_ageing: self.data.user_ageing,
        })
    }

    /// Frame mode; a stride takes precedence over a single index.
    pub fn frame_mode(&self) -> std::result::Result<FrameMode, AggregationError> {
        match (self.frames.stride, self.frames.time_idx) {
            (Some(stride), _) => Ok(FrameMode::Animated { stride }),
            (None, Some(time_idx)) => Ok(FrameMode::Single(FrameIndex::try_from(time_idx)?)),
            (None, None) => Ok(FrameMode::default()),
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
