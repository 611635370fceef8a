//! Loading of materialized simulation output.
//!
//! The simulation exports each run as a JSON document holding the per-user
//! attribute and age matrices plus an optional time coordinate:
//!
//! ```json
//! { "attribute_name": "opinion_u",
//!   "time": [0, 10, 20],
//!   "attribute": [[0.1, 0.4], [0.2, 0.4], [0.3, 0.5]],
//!   "age": [[20, 61], [20, 61], [21, 62]] }
//! ```

use crate::error::{AggregationError, Result};
use crate::models::{AgeMatrix, AttributeMatrix, TimeAxis};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

fn default_attribute_name() -> String {
    "opinion_u".to_string()
}

/// Matrices of one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationOutput {
    /// Name of the aggregated attribute.
    #[serde(default = "default_attribute_name")]
    pub attribute_name: String,

    /// Raw time coordinate of each timestep; `0..T` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<Vec<f64>>,

    /// Attribute value per user and timestep.
    #[serde(alias = "opinion_u")]
    pub attribute: AttributeMatrix,

    /// Age per user and timestep, or a single row of constant ages.
    #[serde(alias = "age_u")]
    pub age: AgeMatrix,
}

impl SimulationOutput {
    /// Labelled time axis for the attribute's timesteps.
    pub fn time_axis(&self, life_cycle: f64, user_ageing: bool) -> Result<TimeAxis> {
        let timesteps = self.attribute.timesteps();

        match &self.time {
            Some(time) if time.len() != timesteps => Err(AggregationError::ShapeMismatch {
                what: "time coordinate".to_string(),
                expected: timesteps,
                found: time.len(),
            }),
            Some(time) => TimeAxis::new(time.clone(), life_cycle, user_ageing),
            None => TimeAxis::sequential(timesteps, life_cycle, user_ageing),
        }
    }
}

/// Read a [`SimulationOutput`] from a JSON file.
pub fn load_simulation_output(path: &Path) -> anyhow::Result<SimulationOutput> {
    debug!("Reading simulation output from {}", path.display());

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;

    let output: SimulationOutput = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse input file: {}", path.display()))?;

    info!(
        "Loaded '{}': {} timesteps × {} users",
        output.attribute_name,
        output.attribute.timesteps(),
        output.attribute.users()
    );

    Ok(output)
}
