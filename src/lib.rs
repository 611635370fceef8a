//! OpinionTables - aggregation of opinion-dynamics simulation output.
//!
//! Turns per-user attribute and age matrices into the tables a plotting
//! layer draws: joint value-bin × age-group histograms per timestep,
//! population-weighted averages per age group, and the timestep sequence
//! for single frames or animations.

pub mod analysis;
pub mod binning;
pub mod cli;
pub mod config;
pub mod error;
pub mod frames;
pub mod models;
pub mod provider;
pub mod report;

pub use analysis::{aggregate, Aggregation, AggregationSettings};
pub use error::{AggregationError, Result};
