//! Data models for the aggregation core.
//!
//! This module contains the input matrices handed over by the data
//! provider, the tables produced for the renderer, the per-timestep
//! diagnostics, and the report structures that bundle them.

use crate::error::{AggregationError, Result};
use crate::frames::SequenceWarning;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A time × user matrix of real values, stored row-major in one buffer.
///
/// Deserializes from (and serializes to) a nested `[[f64; users]; timesteps]`
/// array; ragged rows are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct TimeSeriesMatrix {
    timesteps: usize,
    users: usize,
    data: Vec<f64>,
}

/// Per-user attribute values (e.g. opinions) over time.
pub type AttributeMatrix = TimeSeriesMatrix;

/// Per-user ages over time.
pub type AgeMatrix = TimeSeriesMatrix;

impl TimeSeriesMatrix {
    /// Build a matrix from one row per timestep.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let timesteps = rows.len();
        let users = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(timesteps * users);

        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != users {
                return Err(AggregationError::RaggedMatrix {
                    row,
                    expected: users,
                    found: values.len(),
                });
            }
            data.extend(values);
        }

        Ok(Self {
            timesteps,
            users,
            data,
        })
    }

    /// Wrap an already flattened row-major buffer.
    pub fn from_flat(timesteps: usize, users: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != timesteps * users {
            return Err(AggregationError::ShapeMismatch {
                what: "flat matrix buffer".to_string(),
                expected: timesteps * users,
                found: data.len(),
            });
        }

        Ok(Self {
            timesteps,
            users,
            data,
        })
    }

    /// Number of timesteps (rows).
    pub fn timesteps(&self) -> usize {
        self.timesteps
    }

    /// Number of users (columns).
    pub fn users(&self) -> usize {
        self.users
    }

    /// Values of every user at timestep `t`.
    ///
    /// Panics if `t` is out of range.
    pub fn row(&self, t: usize) -> &[f64] {
        &self.data[t * self.users..(t + 1) * self.users]
    }

    /// Copy back into nested rows.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.timesteps).map(|t| self.row(t).to_vec()).collect()
    }
}

impl TryFrom<Vec<Vec<f64>>> for TimeSeriesMatrix {
    type Error = AggregationError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self> {
        Self::from_rows(rows)
    }
}

impl From<TimeSeriesMatrix> for Vec<Vec<f64>> {
    fn from(matrix: TimeSeriesMatrix) -> Self {
        matrix.to_rows()
    }
}

/// Counts indexed `[timestep][value_bin][age_group]`.
///
/// The age-group axis follows breakpoint order, so each group can be drawn
/// as one stack layer without re-sorting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JointHistogramTable {
    pub(crate) timesteps: usize,
    pub(crate) value_bins: usize,
    pub(crate) age_groups: usize,
    pub(crate) counts: Vec<u64>,
}

impl JointHistogramTable {
    pub(crate) fn zeroed(timesteps: usize, value_bins: usize, age_groups: usize) -> Self {
        Self {
            timesteps,
            value_bins,
            age_groups,
            counts: vec![0; timesteps * value_bins * age_groups],
        }
    }

    pub fn timesteps(&self) -> usize {
        self.timesteps
    }

    pub fn value_bins(&self) -> usize {
        self.value_bins
    }

    pub fn age_groups(&self) -> usize {
        self.age_groups
    }

    /// Cells of one timestep, laid out `[value_bin][age_group]`.
    pub fn timestep_slice(&self, t: usize) -> &[u64] {
        let stride = self.value_bins * self.age_groups;
        &self.counts[t * stride..(t + 1) * stride]
    }

    pub fn count(&self, t: usize, value_bin: usize, age_group: usize) -> u64 {
        self.timestep_slice(t)[value_bin * self.age_groups + age_group]
    }

    /// One timestep as nested rows `[value_bin][age_group]`.
    pub fn frame(&self, t: usize) -> Vec<Vec<u64>> {
        let cells = self.timestep_slice(t);
        (0..self.value_bins)
            .map(|b| cells[b * self.age_groups..(b + 1) * self.age_groups].to_vec())
            .collect()
    }

    /// Counts of a single age group across value bins (one bar-chart layer).
    pub fn group_layer(&self, t: usize, age_group: usize) -> Vec<u64> {
        (0..self.value_bins)
            .map(|b| self.count(t, b, age_group))
            .collect()
    }

    /// Number of users counted at timestep `t`.
    pub fn timestep_total(&self, t: usize) -> u64 {
        self.timestep_slice(t).iter().sum()
    }
}

/// Age-independent counts indexed `[timestep][value_bin]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueHistogramTable {
    pub(crate) timesteps: usize,
    pub(crate) value_bins: usize,
    pub(crate) counts: Vec<u64>,
}

impl ValueHistogramTable {
    pub(crate) fn zeroed(timesteps: usize, value_bins: usize) -> Self {
        Self {
            timesteps,
            value_bins,
            counts: vec![0; timesteps * value_bins],
        }
    }

    pub fn timesteps(&self) -> usize {
        self.timesteps
    }

    pub fn value_bins(&self) -> usize {
        self.value_bins
    }

    pub fn row(&self, t: usize) -> &[u64] {
        &self.counts[t * self.value_bins..(t + 1) * self.value_bins]
    }

    /// Each timestep scaled by its own largest bin, for heat-map display.
    ///
    /// A timestep with no counted users yields a row of zeros.
    pub fn density_map(&self) -> Vec<Vec<f64>> {
        (0..self.timesteps)
            .map(|t| {
                let row = self.row(t);
                let max = row.iter().copied().max().unwrap_or(0);
                if max == 0 {
                    vec![0.0; row.len()]
                } else {
                    row.iter().map(|&c| c as f64 / max as f64).collect()
                }
            })
            .collect()
    }
}

/// Mean attribute value per `[timestep][age_group]`.
///
/// `None` marks a group with no population at that timestep; it is never
/// reported as `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedAverageTable {
    pub(crate) timesteps: usize,
    pub(crate) age_groups: usize,
    pub(crate) means: Vec<Option<f64>>,
    /// Users behind each mean: in the age group and with an in-domain
    /// value. Users with an out-of-domain value are not counted here even
    /// though their age places them in the group.
    pub(crate) population: Vec<u64>,
}

impl WeightedAverageTable {
    pub fn timesteps(&self) -> usize {
        self.timesteps
    }

    pub fn age_groups(&self) -> usize {
        self.age_groups
    }

    pub fn mean(&self, t: usize, age_group: usize) -> Option<f64> {
        self.means[t * self.age_groups + age_group]
    }

    /// Users averaged into `mean(t, age_group)`; excludes out-of-domain values.
    pub fn population(&self, t: usize, age_group: usize) -> u64 {
        self.population[t * self.age_groups + age_group]
    }

    /// Time series of one age group.
    pub fn series(&self, age_group: usize) -> Vec<Option<f64>> {
        (0..self.timesteps)
            .map(|t| self.mean(t, age_group))
            .collect()
    }

    /// Population of one age group over time.
    pub fn population_series(&self, age_group: usize) -> Vec<u64> {
        (0..self.timesteps)
            .map(|t| self.population(t, age_group))
            .collect()
    }
}

/// Mean user age per `[timestep][value_bin]`; `None` for an empty bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinAgeProfile {
    pub(crate) timesteps: usize,
    pub(crate) value_bins: usize,
    pub(crate) mean_age: Vec<Option<f64>>,
}

impl BinAgeProfile {
    pub fn mean_age(&self, t: usize, value_bin: usize) -> Option<f64> {
        self.mean_age[t * self.value_bins + value_bin]
    }

    pub fn row(&self, t: usize) -> &[Option<f64>] {
        &self.mean_age[t * self.value_bins..(t + 1) * self.value_bins]
    }
}

/// Users left out of the joint table at one timestep.
///
/// `value` and `age` count per dimension and may overlap; `total` counts
/// users dropped for either reason, so `table total + total == users`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedUsers {
    pub value: usize,
    pub age: usize,
    pub total: usize,
}

impl DroppedUsers {
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Dropped-user counts for every timestep of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DropDiagnostics {
    pub(crate) per_timestep: Vec<DroppedUsers>,
}

impl DropDiagnostics {
    pub fn at(&self, t: usize) -> DroppedUsers {
        self.per_timestep[t]
    }

    pub fn per_timestep(&self) -> &[DroppedUsers] {
        &self.per_timestep
    }

    /// Sum of dropped users over all timesteps.
    pub fn total(&self) -> usize {
        self.per_timestep.iter().map(|d| d.total).sum()
    }

    /// Timesteps with at least one dropped user.
    pub fn affected_timesteps(&self) -> usize {
        self.per_timestep.iter().filter(|d| !d.is_empty()).count()
    }

    pub fn any(&self) -> bool {
        self.per_timestep.iter().any(|d| !d.is_empty())
    }
}

/// Maps timestep indices to human-readable labels.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis {
    time: Vec<f64>,
    life_cycle: f64,
    user_ageing: bool,
}

impl TimeAxis {
    /// `life_cycle` converts raw time into years when ageing is on.
    pub fn new(time: Vec<f64>, life_cycle: f64, user_ageing: bool) -> Result<Self> {
        if !(life_cycle.is_finite() && life_cycle > 0.0) {
            return Err(AggregationError::InvalidLifeCycle { value: life_cycle });
        }

        Ok(Self {
            time,
            life_cycle,
            user_ageing,
        })
    }

    /// Time coordinate `0, 1, ..., len - 1`.
    pub fn sequential(len: usize, life_cycle: f64, user_ageing: bool) -> Result<Self> {
        let time = (0..len).map(|t| t as f64).collect();
        Self::new(time, life_cycle, user_ageing)
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn time(&self, t: usize) -> f64 {
        self.time[t]
    }

    pub fn label(&self, t: usize) -> String {
        if self.user_ageing {
            format!("{} years", (self.time[t] / self.life_cycle).trunc())
        } else {
            format!("step {}", self.time[t])
        }
    }
}

/// Metadata about one aggregation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Version of the producing tool.
    pub tool_version: String,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Name of the aggregated attribute.
    pub attribute: String,
    /// Users per timestep.
    pub users: usize,
    /// Timesteps in the input.
    pub timesteps: usize,
    /// Raw-time units per year.
    pub life_cycle: f64,
    /// Whether ages change over time.
    pub user_ageing: bool,
}

/// One frame handed to the renderer.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedFrame {
    pub time_idx: usize,
    pub time_label: String,
    /// `[value_bin][age_group]`
    pub joint_counts: Vec<Vec<u64>>,
    /// `[value_bin]`
    pub value_counts: Vec<u64>,
    pub mean_age_by_value_bin: Vec<Option<f64>>,
    pub dropped: DroppedUsers,
}

/// Average attribute series of one age group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupSeries {
    pub label: String,
    pub means: Vec<Option<f64>>,
    pub population: Vec<u64>,
}

/// Non-fatal conditions observed during a run.
#[derive(Debug, Clone, Serialize)]
pub struct ReportDiagnostics {
    pub dropped: Vec<DroppedUsers>,
    pub total_dropped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_warning: Option<SequenceWarning>,
}

/// Everything the rendering layer needs for one run.
#[derive(Debug, Clone, Serialize)]
pub struct AggregationReport {
    pub metadata: ReportMetadata,
    pub age_group_labels: Vec<String>,
    pub value_bin_labels: Vec<f64>,
    pub value_bin_centers: Vec<f64>,
    pub time_labels: Vec<String>,
    pub frames: Vec<RenderedFrame>,
    pub averages: Vec<GroupSeries>,
    pub density_map: Vec<Vec<f64>>,
    pub diagnostics: ReportDiagnostics,
}

impl fmt::Display for DroppedUsers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} dropped ({} value, {} age)",
            self.total, self.value, self.age
        )
    }
}
