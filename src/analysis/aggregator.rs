//! Aggregation run orchestration.
//!
//! This module validates the inputs, computes the shared age grouping once,
//! and runs the histogram and averaging passes over it.

use crate::analysis::averages::{profile_ages_by_value_bin, WeightedAverageAggregator};
use crate::analysis::grouping::{AgeMode, GroupAssignments};
use crate::analysis::histogram::{JointHistogram, JointHistogramBuilder};
use crate::binning::{AgeBreakpoints, AgeGrouper, ValueBinConfig, ValueBinner};
use crate::error::{AggregationError, Result};
use crate::models::{
    AgeMatrix, AttributeMatrix, BinAgeProfile, DropDiagnostics, JointHistogramTable,
    ValueHistogramTable, WeightedAverageTable,
};
use tracing::{debug, info, warn};

/// Bin definitions and age handling for one run.
#[derive(Debug, Clone)]
pub struct AggregationSettings {
    pub value_bins: ValueBinConfig,
    pub breakpoints: AgeBreakpoints,
    /// When false, ages are read from the first row only.
    pub user_ageing: bool,
}

/// All tables produced by one run.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub joint: JointHistogramTable,
    pub values: ValueHistogramTable,
    pub averages: WeightedAverageTable,
    pub age_profile: BinAgeProfile,
    pub dropped: DropDiagnostics,
    pub group_labels: Vec<String>,
    pub users: usize,
}

impl Aggregation {
    pub fn timesteps(&self) -> usize {
        self.joint.timesteps()
    }
}

/// Run every pass over `attribute` and `ages`.
///
/// Fails before any work is done if the shapes disagree. An age matrix with
/// a single row is treated as constant over time.
pub fn aggregate(
    attribute: &AttributeMatrix,
    ages: &AgeMatrix,
    settings: &AggregationSettings,
) -> Result<Aggregation> {
    let mode = check_shapes(attribute, ages, settings.user_ageing)?;
    let timesteps = attribute.timesteps();

    info!(
        "Aggregating {} users over {} timesteps ({} value bins, {} age groups)",
        attribute.users(),
        timesteps,
        settings.value_bins.num_bins(),
        settings.breakpoints.group_count()
    );

    let grouper = AgeGrouper::new(settings.breakpoints.clone());
    let binner = ValueBinner::new(settings.value_bins);
    let assignments = GroupAssignments::compute(ages, &grouper, mode, timesteps);

    let JointHistogram {
        joint,
        values,
        dropped,
    } = JointHistogramBuilder::new(&binner).build(attribute, &assignments);
    let averages = WeightedAverageAggregator::new(&binner).aggregate(attribute, &assignments);
    let age_profile = profile_ages_by_value_bin(attribute, ages, mode, &binner);

    report_dropped(&dropped);

    Ok(Aggregation {
        joint,
        values,
        averages,
        age_profile,
        dropped,
        group_labels: settings.breakpoints.labels(),
        users: attribute.users(),
    })
}

fn check_shapes(
    attribute: &AttributeMatrix,
    ages: &AgeMatrix,
    user_ageing: bool,
) -> Result<AgeMode> {
    if ages.users() != attribute.users() {
        return Err(AggregationError::ShapeMismatch {
            what: "users in age matrix".to_string(),
            expected: attribute.users(),
            found: ages.users(),
        });
    }

    if attribute.timesteps() == 0 {
        return Ok(AgeMode::Static);
    }

    match ages.timesteps() {
        0 => Err(AggregationError::ShapeMismatch {
            what: "timesteps in age matrix".to_string(),
            expected: attribute.timesteps(),
            found: 0,
        }),
        1 => {
            debug!("Single age row, treating ages as constant");
            Ok(AgeMode::Static)
        }
        _ if !user_ageing => {
            debug!("User ageing off, grouping by the first age row");
            Ok(AgeMode::Static)
        }
        n if n == attribute.timesteps() => Ok(AgeMode::Ageing),
        n => Err(AggregationError::ShapeMismatch {
            what: "timesteps in age matrix".to_string(),
            expected: attribute.timesteps(),
            found: n,
        }),
    }
}

fn report_dropped(dropped: &DropDiagnostics) {
    for (t, drops) in dropped.per_timestep().iter().enumerate() {
        if !drops.is_empty() {
            debug!("Timestep {}: {}", t, drops);
        }
    }

    if dropped.any() {
        warn!(
            "{} users fell outside the configured value range or age groups across {} timesteps",
            dropped.total(),
            dropped.affected_timesteps()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(user_ageing: bool) -> AggregationSettings {
        AggregationSettings {
            value_bins: ValueBinConfig::new(2, 0.0, 1.0).unwrap(),
            breakpoints: AgeBreakpoints::new(vec![0.0, 18.0, 65.0, 121.0]).unwrap(),
            user_ageing,
        }
    }

    #[test]
    fn test_aggregate_scenario() {
        let attribute = AttributeMatrix::from_rows(vec![vec![0.1, 0.3, 0.3, 0.9]]).unwrap();
        let ages = AgeMatrix::from_rows(vec![vec![5.0, 30.0, 40.0, 70.0]]).unwrap();

        let result = aggregate(&attribute, &ages, &settings(true)).unwrap();

        assert_eq!(result.group_labels, vec!["0–18", "18–65", "65+"]);
        assert_eq!(result.joint.count(0, 0, 0), 1);
        assert_eq!(result.joint.count(0, 0, 1), 2);
        assert_eq!(result.joint.count(0, 1, 2), 1);
        assert_eq!(result.joint.timestep_total(0), 4);
        assert_eq!(result.averages.mean(0, 1), Some(0.3));
        assert!(!result.dropped.any());
    }

    #[test]
    fn test_user_count_mismatch() {
        let attribute = AttributeMatrix::from_rows(vec![vec![0.1, 0.3]]).unwrap();
        let ages = AgeMatrix::from_rows(vec![vec![5.0]]).unwrap();

        let err = aggregate(&attribute, &ages, &settings(true)).unwrap_err();
        assert!(matches!(err, AggregationError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_timestep_mismatch_only_matters_with_ageing() {
        let rows = vec![vec![0.1], vec![0.2], vec![0.3]];
        let attribute = AttributeMatrix::from_rows(rows).unwrap();
        let ages = AgeMatrix::from_rows(vec![vec![20.0], vec![21.0]]).unwrap();

        assert!(aggregate(&attribute, &ages, &settings(true)).is_err());

        let result = aggregate(&attribute, &ages, &settings(false)).unwrap();
        assert_eq!(result.timesteps(), 3);
        assert_eq!(result.averages.population_series(1), vec![1, 1, 1]);
    }

    #[test]
    fn test_single_age_row_broadcasts() {
        let attribute = AttributeMatrix::from_rows(vec![vec![0.1], vec![0.9]]).unwrap();
        let ages = AgeMatrix::from_rows(vec![vec![70.0]]).unwrap();

        let result = aggregate(&attribute, &ages, &settings(true)).unwrap();
        assert_eq!(result.joint.count(1, 1, 2), 1);
    }

    #[test]
    fn test_empty_age_matrix_is_rejected() {
        let attribute = AttributeMatrix::from_rows(vec![vec![0.1]]).unwrap();
        let ages = AgeMatrix::from_flat(0, 1, vec![]).unwrap();

        assert!(aggregate(&attribute, &ages, &settings(false)).is_err());
    }
}
