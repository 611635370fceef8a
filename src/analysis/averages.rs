//! Population-weighted averages.
//!
//! Each user contributes its value to a running sum for its group; the sum
//! is divided by the group population once, at the end of the timestep.

use crate::analysis::grouping::{AgeMode, GroupAssignments};
use crate::binning::ValueBinner;
use crate::models::{AgeMatrix, AttributeMatrix, BinAgeProfile, WeightedAverageTable};
use rayon::prelude::*;

/// Mean attribute value per age group at every timestep.
///
/// Users whose value lies outside the binning domain are left out of both
/// the sum and the population, the same users the histogram drops.
pub struct WeightedAverageAggregator<'a> {
    binner: &'a ValueBinner,
}

impl<'a> WeightedAverageAggregator<'a> {
    pub fn new(binner: &'a ValueBinner) -> Self {
        Self { binner }
    }

    pub fn aggregate(
        &self,
        values: &AttributeMatrix,
        assignments: &GroupAssignments,
    ) -> WeightedAverageTable {
        let timesteps = values.timesteps();
        let groups = assignments.group_count();

        let mut means = vec![None; timesteps * groups];
        let mut population = vec![0u64; timesteps * groups];

        means
            .par_chunks_mut(groups)
            .zip(population.par_chunks_mut(groups))
            .enumerate()
            .for_each(|(t, (means, population))| {
                let mut sums = vec![0.0f64; groups];

                for (&value, &group) in values.row(t).iter().zip(assignments.at(t)) {
                    let Some(g) = group else { continue };
                    if self.binner.bin(value).is_none() {
                        continue;
                    }
                    sums[g] += value;
                    population[g] += 1;
                }

                for ((mean, &sum), &count) in means.iter_mut().zip(&sums).zip(population.iter()) {
                    *mean = (count > 0).then(|| sum / count as f64);
                }
            });

        WeightedAverageTable {
            timesteps,
            age_groups: groups,
            means,
            population,
        }
    }
}

/// Mean age of the users in each value bin, per timestep.
///
/// Users with an unbinned value or a non-finite age are skipped; an empty
/// bin is `None`.
pub fn profile_ages_by_value_bin(
    values: &AttributeMatrix,
    ages: &AgeMatrix,
    mode: AgeMode,
    binner: &ValueBinner,
) -> BinAgeProfile {
    let timesteps = values.timesteps();
    let bins = binner.config().num_bins();
    let mut mean_age = vec![None; timesteps * bins];

    mean_age
        .par_chunks_mut(bins)
        .enumerate()
        .for_each(|(t, row)| {
            let mut sums = vec![0.0f64; bins];
            let mut counts = vec![0u64; bins];

            for (&value, &age) in values.row(t).iter().zip(ages.row(mode.row_for(t))) {
                let Some(bin) = binner.bin(value) else {
                    continue;
                };
                if !age.is_finite() {
                    continue;
                }
                sums[bin] += age;
                counts[bin] += 1;
            }

            for (slot, (&sum, &count)) in row.iter_mut().zip(sums.iter().zip(&counts)) {
                *slot = (count > 0).then(|| sum / count as f64);
            }
        });

    BinAgeProfile {
        timesteps,
        value_bins: bins,
        mean_age,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::{AgeBreakpoints, AgeGrouper, ValueBinConfig};

    fn binner() -> ValueBinner {
        ValueBinner::new(ValueBinConfig::new(2, 0.0, 1.0).unwrap())
    }

    fn assignments(ages: &AgeMatrix, mode: AgeMode, timesteps: usize) -> GroupAssignments {
        let grouper = AgeGrouper::new(AgeBreakpoints::new(vec![0.0, 18.0, 65.0, 121.0]).unwrap());
        GroupAssignments::compute(ages, &grouper, mode, timesteps)
    }

    #[test]
    fn test_four_user_scenario() {
        let values = AttributeMatrix::from_rows(vec![vec![0.1, 0.3, 0.3, 0.9]]).unwrap();
        let ages = AgeMatrix::from_rows(vec![vec![5.0, 30.0, 40.0, 70.0]]).unwrap();
        let binner = binner();

        let assignments = assignments(&ages, AgeMode::Ageing, 1);
        let aggregator = WeightedAverageAggregator::new(&binner);
        let table = aggregator.aggregate(&values, &assignments);

        assert_eq!(table.mean(0, 0), Some(0.1));
        assert_eq!(table.mean(0, 1), Some(0.3));
        assert_eq!(table.mean(0, 2), Some(0.9));
        assert_eq!(table.population(0, 1), 2);
    }

    #[test]
    fn test_empty_group_is_undefined_not_zero() {
        let values = AttributeMatrix::from_rows(vec![vec![0.0, 0.4]]).unwrap();
        let ages = AgeMatrix::from_rows(vec![vec![5.0, 10.0]]).unwrap();
        let binner = binner();

        let assignments = assignments(&ages, AgeMode::Ageing, 1);
        let aggregator = WeightedAverageAggregator::new(&binner);
        let table = aggregator.aggregate(&values, &assignments);

        assert_eq!(table.mean(0, 0), Some(0.2));
        assert_eq!(table.mean(0, 1), None);
        assert_eq!(table.mean(0, 2), None);
        assert_eq!(table.population(0, 2), 0);
    }

    #[test]
    fn test_out_of_domain_values_are_excluded() {
        let values = AttributeMatrix::from_rows(vec![vec![0.2, 7.0, f64::NAN]]).unwrap();
        let ages = AgeMatrix::from_rows(vec![vec![30.0, 30.0, 30.0]]).unwrap();
        let binner = binner();

        let assignments = assignments(&ages, AgeMode::Ageing, 1);
        let aggregator = WeightedAverageAggregator::new(&binner);
        let table = aggregator.aggregate(&values, &assignments);

        assert_eq!(table.mean(0, 1), Some(0.2));
        assert_eq!(table.population(0, 1), 1);
    }

    #[test]
    fn test_series_with_static_ages() {
        let rows = vec![vec![0.2, 0.4], vec![0.6, 0.8], vec![1.0, 0.0]];
        let values = AttributeMatrix::from_rows(rows).unwrap();
        let ages = AgeMatrix::from_rows(vec![vec![20.0, 40.0]]).unwrap();
        let binner = binner();

        let assignments = assignments(&ages, AgeMode::Static, 3);
        let aggregator = WeightedAverageAggregator::new(&binner);
        let table = aggregator.aggregate(&values, &assignments);

        let series = table.series(1);
        assert_eq!(series.len(), 3);
        assert!((series[0].unwrap() - 0.3).abs() < 1e-12);
        assert!((series[1].unwrap() - 0.7).abs() < 1e-12);
        assert!((series[2].unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(table.series(0), vec![None, None, None]);
        assert_eq!(table.population_series(1), vec![2, 2, 2]);
    }

    #[test]
    fn test_age_profile_by_value_bin() {
        let values = AttributeMatrix::from_rows(vec![vec![0.1, 0.2, 0.9, 2.0]]).unwrap();
        let ages = AgeMatrix::from_rows(vec![vec![10.0, 30.0, 50.0, 90.0]]).unwrap();

        let profile = profile_ages_by_value_bin(&values, &ages, AgeMode::Ageing, &binner());

        assert_eq!(profile.mean_age(0, 0), Some(20.0));
        assert_eq!(profile.mean_age(0, 1), Some(50.0));
    }

    #[test]
    fn test_age_profile_empty_bin() {
        let values = AttributeMatrix::from_rows(vec![vec![0.1], vec![0.7]]).unwrap();
        let ages = AgeMatrix::from_rows(vec![vec![44.0]]).unwrap();

        let profile = profile_ages_by_value_bin(&values, &ages, AgeMode::Static, &binner());

        assert_eq!(profile.row(0), &[Some(44.0), None]);
        assert_eq!(profile.row(1), &[None, Some(44.0)]);
    }
}
