//! Joint value × age-group histograms.
//!
//! One pass per timestep fills the joint table, the age-independent value
//! histogram and the drop counters. All three live in buffers allocated up
//! front and are written by computed index, so timesteps can be processed
//! in parallel in any order.

use crate::analysis::grouping::GroupAssignments;
use crate::binning::ValueBinner;
use crate::models::{
    AttributeMatrix, DropDiagnostics, DroppedUsers, JointHistogramTable, ValueHistogramTable,
};
use rayon::prelude::*;

/// Output of a histogram pass.
#[derive(Debug, Clone, PartialEq)]
pub struct JointHistogram {
    /// `[timestep][value_bin][age_group]`
    pub joint: JointHistogramTable,
    /// `[timestep][value_bin]`, every user with an in-domain value
    pub values: ValueHistogramTable,
    /// Users missing from `joint`, per timestep
    pub dropped: DropDiagnostics,
}

/// Counts users per (value bin, age group) at every timestep.
pub struct JointHistogramBuilder<'a> {
    binner: &'a ValueBinner,
}

impl<'a> JointHistogramBuilder<'a> {
    pub fn new(binner: &'a ValueBinner) -> Self {
        Self { binner }
    }

    /// Build the tables for every timestep of `values`.
    ///
    /// `assignments` must cover the same timesteps and users as `values`.
    pub fn build(
        &self,
        values: &AttributeMatrix,
        assignments: &GroupAssignments,
    ) -> JointHistogram {
        let timesteps = values.timesteps();
        let bins = self.binner.config().num_bins();
        let groups = assignments.group_count();

        let mut joint = JointHistogramTable::zeroed(timesteps, bins, groups);
        let mut value_counts = ValueHistogramTable::zeroed(timesteps, bins);
        let mut dropped = vec![DroppedUsers::default(); timesteps];

        joint
            .counts
            .par_chunks_mut(bins * groups)
            .zip(value_counts.counts.par_chunks_mut(bins))
            .zip(dropped.par_iter_mut())
            .enumerate()
            .for_each(|(t, ((cells, row), drops))| {
                *drops = self.count_timestep(values.row(t), assignments.at(t), groups, cells, row);
            });

        JointHistogram {
            joint,
            values: value_counts,
            dropped: DropDiagnostics {
                per_timestep: dropped,
            },
        }
    }

    fn count_timestep(
        &self,
        values: &[f64],
        age_groups: &[Option<usize>],
        groups: usize,
        cells: &mut [u64],
        row: &mut [u64],
    ) -> DroppedUsers {
        let mut drops = DroppedUsers::default();

        for (&value, &age_group) in values.iter().zip(age_groups) {
            let value_bin = self.binner.bin(value);

            if let Some(b) = value_bin {
                row[b] += 1;
            }

            match (value_bin, age_group) {
                (Some(b), Some(g)) => cells[b * groups + g] += 1,
                (b, g) => {
                    drops.value += usize::from(b.is_none());
                    drops.age += usize::from(g.is_none());
                    drops.total += 1;
                }
            }
        }

        drops
    }
}
