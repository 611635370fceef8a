//! Aggregation passes.
//!
//! The age grouping is computed once per run and shared by the histogram
//! and averaging passes.

pub mod aggregator;
pub mod averages;
pub mod grouping;
pub mod histogram;

pub use aggregator::*;
pub use averages::{profile_ages_by_value_bin, WeightedAverageAggregator};
pub use grouping::{AgeMode, GroupAssignments};
pub use histogram::{JointHistogram, JointHistogramBuilder};
