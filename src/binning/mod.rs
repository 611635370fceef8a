//! Discretization of attribute values and ages.

pub mod age;
pub mod value;

pub use age::{AgeBreakpoints, AgeGrouper, DEFAULT_OPEN_ENDED_ABOVE};
pub use value::{ValueBinConfig, ValueBinner};
