//! Equal-width binning of a continuous attribute.

use crate::error::{AggregationError, Result};
use serde::Serialize;

/// Number and range of attribute bins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueBinConfig {
    num_bins: usize,
    low: f64,
    high: f64,
}

impl ValueBinConfig {
    /// Validates `num_bins >= 1` and a finite `low < high`.
    pub fn new(num_bins: usize, low: f64, high: f64) -> Result<Self> {
        if num_bins == 0 {
            return Err(AggregationError::InvalidBinCount);
        }
        if !(low.is_finite() && high.is_finite() && low < high) {
            return Err(AggregationError::InvalidValueRange { low, high });
        }

        Ok(Self {
            num_bins,
            low,
            high,
        })
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn width(&self) -> f64 {
        (self.high - self.low) / self.num_bins as f64
    }

    /// `num_bins + 1` equally spaced edges; the last one is exactly `high`.
    pub fn edges(&self) -> Vec<f64> {
        let span = self.high - self.low;
        let n = self.num_bins as f64;
        let mut edges: Vec<f64> = (0..=self.num_bins)
            .map(|i| self.low + span * (i as f64 / n))
            .collect();
        edges[self.num_bins] = self.high;
        edges
    }

    /// Midpoint of each bin.
    pub fn centers(&self) -> Vec<f64> {
        self.edges()
            .windows(2)
            .map(|w| 0.5 * (w[0] + w[1]))
            .collect()
    }

    /// Row labels for the joint table: left edges rounded to three decimals.
    pub fn index_labels(&self) -> Vec<f64> {
        let edges = self.edges();
        edges[..self.num_bins]
            .iter()
            .map(|e| (e * 1000.0).round() / 1000.0)
            .collect()
    }
}

/// Maps attribute values to bin indices.
///
/// Bins are `[e_i, e_{i+1})` except the last one, which also holds `high`.
/// Anything outside `[low, high]` (and NaN) is unbinned.
#[derive(Debug, Clone)]
pub struct ValueBinner {
    config: ValueBinConfig,
    edges: Vec<f64>,
}

impl ValueBinner {
    pub fn new(config: ValueBinConfig) -> Self {
        Self {
            edges: config.edges(),
            config,
        }
    }

    pub fn config(&self) -> &ValueBinConfig {
        &self.config
    }

    /// Bin index of a single value, `None` when out of domain.
    pub fn bin(&self, value: f64) -> Option<usize> {
        let (low, high) = (self.config.low, self.config.high);
        let num_bins = self.config.num_bins;

        if !(value >= low && value <= high) {
            return None;
        }
        if value == high {
            return Some(num_bins - 1);
        }

        let scaled = (value - low) / (high - low) * num_bins as f64;
        let mut idx = (scaled as usize).min(num_bins - 1);

        // The scaled guess can land one bin off near an edge; the edge
        // array is authoritative.
        if value < self.edges[idx] {
            idx -= 1;
        } else if idx + 1 < num_bins && value >= self.edges[idx + 1] {
            idx += 1;
        }

        Some(idx)
    }

    /// Bin index of every value in one timestep.
    pub fn bin_all(&self, values: &[f64]) -> Vec<Option<usize>> {
        values.iter().map(|&v| self.bin(v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_binner(bins: usize) -> ValueBinner {
        ValueBinner::new(ValueBinConfig::new(bins, 0.0, 1.0).unwrap())
    }

    #[test]
    fn test_config_validation() {
        assert_eq!(
            ValueBinConfig::new(0, 0.0, 1.0),
            Err(AggregationError::InvalidBinCount)
        );
        assert!(ValueBinConfig::new(10, 1.0, 1.0).is_err());
        assert!(ValueBinConfig::new(10, 1.0, 0.0).is_err());
        assert!(ValueBinConfig::new(10, f64::NAN, 1.0).is_err());
        assert!(ValueBinConfig::new(1, -1.0, 1.0).is_ok());
    }

    #[test]
    fn test_edges_and_centers() {
        let config = ValueBinConfig::new(4, 0.0, 1.0).unwrap();
        assert_eq!(config.edges(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(config.centers(), vec![0.125, 0.375, 0.625, 0.875]);
        assert_eq!(config.width(), 0.25);
    }

    #[test]
    fn test_index_labels_are_rounded_left_edges() {
        let config = ValueBinConfig::new(3, 0.0, 1.0).unwrap();
        assert_eq!(config.index_labels(), vec![0.0, 0.333, 0.667]);
    }

    #[test]
    fn test_bin_boundaries() {
        let binner = unit_binner(2);

        assert_eq!(binner.bin(0.0), Some(0));
        assert_eq!(binner.bin(0.1), Some(0));
        assert_eq!(binner.bin(0.5), Some(1));
        assert_eq!(binner.bin(0.9), Some(1));
        assert_eq!(binner.bin(1.0), Some(1));
    }

    #[test]
    fn test_out_of_domain_is_unbinned() {
        let binner = unit_binner(10);

        assert_eq!(binner.bin(-0.0001), None);
        assert_eq!(binner.bin(1.0001), None);
        assert_eq!(binner.bin(f64::NAN), None);
        assert_eq!(binner.bin(f64::INFINITY), None);
    }

    #[test]
    fn test_interior_edges_belong_to_upper_bin() {
        let binner = unit_binner(10);
        let edges = binner.config().edges();

        for (i, edge) in edges.iter().enumerate().take(10) {
            assert_eq!(binner.bin(*edge), Some(i), "edge {} = {}", i, edge);
        }
    }

    #[test]
    fn test_bin_all_is_repeatable() {
        let binner = unit_binner(5);
        let values = [0.05, 0.2, 0.999, -1.0, 0.6];

        let first = binner.bin_all(&values);
        let second = binner.bin_all(&values);

        assert_eq!(first, vec![Some(0), Some(1), Some(4), None, Some(3)]);
        assert_eq!(first, second);
    }
}
