//! Age breakpoints and group assignment.

use crate::error::{AggregationError, Result};
use serde::Serialize;

/// Last breakpoints above this age mark the oldest group as open-ended.
pub const DEFAULT_OPEN_ENDED_ABOVE: f64 = 120.0;

/// Strictly increasing breakpoints defining `len - 1` age groups.
///
/// Group `i` covers `[edges[i], edges[i + 1])`. When the oldest group is
/// open-ended it also takes every age at or above its upper edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeBreakpoints {
    edges: Vec<f64>,
    open_ended: bool,
}

impl AgeBreakpoints {
    /// Breakpoints with the default open-ended threshold of 120.
    pub fn new(edges: Vec<f64>) -> Result<Self> {
        Self::with_open_ended_above(edges, DEFAULT_OPEN_ENDED_ABOVE)
    }

    /// The oldest group is open-ended when the last edge exceeds `threshold`.
    pub fn with_open_ended_above(edges: Vec<f64>, threshold: f64) -> Result<Self> {
        if edges.len() < 2 {
            return Err(AggregationError::InvalidBreakpoints {
                reason: format!("at least two breakpoints are required, got {}", edges.len()),
            });
        }

        if let Some(pos) = edges.iter().position(|e| !e.is_finite()) {
            return Err(AggregationError::InvalidBreakpoints {
                reason: format!("breakpoint at position {} is not finite", pos),
            });
        }

        if let Some(pos) = edges.windows(2).position(|w| w[0] >= w[1]) {
            return Err(AggregationError::InvalidBreakpoints {
                reason: format!(
                    "breakpoints must be strictly increasing ({} at position {} follows {})",
                    edges[pos + 1],
                    pos + 1,
                    edges[pos]
                ),
            });
        }

        let open_ended = edges[edges.len() - 1] > threshold;

        Ok(Self { edges, open_ended })
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn group_count(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn is_open_ended(&self) -> bool {
        self.open_ended
    }

    /// `"a–b"` for each group, with `"a+"` for an open-ended oldest group.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .edges
            .windows(2)
            .map(|w| format!("{}–{}", w[0], w[1]))
            .collect();

        if self.open_ended {
            let last = labels.len() - 1;
            labels[last] = format!("{}+", self.edges[last]);
        }

        labels
    }
}

/// Maps ages to group indices.
#[derive(Debug, Clone)]
pub struct AgeGrouper {
    breakpoints: AgeBreakpoints,
}

impl AgeGrouper {
    pub fn new(breakpoints: AgeBreakpoints) -> Self {
        Self { breakpoints }
    }

    pub fn breakpoints(&self) -> &AgeBreakpoints {
        &self.breakpoints
    }

    pub fn group_count(&self) -> usize {
        self.breakpoints.group_count()
    }

    /// Group index of a single age, `None` when no group contains it.
    pub fn group(&self, age: f64) -> Option<usize> {
        let edges = &self.breakpoints.edges;

        if !(age >= edges[0]) {
            return None;
        }
        if age >= edges[edges.len() - 1] {
            return self.breakpoints.open_ended.then(|| self.group_count() - 1);
        }

        Some(edges.partition_point(|&e| e <= age) - 1)
    }

    /// Group index of every age in one timestep.
    pub fn group_all(&self, ages: &[f64]) -> Vec<Option<usize>> {
        ages.iter().map(|&a| self.group(a)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard() -> AgeGrouper {
        AgeGrouper::new(AgeBreakpoints::new(vec![0.0, 18.0, 65.0, 121.0]).unwrap())
    }

    #[test]
    fn test_breakpoint_validation() {
        assert!(AgeBreakpoints::new(vec![]).is_err());
        assert!(AgeBreakpoints::new(vec![10.0]).is_err());
        assert!(AgeBreakpoints::new(vec![0.0, 18.0, 18.0]).is_err());
        assert!(AgeBreakpoints::new(vec![0.0, 30.0, 18.0]).is_err());
        assert!(AgeBreakpoints::new(vec![0.0, f64::INFINITY]).is_err());
        assert!(AgeBreakpoints::new(vec![0.0, 18.0]).is_ok());
    }

    #[test]
    fn test_non_increasing_reason_names_position() {
        let err = AgeBreakpoints::new(vec![0.0, 30.0, 18.0]).unwrap_err();
        assert!(err.to_string().contains("position 2"));
    }

    #[test]
    fn test_labels() {
        let open = AgeBreakpoints::new(vec![0.0, 18.0, 65.0, 121.0]).unwrap();
        assert!(open.is_open_ended());
        assert_eq!(open.labels(), vec!["0–18", "18–65", "65+"]);

        let closed = AgeBreakpoints::new(vec![0.0, 18.0, 65.0, 100.0]).unwrap();
        assert!(!closed.is_open_ended());
        assert_eq!(closed.labels(), vec!["0–18", "18–65", "65–100"]);

        let fractional = AgeBreakpoints::new(vec![0.5, 2.5]).unwrap();
        assert_eq!(fractional.labels(), vec!["0.5–2.5"]);
    }

    #[test]
    fn test_group_assignment() {
        let grouper = standard();

        assert_eq!(grouper.group(0.0), Some(0));
        assert_eq!(grouper.group(5.0), Some(0));
        assert_eq!(grouper.group(18.0), Some(1));
        assert_eq!(grouper.group(64.99), Some(1));
        assert_eq!(grouper.group(65.0), Some(2));
        assert_eq!(grouper.group(-1.0), None);
        assert_eq!(grouper.group(f64::NAN), None);
    }

    #[test]
    fn test_open_ended_group_takes_very_old_users() {
        let grouper = standard();

        assert_eq!(grouper.group(121.0), Some(2));
        assert_eq!(grouper.group(130.0), Some(2));
    }

    #[test]
    fn test_closed_last_group_excludes_upper_edge() {
        let grouper = AgeGrouper::new(AgeBreakpoints::new(vec![0.0, 18.0, 65.0, 100.0]).unwrap());

        assert_eq!(grouper.group(99.9), Some(2));
        assert_eq!(grouper.group(100.0), None);
        assert_eq!(grouper.group(130.0), None);
    }

    #[test]
    fn test_custom_open_ended_threshold() {
        let edges = vec![0.0, 50.0, 90.0];
        let breakpoints = AgeBreakpoints::with_open_ended_above(edges, 80.0).unwrap();
        assert!(breakpoints.is_open_ended());

        let grouper = AgeGrouper::new(breakpoints);
        assert_eq!(grouper.group(95.0), Some(1));
    }

    #[test]
    fn test_group_all_is_repeatable() {
        let grouper = standard();
        let ages = [5.0, 30.0, 40.0, 70.0, -3.0];

        let first = grouper.group_all(&ages);
        assert_eq!(first, vec![Some(0), Some(1), Some(1), Some(2), None]);
        assert_eq!(first, grouper.group_all(&ages));
    }
}
