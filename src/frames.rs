//! Timestep selection for single frames and animations.
//!
//! A [`FrameSequencer`] describes which timesteps an animation visits; each
//! call to [`FrameSequencer::frames`] hands out a fresh [`Frames`] iterator
//! starting from [`SequenceState::Idle`].

use crate::error::{AggregationError, Result};
use serde::Serialize;
use std::fmt;
use std::iter::FusedIterator;
use tracing::{info, warn};

/// A requested single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameIndex {
    /// A concrete timestep index.
    At(usize),
    /// Whatever the last available timestep is.
    Last,
}

impl Default for FrameIndex {
    fn default() -> Self {
        FrameIndex::At(0)
    }
}

impl TryFrom<i64> for FrameIndex {
    type Error = AggregationError;

    /// `-1` selects the last frame; other negative values are rejected.
    fn try_from(requested: i64) -> Result<Self> {
        match requested {
            -1 => Ok(FrameIndex::Last),
            n if n >= 0 => Ok(FrameIndex::At(n as usize)),
            _ => Err(AggregationError::InvalidFrameIndex { requested }),
        }
    }
}

impl FrameIndex {
    /// Concrete index within a series of `len` timesteps.
    ///
    /// Out-of-range requests are an error, never clamped.
    pub fn resolve(self, len: usize) -> Result<usize> {
        match self {
            FrameIndex::At(index) if index < len => Ok(index),
            FrameIndex::At(index) => Err(AggregationError::IndexOutOfRange { index, len }),
            FrameIndex::Last if len > 0 => Ok(len - 1),
            FrameIndex::Last => Err(AggregationError::IndexOutOfRange { index: 0, len }),
        }
    }
}

/// Single frame or animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    Single(FrameIndex),
    Animated { stride: usize },
}

impl Default for FrameMode {
    fn default() -> Self {
        FrameMode::Single(FrameIndex::default())
    }
}

/// Degraded-but-defined sequencing conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SequenceWarning {
    /// Stride longer than the series; only the first and last frame are shown.
    StrideExceedsSeriesLength { stride: usize, len: usize },
}

impl fmt::Display for SequenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceWarning::StrideExceedsSeriesLength { stride, len } => write!(
                f,
                "Stride {} exceeds the {} available timesteps; showing first and last frame",
                stride, len
            ),
        }
    }
}

/// Progress of a [`Frames`] iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    Idle,
    Sequencing,
    Exhausted,
}

/// Animation frame plan over a series of `len` timesteps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSequencer {
    len: usize,
    stride: usize,
    warning: Option<SequenceWarning>,
}

impl FrameSequencer {
    /// Plan frames `0, stride, 2 * stride, ...` below `len`.
    ///
    /// A stride larger than `len` falls back to the first and last frame
    /// and records a [`SequenceWarning`].
    pub fn new(len: usize, stride: usize) -> Result<Self> {
        if stride == 0 {
            return Err(AggregationError::InvalidStride);
        }

        let warning = (stride > len).then(|| {
            let warning = SequenceWarning::StrideExceedsSeriesLength { stride, len };
            warn!("{}", warning);
            warning
        });

        Ok(Self {
            len,
            stride,
            warning,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn warning(&self) -> Option<SequenceWarning> {
        self.warning
    }

    /// Distance between produced indices.
    fn step(&self) -> usize {
        if self.warning.is_some() {
            self.len.saturating_sub(1)
        } else {
            self.stride
        }
    }

    /// A fresh sequence starting at timestep 0.
    pub fn frames(&self) -> Frames {
        Frames {
            len: self.len,
            step: self.step(),
            cursor: 0,
            state: SequenceState::Idle,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames().len()
    }
}

/// Lazy, finite sequence of timestep indices.
#[derive(Debug, Clone)]
pub struct Frames {
    len: usize,
    step: usize,
    cursor: usize,
    state: SequenceState,
}

impl Frames {
    pub fn state(&self) -> SequenceState {
        self.state
    }

    fn remaining(&self) -> usize {
        match self.state {
            SequenceState::Exhausted => 0,
            _ if self.len == 0 => 0,
            _ if self.step == 0 => 1,
            _ => (self.len - 1 - self.cursor) / self.step + 1,
        }
    }
}

impl Iterator for Frames {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.state == SequenceState::Exhausted || self.len == 0 {
            self.state = SequenceState::Exhausted;
            return None;
        }

        let current = self.cursor;
        let following = match self.step {
            0 => None,
            step => current.checked_add(step).filter(|&n| n < self.len),
        };

        match following {
            Some(n) => {
                self.cursor = n;
                self.state = SequenceState::Sequencing;
            }
            None => self.state = SequenceState::Exhausted,
        }

        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Frames {}

impl FusedIterator for Frames {}

/// Timesteps to render for `mode`, plus any sequencing warning.
pub fn select_frames(
    mode: FrameMode,
    len: usize,
) -> Result<(Vec<usize>, Option<SequenceWarning>)> {
    match mode {
        FrameMode::Single(index) => Ok((vec![index.resolve(len)?], None)),
        FrameMode::Animated { stride } => {
            let sequencer = FrameSequencer::new(len, stride)?;
            info!(
                "Animating {} frames out of {} timesteps",
                sequencer.frame_count(),
                len
            );
            Ok((sequencer.frames().collect(), sequencer.warning()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_index_from_i64() {
        assert_eq!(FrameIndex::try_from(0_i64), Ok(FrameIndex::At(0)));
        assert_eq!(FrameIndex::try_from(12_i64), Ok(FrameIndex::At(12)));
        assert_eq!(FrameIndex::try_from(-1_i64), Ok(FrameIndex::Last));
        assert_eq!(
            FrameIndex::try_from(-2_i64),
            Err(AggregationError::InvalidFrameIndex { requested: -2 })
        );
    }

    #[test]
    fn test_single_frame_resolution() {
        assert_eq!(FrameIndex::default().resolve(5), Ok(0));
        assert_eq!(FrameIndex::Last.resolve(5), Ok(4));
        assert_eq!(FrameIndex::At(4).resolve(5), Ok(4));
        assert_eq!(
            FrameIndex::At(5).resolve(5),
            Err(AggregationError::IndexOutOfRange { index: 5, len: 5 })
        );
        assert!(FrameIndex::Last.resolve(0).is_err());
    }

    #[test]
    fn test_stride_one_visits_every_timestep() {
        let sequencer = FrameSequencer::new(6, 1).unwrap();
        let frames: Vec<_> = sequencer.frames().collect();

        assert_eq!(frames, vec![0, 1, 2, 3, 4, 5]);
        assert!(sequencer.warning().is_none());
    }

    #[test]
    fn test_stride_skips_frames() {
        let sequencer = FrameSequencer::new(10, 3).unwrap();
        assert_eq!(sequencer.frames().collect::<Vec<_>>(), vec![0, 3, 6, 9]);

        let sequencer = FrameSequencer::new(10, 4).unwrap();
        assert_eq!(sequencer.frames().collect::<Vec<_>>(), vec![0, 4, 8]);
        assert_eq!(sequencer.frame_count(), 3);
    }

    #[test]
    fn test_stride_equal_to_length_yields_first_frame() {
        let sequencer = FrameSequencer::new(5, 5).unwrap();
        assert_eq!(sequencer.frames().collect::<Vec<_>>(), vec![0]);
        assert!(sequencer.warning().is_none());
    }

    #[test]
    fn test_stride_exceeding_length_falls_back_to_first_and_last() {
        let sequencer = FrameSequencer::new(5, 8).unwrap();

        assert_eq!(sequencer.frames().collect::<Vec<_>>(), vec![0, 4]);
        let expected = SequenceWarning::StrideExceedsSeriesLength { stride: 8, len: 5 };
        assert_eq!(sequencer.warning(), Some(expected));
    }

    #[test]
    fn test_fallback_with_single_timestep() {
        let sequencer = FrameSequencer::new(1, 3).unwrap();
        assert_eq!(sequencer.frames().collect::<Vec<_>>(), vec![0]);
        assert!(sequencer.warning().is_some());
    }

    #[test]
    fn test_zero_stride_is_rejected() {
        assert_eq!(
            FrameSequencer::new(5, 0),
            Err(AggregationError::InvalidStride)
        );
    }

    #[test]
    fn test_state_transitions() {
        let sequencer = FrameSequencer::new(3, 2).unwrap();
        let mut frames = sequencer.frames();

        assert_eq!(frames.state(), SequenceState::Idle);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames.next(), Some(0));
        assert_eq!(frames.state(), SequenceState::Sequencing);
        assert_eq!(frames.next(), Some(2));
        assert_eq!(frames.state(), SequenceState::Exhausted);
        assert_eq!(frames.next(), None);
        assert_eq!(frames.next(), None);
        assert_eq!(frames.len(), 0);

        // a new invocation restarts
        let mut restarted = sequencer.frames();
        assert_eq!(restarted.state(), SequenceState::Idle);
        assert_eq!(restarted.next(), Some(0));
    }

    #[test]
    fn test_empty_series_produces_nothing() {
        let sequencer = FrameSequencer::new(0, 1).unwrap();
        let mut frames = sequencer.frames();

        assert_eq!(frames.next(), None);
        assert_eq!(frames.state(), SequenceState::Exhausted);
    }

    #[test]
    fn test_select_frames() {
        let (frames, warning) = select_frames(FrameMode::default(), 4).unwrap();
        assert_eq!(frames, vec![0]);
        assert!(warning.is_none());

        let (frames, _) = select_frames(FrameMode::Single(FrameIndex::Last), 4).unwrap();
        assert_eq!(frames, vec![3]);

        let (frames, warning) = select_frames(FrameMode::Animated { stride: 9 }, 4).unwrap();
        assert_eq!(frames, vec![0, 3]);
        assert!(warning.is_some());

        let past_end = FrameMode::Single(FrameIndex::At(4));
        assert!(select_frames(past_end, 4).is_err());
    }

    #[test]
    fn test_fallback_warning_is_handed_to_the_caller() {
        let (_, warning) = select_frames(FrameMode::Animated { stride: 6 }, 3).unwrap();
        let warning = warning.unwrap();

        assert_eq!(
            warning.to_string(),
            "Stride 6 exceeds the 3 available timesteps; showing first and last frame"
        );
    }
}
