// Fri Oct 16 2026 - Alex

use crate::memory::Protection;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// How a segment's `p_flags` are compared against the requested protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagMatch {
    /// Every requested bit must be set; extra bits on the segment are fine.
    #[default]
    Subset,
    /// Permission bits must be identical.
    Exact,
}

impl FlagMatch {
    pub fn matches(self, segment: Protection, requested: Protection) -> bool {
        match self {
            Self::Subset => segment.contains(requested),
            Self::Exact => segment == requested,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepDirection {
    #[default]
    Forward,
    Backward,
}

/// Order in which the program header table is walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentStep {
    pub direction: StepDirection,
    pub stride: NonZeroUsize,
}

impl SegmentStep {
    pub const FORWARD: Self = Self { direction: StepDirection::Forward, stride: NonZeroUsize::MIN };
    pub const BACKWARD: Self = Self { direction: StepDirection::Backward, stride: NonZeroUsize::MIN };

    pub fn new(direction: StepDirection, stride: NonZeroUsize) -> Self {
        Self { direction, stride }
    }

    /// Table indices visited for a table of `len` entries.
    pub fn indices(self, len: usize) -> impl Iterator<Item = usize> {
        let backward = self.direction == StepDirection::Backward;
        (0..len)
            .step_by(self.stride.get())
            .map(move |i| if backward { len - 1 - i } else { i })
    }
}

impl Default for SegmentStep {
    fn default() -> Self {
        Self::FORWARD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_indices() {
        let collect = |step: SegmentStep, len| step.indices(len).collect::<Vec<_>>();
        let two = NonZeroUsize::new(2).unwrap();

        assert_eq!(collect(SegmentStep::FORWARD, 4), vec![0, 1, 2, 3]);
        assert_eq!(collect(SegmentStep::BACKWARD, 4), vec![3, 2, 1, 0]);
        assert_eq!(collect(SegmentStep::new(StepDirection::Forward, two), 5), vec![0, 2, 4]);
        assert_eq!(collect(SegmentStep::new(StepDirection::Backward, two), 5), vec![4, 2, 0]);
        assert!(collect(SegmentStep::BACKWARD, 0).is_empty());
    }

    #[test]
    fn test_flag_match_policies() {
        let rx = Protection::READ_EXECUTE;
        assert!(FlagMatch::Subset.matches(rx, Protection::EXECUTE));
        assert!(FlagMatch::Subset.matches(rx, rx));
        assert!(!FlagMatch::Subset.matches(rx, Protection::WRITE));
        assert!(FlagMatch::Exact.matches(rx, rx));
        assert!(!FlagMatch::Exact.matches(rx, Protection::READ));
    }
}
