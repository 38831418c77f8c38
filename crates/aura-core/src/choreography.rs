//! Scripted scanning sequence.
//!
//! The delays exist only for perceived realism. Modelling them as data keeps
//! the controller free of nested timers and lets tests swap in zero-length
//! holds.

use crate::session::SubPhase;
use std::time::Duration;
use thiserror::Error;

/// Default hold per step, in milliseconds.
pub const DEFAULT_TIMINGS_MS: [u64; 3] = [1000, 1500, 1000];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChoreographyError {
    #[error("choreography must contain exactly one capture step, found {0}")]
    CaptureSteps(usize),
    #[error("progress must not decrease: step {index} goes from {from}% to {to}%")]
    ProgressRegressed { index: usize, from: u8, to: u8 },
    #[error("progress {0}% exceeds 100%")]
    ProgressOutOfRange(u8),
}

/// Side effect attached to a step, run when the step is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    None,
    CaptureFrame,
}

/// One entry of the scanning sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub phase: SubPhase,
    pub progress: u8,
    /// How long the step stays on screen before the next one.
    pub hold: Duration,
    pub action: StepAction,
}

impl Step {
    pub fn new(phase: SubPhase, progress: u8, hold: Duration) -> Self {
        Self {
            phase,
            progress,
            hold,
            action: StepAction::None,
        }
    }

    pub fn with_action(mut self, action: StepAction) -> Self {
        self.action = action;
        self
    }
}

/// Validated, ordered scanning sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choreography {
    steps: Vec<Step>,
}

impl Choreography {
    /// Validate and wrap a step list.
    pub fn new(steps: Vec<Step>) -> Result<Self, ChoreographyError> {
        let captures = steps
            .iter()
            .filter(|s| s.action == StepAction::CaptureFrame)
            .count();
        if captures != 1 {
            return Err(ChoreographyError::CaptureSteps(captures));
        }

        let mut last = 0u8;
        for (index, step) in steps.iter().enumerate() {
            if step.progress > 100 {
                return Err(ChoreographyError::ProgressOutOfRange(step.progress));
            }
            if step.progress < last {
                return Err(ChoreographyError::ProgressRegressed {
                    index,
                    from: last,
                    to: step.progress,
                });
            }
            last = step.progress;
        }

        Ok(Self { steps })
    }

    /// Mapping, point collection, then biometric capture with the given holds.
    pub fn with_timings(holds: [Duration; 3]) -> Self {
        let [mapping, collecting, capturing] = holds;
        Self {
            steps: vec![
                Step::new(SubPhase::MappingFace, 0, mapping),
                Step::new(SubPhase::CollectingPoints, 30, collecting),
                Step::new(SubPhase::CapturingBiometrics, 60, capturing)
                    .with_action(StepAction::CaptureFrame),
            ],
        }
    }

    /// The standard 1000ms / 1500ms / 1000ms sequence.
    pub fn standard() -> Self {
        Self::with_timings(DEFAULT_TIMINGS_MS.map(Duration::from_millis))
    }

    /// Same phases with no delays.
    pub fn instant() -> Self {
        Self::with_timings([Duration::ZERO; 3])
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Sum of all holds.
    pub fn total_duration(&self) -> Duration {
        self.steps.iter().map(|s| s.hold).sum()
    }
}

impl Default for Choreography {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_sequence() {
        let c = Choreography::standard();
        let phases: Vec<SubPhase> = c.steps().iter().map(|s| s.phase).collect();
        assert_eq!(
            phases,
            vec![
                SubPhase::MappingFace,
                SubPhase::CollectingPoints,
                SubPhase::CapturingBiometrics
            ]
        );
        assert_eq!(c.total_duration(), Duration::from_millis(3500));
        assert_eq!(c.steps()[2].action, StepAction::CaptureFrame);
    }

    #[test]
    fn test_standard_passes_validation() {
        let c = Choreography::standard();
        assert_eq!(Choreography::new(c.steps().to_vec()), Ok(c));
    }

    #[test]
    fn test_rejects_missing_capture() {
        let steps = vec![Step::new(SubPhase::MappingFace, 0, Duration::ZERO)];
        assert_eq!(
            Choreography::new(steps),
            Err(ChoreographyError::CaptureSteps(0))
        );
    }

    #[test]
    fn test_rejects_double_capture() {
        let capture = Step::new(SubPhase::CapturingBiometrics, 60, Duration::ZERO)
            .with_action(StepAction::CaptureFrame);
        assert_eq!(
            Choreography::new(vec![capture.clone(), capture]),
            Err(ChoreographyError::CaptureSteps(2))
        );
    }

    #[test]
    fn test_rejects_regressing_progress() {
        let steps = vec![
            Step::new(SubPhase::CollectingPoints, 30, Duration::ZERO),
            Step::new(SubPhase::MappingFace, 10, Duration::ZERO)
                .with_action(StepAction::CaptureFrame),
        ];
        assert_eq!(
            Choreography::new(steps),
            Err(ChoreographyError::ProgressRegressed {
                index: 1,
                from: 30,
                to: 10
            })
        );
    }

    #[test]
    fn test_instant_has_no_delay() {
        assert_eq!(Choreography::instant().total_duration(), Duration::ZERO);
    }
}
