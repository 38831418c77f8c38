//! Per-user session object and its snapshots.

use crate::report::SecurityReport;
use crate::types::{EnrollmentProfile, EnrollmentProgress, Pose};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Active UI phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Idle,
    Enrolling,
    Scanning,
    Verifying,
    Success,
    Error,
}

impl SessionState {
    /// States during which the camera stream must be live.
    pub fn requires_camera(self) -> bool {
        matches!(
            self,
            SessionState::Enrolling | SessionState::Scanning | SessionState::Verifying
        )
    }

    /// States that show the login form (and accept a submit).
    pub fn shows_form(self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "IDLE",
            SessionState::Enrolling => "ENROLLING",
            SessionState::Scanning => "SCANNING",
            SessionState::Verifying => "VERIFYING",
            SessionState::Success => "SUCCESS",
            SessionState::Error => "ERROR",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cosmetic label shown during scanning. Carries no computational meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubPhase {
    Idle,
    MappingFace,
    CollectingPoints,
    CapturingBiometrics,
    AiComparison,
    IdentityDenied,
}

impl SubPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            SubPhase::Idle => "IDLE",
            SubPhase::MappingFace => "MAPPING_FACE",
            SubPhase::CollectingPoints => "COLLECTING_POINTS",
            SubPhase::CapturingBiometrics => "CAPTURING_BIOMETRICS",
            SubPhase::AiComparison => "AI_COMPARISON",
            SubPhase::IdentityDenied => "IDENTITY_DENIED",
        }
    }
}

impl fmt::Display for SubPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Login form contents.
#[derive(Clone)]
pub struct Credentials {
    pub identifier: String,
    pub pass_phrase: String,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, pass_phrase: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            pass_phrase: pass_phrase.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("pass_phrase", &"<redacted>")
            .finish()
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("{action} is not allowed while {state}")]
    InvalidState {
        state: SessionState,
        action: &'static str,
    },
    #[error("a profile is already enrolled; re-enroll to replace it")]
    ProfileExists,
    #[error("no enrolled profile")]
    MissingProfile,
    #[error("operative identifier is empty")]
    MissingIdentifier,
    #[error("pass phrase is empty")]
    MissingPassPhrase,
}

/// One user's in-memory session. Lost when the process exits.
#[derive(Debug)]
pub struct Session {
    pub(crate) state: SessionState,
    pub(crate) sub_phase: SubPhase,
    pub(crate) progress: u8,
    pub(crate) profile: Option<EnrollmentProfile>,
    pub(crate) enrollment: Option<EnrollmentProgress>,
    pub(crate) report: Option<SecurityReport>,
    pub(crate) operative: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            sub_phase: SubPhase::Idle,
            progress: 0,
            profile: None,
            enrollment: None,
            report: None,
            operative: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn sub_phase(&self) -> SubPhase {
        self.sub_phase
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn profile(&self) -> Option<&EnrollmentProfile> {
        self.profile.as_ref()
    }

    pub fn is_enrolled(&self) -> bool {
        self.profile.is_some()
    }

    pub fn report(&self) -> Option<&SecurityReport> {
        self.report.as_ref()
    }

    /// Identifier of the most recent login attempt.
    pub fn operative(&self) -> Option<&str> {
        self.operative.as_deref()
    }

    /// Pose awaiting capture, while enrolling.
    pub fn pending_pose(&self) -> Option<Pose> {
        self.enrollment.as_ref().map(EnrollmentProgress::pending_pose)
    }

    pub(crate) fn set_phase(&mut self, state: SessionState, sub_phase: SubPhase, progress: u8) {
        self.state = state;
        self.sub_phase = sub_phase;
        self.progress = progress;
    }

    /// Immutable snapshot for rendering.
    pub fn view(&self) -> SessionView {
        SessionView {
            state: self.state,
            sub_phase: self.sub_phase,
            progress: self.progress,
            enrolled: self.profile.is_some(),
            pending_pose: self.pending_pose(),
            report: self.report.clone(),
            operative: self.operative.clone(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of a [`Session`] pushed to the front end.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub state: SessionState,
    pub sub_phase: SubPhase,
    pub progress: u8,
    pub enrolled: bool,
    pub pending_pose: Option<Pose>,
    pub report: Option<SecurityReport>,
    pub operative: Option<String>,
}

/// Notifications emitted by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The session changed phase, sub-phase or progress.
    Phase(SessionView),
    /// A capture produced no frame; the operation was skipped.
    CaptureSkipped { reason: String },
}
