//! aura-core — Enrollment profile, security reports and the login session
//! state machine.
//!
//! Face comparison itself is delegated to an [`Analyzer`]; frames come from a
//! [`FrameSource`]. Everything here is pure control flow over those two seams.

pub mod capture;
pub mod choreography;
pub mod controller;
pub mod report;
pub mod session;
pub mod types;

pub use capture::{CaptureError, FrameSource};
pub use choreography::{Choreography, ChoreographyError, Step, StepAction};
pub use controller::{Controller, EnrollStep, SubmitOutcome};
pub use report::{AccessStatus, Analyzer, SecurityReport, ThreatLevel};
pub use session::{
    Credentials, Session, SessionError, SessionEvent, SessionState, SessionView, SubPhase,
};
pub use types::{CapturedImage, EnrollmentProfile, EnrollmentProgress, Pose};
