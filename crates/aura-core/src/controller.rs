//! Enrollment and login state machine.
//!
//! The controller owns the camera and analyzer; the [`Session`] it drives is
//! passed in by `&mut` so its lifetime follows the user session, not the
//! controller.

use crate::capture::FrameSource;
use crate::choreography::{Choreography, StepAction};
use crate::report::{Analyzer, SecurityReport};
use crate::session::{Credentials, Session, SessionError, SessionEvent, SessionState, SubPhase};
use crate::types::{CapturedImage, EnrollmentProgress, Pose};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Progress shown once the scan is handed to the analyzer.
const COMPARISON_PROGRESS: u8 = 80;
const COMPLETE_PROGRESS: u8 = 100;

/// Result of one enrollment capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollStep {
    /// No frame was available; nothing changed.
    Skipped,
    /// Stored a capture; the given pose is next.
    Advanced(Pose),
    /// Third capture stored; the profile is complete.
    Completed,
}

/// Result of a login submit that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Authorized(SecurityReport),
    Denied(SecurityReport),
    /// The live frame could not be captured; the session was restored to its
    /// pre-submit state.
    Aborted,
}

/// Session fields restored when a submit is aborted.
struct PriorPhase {
    state: SessionState,
    sub_phase: SubPhase,
    progress: u8,
    report: Option<SecurityReport>,
    operative: Option<String>,
}

impl PriorPhase {
    fn take(session: &mut Session) -> Self {
        Self {
            state: session.state,
            sub_phase: session.sub_phase,
            progress: session.progress,
            report: session.report.take(),
            operative: session.operative.clone(),
        }
    }

    fn restore(self, session: &mut Session) {
        session.set_phase(self.state, self.sub_phase, self.progress);
        session.report = self.report;
        session.operative = self.operative;
    }
}

pub struct Controller<F, A> {
    camera: F,
    analyzer: A,
    choreography: Choreography,
    camera_held: bool,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl<F: FrameSource, A: Analyzer> Controller<F, A> {
    pub fn new(camera: F, analyzer: A, choreography: Choreography) -> Self {
        Self {
            camera,
            analyzer,
            choreography,
            camera_held: false,
            events: None,
        }
    }

    /// Stream every phase change to the returned receiver.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    pub fn camera(&self) -> &F {
        &self.camera
    }

    pub fn analyzer(&self) -> &A {
        &self.analyzer
    }

    pub fn choreography(&self) -> &Choreography {
        &self.choreography
    }

    /// Whether the camera stream is currently acquired.
    pub fn camera_held(&self) -> bool {
        self.camera_held
    }

    /// Start capturing a profile. Only allowed while nothing is enrolled.
    pub async fn begin_enrollment(&mut self, session: &mut Session) -> Result<(), SessionError> {
        Self::require_form(session, "enrollment")?;
        if session.profile.is_some() {
            return Err(SessionError::ProfileExists);
        }
        self.start_enrollment(session).await;
        Ok(())
    }

    /// Discard the current profile and start a fresh capture sequence.
    pub async fn reenroll(&mut self, session: &mut Session) -> Result<(), SessionError> {
        Self::require_form(session, "re-enrollment")?;
        if session.profile.take().is_some() {
            tracing::info!("enrolled profile discarded for re-enrollment");
        }
        self.start_enrollment(session).await;
        Ok(())
    }

    /// Drop the enrolled profile without starting a capture sequence.
    pub fn discard_profile(&mut self, session: &mut Session) -> Result<(), SessionError> {
        Self::require_form(session, "profile removal")?;
        if session.profile.take().is_none() {
            return Err(SessionError::MissingProfile);
        }
        tracing::info!("enrolled profile discarded");
        self.emit(session);
        Ok(())
    }

    async fn start_enrollment(&mut self, session: &mut Session) {
        session.enrollment = Some(EnrollmentProgress::new());
        session.report = None;
        session.set_phase(SessionState::Enrolling, SubPhase::Idle, 0);
        self.sync_camera(session.state).await;
        tracing::info!(pose = %Pose::Frontal, "enrollment started");
        self.emit(session);
    }

    /// Capture the pending pose.
    ///
    /// A missing frame is a tolerated no-op: the pose does not advance.
    pub async fn capture_enrollment(
        &mut self,
        session: &mut Session,
    ) -> Result<EnrollStep, SessionError> {
        if session.state != SessionState::Enrolling {
            return Err(SessionError::InvalidState {
                state: session.state,
                action: "enrollment capture",
            });
        }

        let image = match self.camera.capture().await {
            Ok(image) => image,
            Err(err) => {
                tracing::debug!(error = %err, "enrollment capture skipped");
                self.notify(SessionEvent::CaptureSkipped {
                    reason: err.to_string(),
                });
                return Ok(EnrollStep::Skipped);
            }
        };

        let progress = session.enrollment.get_or_insert_with(EnrollmentProgress::new);
        let pose = progress.pending_pose();
        let step = match progress.record(image) {
            Some(profile) => {
                session.profile = Some(profile);
                session.enrollment = None;
                session.set_phase(SessionState::Idle, SubPhase::Idle, 0);
                self.sync_camera(session.state).await;
                tracing::info!("enrollment complete");
                EnrollStep::Completed
            }
            None => {
                let next = progress.pending_pose();
                tracing::info!(captured = %pose, next = %next, "enrollment pose captured");
                EnrollStep::Advanced(next)
            }
        };
        self.emit(session);
        Ok(step)
    }

    /// Leave enrollment, discarding partial captures.
    pub async fn cancel_enrollment(&mut self, session: &mut Session) -> Result<(), SessionError> {
        if session.state != SessionState::Enrolling {
            return Err(SessionError::InvalidState {
                state: session.state,
                action: "enrollment cancel",
            });
        }
        session.enrollment = None;
        session.set_phase(SessionState::Idle, SubPhase::Idle, 0);
        self.sync_camera(session.state).await;
        tracing::info!("enrollment cancelled");
        self.emit(session);
        Ok(())
    }

    /// Run one login attempt: choreography, live capture, analysis.
    ///
    /// Validation failures leave the session untouched. Once validation
    /// passes, a [`SecurityReport`] is always attached before the session
    /// leaves `Verifying`.
    pub async fn submit(
        &mut self,
        session: &mut Session,
        credentials: &Credentials,
    ) -> Result<SubmitOutcome, SessionError> {
        Self::require_form(session, "submit")?;
        let identifier = credentials.identifier.trim();
        if identifier.is_empty() {
            return Err(SessionError::MissingIdentifier);
        }
        if credentials.pass_phrase.is_empty() {
            return Err(SessionError::MissingPassPhrase);
        }
        if session.profile.is_none() {
            return Err(SessionError::MissingProfile);
        }

        let attempt = Uuid::new_v4();
        let prior = PriorPhase::take(session);
        session.operative = Some(identifier.to_string());
        tracing::info!(%attempt, operative = identifier, "login submitted");

        let Some(scan) = self.run_choreography(session, attempt).await else {
            prior.restore(session);
            self.sync_camera(session.state).await;
            self.emit(session);
            return Ok(SubmitOutcome::Aborted);
        };

        session.set_phase(
            SessionState::Verifying,
            SubPhase::AiComparison,
            COMPARISON_PROGRESS,
        );
        self.sync_camera(session.state).await;
        self.emit(session);

        let report = match session.profile.as_ref() {
            Some(profile) => self.analyzer.analyze(identifier, &scan, profile).await,
            None => SecurityReport::link_failure(),
        };
        tracing::info!(
            %attempt,
            status = %report.status,
            threat = %report.threat_level,
            match_pct = report.biometric_match,
            "analysis complete"
        );

        session.report = Some(report.clone());
        let outcome = if report.is_authorized() {
            session.set_phase(SessionState::Success, SubPhase::AiComparison, COMPLETE_PROGRESS);
            SubmitOutcome::Authorized(report)
        } else {
            session.set_phase(SessionState::Error, SubPhase::IdentityDenied, COMPLETE_PROGRESS);
            SubmitOutcome::Denied(report)
        };
        self.sync_camera(session.state).await;
        self.emit(session);
        Ok(outcome)
    }

    /// Play the scanning steps. Returns `None` if the live capture failed.
    async fn run_choreography(
        &mut self,
        session: &mut Session,
        attempt: Uuid,
    ) -> Option<CapturedImage> {
        let steps = self.choreography.steps().to_vec();
        let mut scan = None;

        for step in steps {
            session.set_phase(SessionState::Scanning, step.phase, step.progress);
            self.sync_camera(session.state).await;
            self.emit(session);

            if step.action == StepAction::CaptureFrame {
                match self.camera.capture().await {
                    Ok(image) => {
                        tracing::debug!(%attempt, bytes = image.len(), "scan frame captured");
                        scan = Some(image);
                    }
                    Err(err) => {
                        tracing::warn!(%attempt, error = %err, "scan capture failed; attempt aborted");
                        self.notify(SessionEvent::CaptureSkipped {
                            reason: err.to_string(),
                        });
                        return None;
                    }
                }
            }

            if !step.hold.is_zero() {
                tokio::time::sleep(step.hold).await;
            }
        }

        scan
    }

    /// Return from the success screen to the form, clearing the report.
    pub async fn sign_out(&mut self, session: &mut Session) -> Result<(), SessionError> {
        if session.state != SessionState::Success {
            return Err(SessionError::InvalidState {
                state: session.state,
                action: "sign-out",
            });
        }
        session.report = None;
        session.operative = None;
        session.set_phase(SessionState::Idle, SubPhase::Idle, 0);
        self.sync_camera(session.state).await;
        tracing::info!("signed out");
        self.emit(session);
        Ok(())
    }

    /// Release the camera if it is still held. Call before dropping.
    pub async fn shutdown(&mut self) {
        if self.camera_held {
            self.camera.release().await;
            self.camera_held = false;
        }
    }

    fn require_form(session: &Session, action: &'static str) -> Result<(), SessionError> {
        if session.state.shows_form() {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                state: session.state,
                action,
            })
        }
    }

    /// Acquire the camera on entering a capture state, release it on leaving
    /// the last one.
    async fn sync_camera(&mut self, state: SessionState) {
        let wanted = state.requires_camera();
        if wanted && !self.camera_held {
            match self.camera.acquire().await {
                Ok(()) => {
                    self.camera_held = true;
                    tracing::debug!(%state, "camera acquired");
                }
                Err(err) => {
                    tracing::warn!(%state, error = %err, "camera unavailable; continuing without video");
                }
            }
        } else if !wanted && self.camera_held {
            self.camera.release().await;
            self.camera_held = false;
            tracing::debug!(%state, "camera released");
        }
    }

    fn emit(&self, session: &Session) {
        tracing::debug!(
            state = %session.state,
            sub_phase = %session.sub_phase,
            progress = session.progress,
            "phase"
        );
        self.notify(SessionEvent::Phase(session.view()));
    }

    fn notify(&self, event: SessionEvent) {
        if let Some(tx) = &self.events {
            // Receiver gone means nobody is rendering; not an error.
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureError;
    use crate::report::{AccessStatus, ThreatLevel, LINK_FAILURE_MESSAGE};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct ScriptedCamera {
        /// Consumed front to back; once empty every capture succeeds.
        script: VecDeque<bool>,
        fail_acquire: bool,
        held: bool,
        acquired: usize,
        released: usize,
        captures: u8,
    }

    impl ScriptedCamera {
        fn failing_on(script: &[bool]) -> Self {
            Self {
                script: script.iter().copied().collect(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl FrameSource for ScriptedCamera {
        async fn acquire(&mut self) -> Result<(), CaptureError> {
            if self.fail_acquire {
                return Err(CaptureError::Device("permission denied".into()));
            }
            self.held = true;
            self.acquired += 1;
            Ok(())
        }

        async fn capture(&mut self) -> Result<CapturedImage, CaptureError> {
            if !self.held {
                return Err(CaptureError::NotAcquired);
            }
            if self.script.pop_front() == Some(false) {
                return Err(CaptureError::NoFrame("scripted".into()));
            }
            self.captures += 1;
            Ok(CapturedImage::jpeg(vec![0xFF, 0xD8, self.captures]))
        }

        async fn release(&mut self) {
            self.held = false;
            self.released += 1;
        }
    }

    struct StaticAnalyzer {
        report: SecurityReport,
        seen: Mutex<Vec<(String, CapturedImage)>>,
    }

    impl StaticAnalyzer {
        fn new(report: SecurityReport) -> Self {
            Self {
                report,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Analyzer for StaticAnalyzer {
        async fn analyze(
            &self,
            identifier: &str,
            scan: &CapturedImage,
            _profile: &crate::types::EnrollmentProfile,
        ) -> SecurityReport {
            self.seen
                .lock()
                .unwrap()
                .push((identifier.to_string(), scan.clone()));
            self.report.clone()
        }
    }

    fn authorized() -> SecurityReport {
        SecurityReport::new(AccessStatus::Authorized, "Match confirmed", ThreatLevel::Low, 97.0)
    }

    fn controller(
        camera: ScriptedCamera,
        report: SecurityReport,
    ) -> Controller<ScriptedCamera, StaticAnalyzer> {
        Controller::new(camera, StaticAnalyzer::new(report), Choreography::instant())
    }

    async fn enroll(ctrl: &mut Controller<ScriptedCamera, StaticAnalyzer>, session: &mut Session) {
        ctrl.begin_enrollment(session).await.unwrap();
        for _ in 0..3 {
            ctrl.capture_enrollment(session).await.unwrap();
        }
        assert!(session.is_enrolled());
    }

    fn creds() -> Credentials {
        Credentials::new("operative-7", "neural-pass")
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn test_enrollment_visits_poses_in_order() {
        let mut ctrl = controller(ScriptedCamera::default(), authorized());
        let mut session = Session::new();

        ctrl.begin_enrollment(&mut session).await.unwrap();
        assert_eq!(session.state(), SessionState::Enrolling);
        assert_eq!(session.pending_pose(), Some(Pose::Frontal));
        assert!(ctrl.camera_held());

        assert_eq!(
            ctrl.capture_enrollment(&mut session).await.unwrap(),
            EnrollStep::Advanced(Pose::Left)
        );
        assert_eq!(
            ctrl.capture_enrollment(&mut session).await.unwrap(),
            EnrollStep::Advanced(Pose::Right)
        );
        assert!(!session.is_enrolled());
        assert_eq!(
            ctrl.capture_enrollment(&mut session).await.unwrap(),
            EnrollStep::Completed
        );

        assert_eq!(session.state(), SessionState::Idle);
        let profile = session.profile().unwrap();
        assert_eq!(profile.frontal.data[2], 1);
        assert_eq!(profile.left.data[2], 2);
        assert_eq!(profile.right.data[2], 3);
        assert!(!ctrl.camera_held());
        assert_eq!(ctrl.camera().released, 1);
    }

    #[tokio::test]
    async fn test_enrollment_capture_failure_is_noop() {
        let mut ctrl = controller(ScriptedCamera::failing_on(&[false]), authorized());
        let mut rx = ctrl.subscribe();
        let mut session = Session::new();
        ctrl.begin_enrollment(&mut session).await.unwrap();
        drain(&mut rx);

        assert_eq!(
            ctrl.capture_enrollment(&mut session).await.unwrap(),
            EnrollStep::Skipped
        );
        assert_eq!(session.state(), SessionState::Enrolling);
        assert_eq!(session.pending_pose(), Some(Pose::Frontal));
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [SessionEvent::CaptureSkipped { .. }]
        ));

        // Exactly three successful captures are still required.
        for _ in 0..2 {
            ctrl.capture_enrollment(&mut session).await.unwrap();
        }
        assert!(!session.is_enrolled());
        ctrl.capture_enrollment(&mut session).await.unwrap();
        assert!(session.is_enrolled());
    }

    #[tokio::test]
    async fn test_enrollment_rejected_when_profile_exists() {
        let mut ctrl = controller(ScriptedCamera::default(), authorized());
        let mut session = Session::new();
        enroll(&mut ctrl, &mut session).await;

        assert_eq!(
            ctrl.begin_enrollment(&mut session).await,
            Err(SessionError::ProfileExists)
        );
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_reenroll_discards_profile_before_capturing() {
        let mut ctrl = controller(ScriptedCamera::default(), authorized());
        let mut session = Session::new();
        enroll(&mut ctrl, &mut session).await;

        ctrl.reenroll(&mut session).await.unwrap();
        assert!(!session.is_enrolled());
        assert_eq!(session.state(), SessionState::Enrolling);
        assert_eq!(session.pending_pose(), Some(Pose::Frontal));

        for _ in 0..3 {
            ctrl.capture_enrollment(&mut session).await.unwrap();
        }
        let profile = session.profile().unwrap();
        // Fresh captures 4..=6, nothing carried over from the first profile.
        assert_eq!(profile.frontal.data[2], 4);
        assert_eq!(profile.right.data[2], 6);
    }

    #[tokio::test]
    async fn test_cancel_enrollment_drops_partial_captures() {
        let mut ctrl = controller(ScriptedCamera::default(), authorized());
        let mut session = Session::new();
        ctrl.begin_enrollment(&mut session).await.unwrap();
        ctrl.capture_enrollment(&mut session).await.unwrap();

        ctrl.cancel_enrollment(&mut session).await.unwrap();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.pending_pose().is_none());
        assert!(!session.is_enrolled());
        assert!(!ctrl.camera_held());
    }

    #[tokio::test]
    async fn test_discard_profile() {
        let mut ctrl = controller(ScriptedCamera::default(), authorized());
        let mut session = Session::new();
        assert_eq!(
            ctrl.discard_profile(&mut session),
            Err(SessionError::MissingProfile)
        );
        enroll(&mut ctrl, &mut session).await;
        ctrl.discard_profile(&mut session).unwrap();
        assert!(!session.is_enrolled());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_submit_empty_identifier_has_no_effect() {
        let mut ctrl = controller(ScriptedCamera::default(), authorized());
        let mut session = Session::new();
        enroll(&mut ctrl, &mut session).await;
        let mut rx = ctrl.subscribe();

        let result = ctrl
            .submit(&mut session, &Credentials::new("", "neural-pass"))
            .await;
        assert_eq!(result, Err(SessionError::MissingIdentifier));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(ctrl.analyzer().calls(), 0);

        let result = ctrl
            .submit(&mut session, &Credentials::new(" \t ", "neural-pass"))
            .await;
        assert_eq!(result, Err(SessionError::MissingIdentifier));
        assert_eq!(session.operative(), None);
        assert_eq!(ctrl.analyzer().calls(), 0);
    }

    #[tokio::test]
    async fn test_submit_rejects_missing_pass_phrase_and_profile() {
        let mut ctrl = controller(ScriptedCamera::default(), authorized());
        let mut session = Session::new();

        assert_eq!(
            ctrl.submit(&mut session, &creds()).await,
            Err(SessionError::MissingProfile)
        );
        enroll(&mut ctrl, &mut session).await;
        assert_eq!(
            ctrl.submit(&mut session, &Credentials::new("operative-7", ""))
                .await,
            Err(SessionError::MissingPassPhrase)
        );
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(ctrl.analyzer().calls(), 0);
    }

    #[tokio::test]
    async fn test_authorized_report_reaches_success() {
        let report = SecurityReport::new(AccessStatus::Authorized, "", ThreatLevel::Low, 97.0);
        let mut ctrl = controller(ScriptedCamera::default(), report);
        let mut session = Session::new();
        enroll(&mut ctrl, &mut session).await;

        let outcome = ctrl.submit(&mut session, &creds()).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Authorized(_)));
        assert_eq!(session.state(), SessionState::Success);
        assert_eq!(session.progress(), 100);
        assert_eq!(session.report().unwrap().biometric_match, 97.0);
        assert_eq!(session.operative(), Some("operative-7"));
        assert!(!ctrl.camera_held());

        let seen = ctrl.analyzer().seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "operative-7");
        // Fourth capture of the session is the live scan.
        assert_eq!(seen[0].1.data[2], 4);
    }

    #[tokio::test]
    async fn test_padded_identifier_recorded_trimmed() {
        let mut ctrl = controller(ScriptedCamera::default(), authorized());
        let mut session = Session::new();
        enroll(&mut ctrl, &mut session).await;

        ctrl.submit(&mut session, &Credentials::new("  operative-7 ", "neural-pass"))
            .await
            .unwrap();
        assert_eq!(session.operative(), Some("operative-7"));
        assert_eq!(ctrl.analyzer().seen.lock().unwrap()[0].0, "operative-7");
    }

    #[tokio::test]
    async fn test_denied_report_message_surfaced_verbatim() {
        let report = SecurityReport::new(AccessStatus::Denied, "Face mismatch", ThreatLevel::High, 0.0);
        let mut ctrl = controller(ScriptedCamera::default(), report);
        let mut session = Session::new();
        enroll(&mut ctrl, &mut session).await;

        let outcome = ctrl.submit(&mut session, &creds()).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Denied(_)));
        assert_eq!(session.state(), SessionState::Error);
        assert_eq!(session.sub_phase(), SubPhase::IdentityDenied);
        assert_eq!(session.report().unwrap().message, "Face mismatch");
    }

    #[tokio::test]
    async fn test_link_failure_lands_in_error() {
        let mut ctrl = controller(ScriptedCamera::default(), SecurityReport::link_failure());
        let mut session = Session::new();
        enroll(&mut ctrl, &mut session).await;

        ctrl.submit(&mut session, &creds()).await.unwrap();
        assert_eq!(session.state(), SessionState::Error);
        let report = session.report().unwrap();
        assert_eq!(report.message, LINK_FAILURE_MESSAGE);
        assert_eq!(report.biometric_match, 0.0);
    }

    #[tokio::test]
    async fn test_resubmit_from_error() {
        let denied = SecurityReport::new(AccessStatus::Denied, "Face mismatch", ThreatLevel::High, 12.0);
        let mut ctrl = controller(ScriptedCamera::default(), denied);
        let mut session = Session::new();
        enroll(&mut ctrl, &mut session).await;

        ctrl.submit(&mut session, &creds()).await.unwrap();
        assert_eq!(session.state(), SessionState::Error);
        ctrl.submit(&mut session, &creds()).await.unwrap();
        assert_eq!(session.state(), SessionState::Error);
        assert_eq!(ctrl.analyzer().calls(), 2);
    }

    #[tokio::test]
    async fn test_phase_sequence_and_report_before_leaving_verifying() {
        let mut ctrl = controller(ScriptedCamera::default(), authorized());
        let mut session = Session::new();
        enroll(&mut ctrl, &mut session).await;
        let mut rx = ctrl.subscribe();

        ctrl.submit(&mut session, &creds()).await.unwrap();

        let phases: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|ev| match ev {
                SessionEvent::Phase(v) => Some(v),
                _ => None,
            })
            .collect();
        let summary: Vec<_> = phases
            .iter()
            .map(|v| (v.state, v.sub_phase, v.progress))
            .collect();
        assert_eq!(
            summary,
            vec![
                (SessionState::Scanning, SubPhase::MappingFace, 0),
                (SessionState::Scanning, SubPhase::CollectingPoints, 30),
                (SessionState::Scanning, SubPhase::CapturingBiometrics, 60),
                (SessionState::Verifying, SubPhase::AiComparison, 80),
                (SessionState::Success, SubPhase::AiComparison, 100),
            ]
        );
        // Report is discarded when the attempt starts and attached on exit.
        assert!(phases[0].report.is_none());
        assert!(phases[3].report.is_none());
        assert!(phases[4].report.is_some());
    }

    #[tokio::test]
    async fn test_scan_capture_failure_restores_prior_state() {
        let denied = SecurityReport::new(AccessStatus::Denied, "Face mismatch", ThreatLevel::High, 5.0);
        // Three enrollment captures, a good scan, then a failed scan.
        let camera = ScriptedCamera::failing_on(&[true, true, true, true, false]);
        let mut ctrl = controller(camera, denied);
        let mut session = Session::new();
        enroll(&mut ctrl, &mut session).await;
        ctrl.submit(&mut session, &creds()).await.unwrap();
        assert_eq!(session.state(), SessionState::Error);

        let outcome = ctrl
            .submit(&mut session, &Credentials::new("someone-else", "pw"))
            .await
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::Aborted);
        assert_eq!(session.state(), SessionState::Error);
        assert_eq!(session.sub_phase(), SubPhase::IdentityDenied);
        assert_eq!(session.report().unwrap().message, "Face mismatch");
        assert_eq!(session.operative(), Some("operative-7"));
        assert!(!ctrl.camera_held());
        assert_eq!(ctrl.analyzer().calls(), 1);
    }

    #[tokio::test]
    async fn test_camera_unavailable_aborts_submit() {
        let mut ctrl = controller(ScriptedCamera::default(), authorized());
        let mut session = Session::new();
        enroll(&mut ctrl, &mut session).await;
        ctrl.camera.fail_acquire = true;

        let outcome = ctrl.submit(&mut session, &creds()).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Aborted);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.report().is_none());
    }

    #[tokio::test]
    async fn test_sign_out_clears_report() {
        let mut ctrl = controller(ScriptedCamera::default(), authorized());
        let mut session = Session::new();
        enroll(&mut ctrl, &mut session).await;
        ctrl.submit(&mut session, &creds()).await.unwrap();

        ctrl.sign_out(&mut session).await.unwrap();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.report().is_none());
        assert!(session.is_enrolled());

        assert!(matches!(
            ctrl.sign_out(&mut session).await,
            Err(SessionError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_camera_lifecycle_follows_states() {
        let mut ctrl = controller(ScriptedCamera::default(), authorized());
        let mut session = Session::new();
        enroll(&mut ctrl, &mut session).await;
        assert_eq!(ctrl.camera().acquired, 1);
        assert_eq!(ctrl.camera().released, 1);

        // Scanning and Verifying share one acquisition.
        ctrl.submit(&mut session, &creds()).await.unwrap();
        assert_eq!(ctrl.camera().acquired, 2);
        assert_eq!(ctrl.camera().released, 2);
        assert!(!ctrl.camera().held);
    }

    #[tokio::test(start_paused = true)]
    async fn test_standard_choreography_paces_in_virtual_time() {
        let mut ctrl = Controller::new(
            ScriptedCamera::default(),
            StaticAnalyzer::new(authorized()),
            Choreography::standard(),
        );
        let mut session = Session::new();
        enroll(&mut ctrl, &mut session).await;

        let start = tokio::time::Instant::now();
        ctrl.submit(&mut session, &creds()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(3500));
        assert_eq!(session.state(), SessionState::Success);
    }
}
