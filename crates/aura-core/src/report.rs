use crate::types::{CapturedImage, EnrollmentProfile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message carried by the synthetic report when analysis cannot complete.
pub const LINK_FAILURE_MESSAGE: &str = "Neural comparison link failed. Biological data desync.";

/// Outcome of one verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessStatus {
    Authorized,
    Denied,
}

impl AccessStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessStatus::Authorized => "AUTHORIZED",
            AccessStatus::Denied => "DENIED",
        }
    }
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threat classification attached to a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
}

impl ThreatLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ThreatLevel::Low => "LOW",
            ThreatLevel::Medium => "MEDIUM",
            ThreatLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one analysis call. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityReport {
    pub status: AccessStatus,
    pub message: String,
    pub threat_level: ThreatLevel,
    /// Match score in percent, 0..=100.
    pub biometric_match: f64,
    #[serde(skip, default = "Utc::now")]
    pub produced_at: DateTime<Utc>,
}

impl SecurityReport {
    /// Build a report, clamping the match score into 0..=100.
    ///
    /// Non-finite scores collapse to 0.
    pub fn new(
        status: AccessStatus,
        message: impl Into<String>,
        threat_level: ThreatLevel,
        biometric_match: f64,
    ) -> Self {
        let biometric_match = if biometric_match.is_finite() {
            biometric_match.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            status,
            message: message.into(),
            threat_level,
            biometric_match,
            produced_at: Utc::now(),
        }
    }

    /// Synthetic denial used whenever the analysis call or its parsing fails.
    pub fn link_failure() -> Self {
        Self::new(
            AccessStatus::Denied,
            LINK_FAILURE_MESSAGE,
            ThreatLevel::High,
            0.0,
        )
    }

    pub fn is_authorized(&self) -> bool {
        self.status == AccessStatus::Authorized
    }
}

/// External face comparison.
///
/// Implementations must always return a report: failures are folded into
/// [`SecurityReport::link_failure`] rather than surfaced as errors.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(
        &self,
        identifier: &str,
        scan: &CapturedImage,
        profile: &EnrollmentProfile,
    ) -> SecurityReport;
}
