use serde::{Deserialize, Serialize};
use std::fmt;

/// MIME type of every still produced by the capture path.
pub const JPEG_MIME: &str = "image/jpeg";

/// Head pose requested for one enrollment capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Pose {
    Frontal,
    Left,
    Right,
}

impl Pose {
    /// Capture order for enrollment.
    pub const SEQUENCE: [Pose; 3] = [Pose::Frontal, Pose::Left, Pose::Right];

    /// Instruction shown to the operator while this pose is pending.
    pub fn prompt(self) -> &'static str {
        match self {
            Pose::Frontal => "LOOK STRAIGHT INTO CAMERA",
            Pose::Left => "TURN SLIGHTLY LEFT",
            Pose::Right => "TURN SLIGHTLY RIGHT",
        }
    }

    /// Role label used for this reference image in analysis requests.
    pub fn label(self) -> &'static str {
        match self {
            Pose::Frontal => "FRONT",
            Pose::Left => "LEFT",
            Pose::Right => "RIGHT",
        }
    }

    /// Pose following this one, or `None` after the last.
    pub fn next(self) -> Option<Pose> {
        match self {
            Pose::Frontal => Some(Pose::Left),
            Pose::Left => Some(Pose::Right),
            Pose::Right => None,
        }
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One encoded still frame (JPEG in practice).
#[derive(Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl CapturedImage {
    pub fn jpeg(data: Vec<u8>) -> Self {
        Self {
            mime_type: JPEG_MIME.to_string(),
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// Image payloads can be hundreds of KB; never dump them into logs.
impl fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedImage")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Three reference images of the enrolled operative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentProfile {
    pub frontal: CapturedImage,
    pub left: CapturedImage,
    pub right: CapturedImage,
}

impl EnrollmentProfile {
    /// Reference image for a pose.
    pub fn image(&self, pose: Pose) -> &CapturedImage {
        match pose {
            Pose::Frontal => &self.frontal,
            Pose::Left => &self.left,
            Pose::Right => &self.right,
        }
    }

    /// References in capture order, paired with their pose.
    pub fn references(&self) -> impl Iterator<Item = (Pose, &CapturedImage)> {
        Pose::SEQUENCE.into_iter().map(move |pose| (pose, self.image(pose)))
    }
}

/// Accumulates enrollment captures until all three poses are present.
#[derive(Debug, Clone, Default)]
pub struct EnrollmentProgress {
    frontal: Option<CapturedImage>,
    left: Option<CapturedImage>,
}

impl EnrollmentProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pose the next capture will be stored as.
    pub fn pending_pose(&self) -> Pose {
        match (&self.frontal, &self.left) {
            (None, _) => Pose::Frontal,
            (Some(_), None) => Pose::Left,
            (Some(_), Some(_)) => Pose::Right,
        }
    }

    /// Number of poses captured so far.
    pub fn captured(&self) -> usize {
        usize::from(self.frontal.is_some()) + usize::from(self.left.is_some())
    }

    /// Store `image` as the pending pose.
    ///
    /// Returns the finished profile on the third capture; `self` is consumed
    /// into it and left empty.
    pub fn record(&mut self, image: CapturedImage) -> Option<EnrollmentProfile> {
        match self.pending_pose() {
            Pose::Frontal => {
                self.frontal = Some(image);
                None
            }
            Pose::Left => {
                self.left = Some(image);
                None
            }
            Pose::Right => {
                let frontal = self.frontal.take()?;
                let left = self.left.take()?;
                Some(EnrollmentProfile {
                    frontal,
                    left,
                    right: image,
                })
            }
        }
    }
}
