//! Camera seam used by the controller.

use crate::types::CapturedImage;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("camera not acquired")]
    NotAcquired,
    #[error("camera device unavailable: {0}")]
    Device(String),
    #[error("no frame available: {0}")]
    NoFrame(String),
    #[error("frame encoding failed: {0}")]
    Encode(String),
    #[error("camera engine exited")]
    EngineClosed,
}

/// Source of encoded still frames.
///
/// The controller calls [`acquire`](Self::acquire) when entering a state that
/// needs video and [`release`](Self::release) once no such state is active.
#[async_trait]
pub trait FrameSource: Send {
    async fn acquire(&mut self) -> Result<(), CaptureError>;

    /// Rasterize the current frame into a still.
    async fn capture(&mut self) -> Result<CapturedImage, CaptureError>;

    async fn release(&mut self);
}
