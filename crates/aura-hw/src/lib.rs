//! aura-hw — Hardware abstraction for webcam capture.
//!
//! Provides V4L2-based camera access and rasterization of raw frames into
//! JPEG stills.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, PixelFormat};
pub use frame::{Frame, FrameError, FrameLayout};
