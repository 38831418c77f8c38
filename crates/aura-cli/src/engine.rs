use async_trait::async_trait;
use aura_core::{CaptureError, CapturedImage, FrameSource};
use aura_hw::{Camera, CameraError};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to spawn camera thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Capture parameters for the camera thread.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: u8,
    /// Frames discarded after each open (auto-exposure settling).
    pub warmup_frames: usize,
}

/// Messages sent from the controller to the camera thread.
enum CameraRequest {
    Open {
        reply: oneshot::Sender<Result<(), CameraError>>,
    },
    Capture {
        reply: oneshot::Sender<Result<CapturedImage, CaptureError>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Clone-safe handle to the camera thread.
#[derive(Clone)]
pub struct CameraHandle {
    tx: mpsc::Sender<CameraRequest>,
}

impl CameraHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> CameraRequest,
    ) -> Result<T, CaptureError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| CaptureError::EngineClosed)?;
        reply_rx.await.map_err(|_| CaptureError::EngineClosed)
    }
}

#[async_trait]
impl FrameSource for CameraHandle {
    async fn acquire(&mut self) -> Result<(), CaptureError> {
        self.request(|reply| CameraRequest::Open { reply })
            .await?
            .map_err(|e| CaptureError::Device(e.to_string()))
    }

    async fn capture(&mut self) -> Result<CapturedImage, CaptureError> {
        self.request(|reply| CameraRequest::Capture { reply }).await?
    }

    async fn release(&mut self) {
        if let Err(err) = self.request(|reply| CameraRequest::Close { reply }).await {
            tracing::warn!(error = %err, "camera release not acknowledged");
        }
    }
}

/// Spawn the camera thread. The device stays closed until the first
/// `acquire`.
pub fn spawn_camera_engine(settings: EngineSettings) -> Result<CameraHandle, EngineError> {
    let (tx, mut rx) = mpsc::channel::<CameraRequest>(4);

    std::thread::Builder::new()
        .name("aura-camera".into())
        .spawn(move || {
            tracing::info!(device = %settings.device, "camera thread started");
            let mut camera: Option<Camera> = None;
            while let Some(req) = rx.blocking_recv() {
                match req {
                    CameraRequest::Open { reply } => {
                        let result = if camera.is_some() {
                            Ok(())
                        } else {
                            open_camera(&settings).map(|c| camera = Some(c))
                        };
                        let _ = reply.send(result);
                    }
                    CameraRequest::Capture { reply } => {
                        let result = match &camera {
                            Some(c) => capture_still(c, settings.jpeg_quality),
                            None => Err(CaptureError::NotAcquired),
                        };
                        let _ = reply.send(result);
                    }
                    CameraRequest::Close { reply } => {
                        if camera.take().is_some() {
                            tracing::info!(device = %settings.device, "camera closed");
                        }
                        let _ = reply.send(());
                    }
                }
            }
            tracing::info!("camera thread exiting");
        })?;

    Ok(CameraHandle { tx })
}

fn open_camera(settings: &EngineSettings) -> Result<Camera, CameraError> {
    let camera = Camera::open(&settings.device, settings.width, settings.height)?;
    tracing::info!(
        device = %settings.device,
        width = camera.width,
        height = camera.height,
        fourcc = ?camera.fourcc,
        "camera opened"
    );

    if settings.warmup_frames > 0 {
        tracing::debug!(count = settings.warmup_frames, "discarding warmup frames");
        if let Err(err) = camera.discard_frames(settings.warmup_frames) {
            tracing::warn!(error = %err, "warmup capture failed; continuing");
        }
    }
    Ok(camera)
}

fn capture_still(camera: &Camera, quality: u8) -> Result<CapturedImage, CaptureError> {
    let frame = camera
        .capture_frame()
        .map_err(|e| CaptureError::NoFrame(e.to_string()))?;
    let jpeg = frame
        .to_jpeg(quality)
        .map_err(|e| CaptureError::Encode(e.to_string()))?;
    tracing::debug!(
        seq = frame.sequence,
        width = frame.width,
        height = frame.height,
        bytes = jpeg.len(),
        "still captured"
    );
    Ok(CapturedImage::jpeg(jpeg))
}
