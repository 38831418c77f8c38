//! Frame type, YUYV to RGB conversion and JPEG encoding.

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

/// JPEG quality used for stills sent to analysis.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Pixel layout of [`Frame::data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLayout {
    /// Packed 8-bit RGB (width * height * 3 bytes).
    Rgb,
    /// 8-bit grayscale (width * height bytes).
    Luma,
    /// Already-compressed JPEG (MJPG camera output).
    Jpeg,
}

/// A captured camera frame.
#[derive(Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub layout: FrameLayout,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

impl Frame {
    /// Encode the frame as a JPEG still.
    ///
    /// MJPG frames are passed through untouched.
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, FrameError> {
        let color = match self.layout {
            FrameLayout::Jpeg => {
                if self.data.is_empty() {
                    return Err(FrameError::Empty);
                }
                return Ok(self.data.clone());
            }
            FrameLayout::Rgb => ExtendedColorType::Rgb8,
            FrameLayout::Luma => ExtendedColorType::L8,
        };

        let expected = self.expected_len();
        if self.data.len() < expected {
            return Err(FrameError::InvalidLength {
                expected,
                actual: self.data.len(),
            });
        }

        let mut out = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
            encoder
                .encode(&self.data[..expected], self.width, self.height, color)
                .map_err(|e| FrameError::Encode(e.to_string()))?;
        }
        Ok(out)
    }

    fn expected_len(&self) -> usize {
        let pixels = self.width as usize * self.height as usize;
        match self.layout {
            FrameLayout::Rgb => pixels * 3,
            FrameLayout::Luma => pixels,
            FrameLayout::Jpeg => 0,
        }
    }
}

/// Convert packed YUYV (4:2:2) to RGB using BT.601 limited-range coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share U/V.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = width as usize * height as usize * 2;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for quad in yuyv[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (quad[0], quad[1], quad[2], quad[3]);
        rgb.extend_from_slice(&yuv_to_rgb(y0, u, v));
        rgb.extend_from_slice(&yuv_to_rgb(y1, u, v));
    }
    Ok(rgb)
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = i32::from(y) - 16;
    let d = i32::from(u) - 128;
    let e = i32::from(v) - 128;
    let clamp = |x: i32| (x >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e + 128),
        clamp(298 * c - 100 * d - 208 * e + 128),
        clamp(298 * c + 516 * d + 128),
    ]
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("empty frame")]
    Empty,
    #[error("JPEG encoding failed: {0}")]
    Encode(String),
}
