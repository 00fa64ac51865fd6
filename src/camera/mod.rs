//! Frame acquisition and still-image encoding.
//!
//! `VideoSource` abstracts the device so the session loop can run against
//! real V4L2 hardware or a mock source in tests. Encoding produces the exact
//! bytes sent to the inference service; any display mirroring is a renderer
//! concern and never applied here.

pub mod v4l2;

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::error::SessionError;

pub use v4l2::V4l2Source;

/// Pixel layout of a raw frame, as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed YUV 4:2:2, two bytes per pixel.
    Yuyv,
    /// Motion-JPEG: the frame buffer is already a JPEG image.
    Mjpg,
}

/// One raw frame as delivered by a `VideoSource`.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

/// An encoded still image plus the generation it was captured under.
/// Ephemeral: lives only between capture and inference-response handling.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub jpeg: Vec<u8>,
    pub generation: u64,
}

/// A live video device. Exactly one source is held open per session; the
/// session releases it on every exit path.
pub trait VideoSource: Send {
    /// Acquire the device and negotiate the capture format.
    fn open(&mut self) -> Result<(), SessionError>;

    /// Grab one raw frame. Returns `NoFrameAvailable` when the device has
    /// not decoded a frame yet; the caller skips the tick and retries.
    fn grab(&mut self) -> Result<RawFrame, SessionError>;

    /// Release the device. No-op when nothing is held.
    fn close(&mut self);
}

/// Encode a raw frame as JPEG. Deterministic for identical pixel input.
pub fn encode_jpeg(frame: &RawFrame, quality: u8) -> Result<Vec<u8>, SessionError> {
    if frame.width == 0 || frame.height == 0 || frame.data.is_empty() {
        return Err(SessionError::NoFrameAvailable);
    }

    match frame.format {
        PixelFormat::Mjpg => Ok(frame.data.clone()),
        PixelFormat::Yuyv => {
            let rgb = yuyv_to_rgb(frame)?;
            let mut out = Vec::new();
            JpegEncoder::new_with_quality(&mut out, quality)
                .encode(&rgb, frame.width, frame.height, ExtendedColorType::Rgb8)
                .map_err(|err| SessionError::CameraUnavailable(format!("jpeg encode: {err}")))?;
            Ok(out)
        }
    }
}

/// Unpack YUYV (Y0 U Y1 V) into interleaved RGB using BT.601 coefficients.
fn yuyv_to_rgb(frame: &RawFrame) -> Result<Vec<u8>, SessionError> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let needed = width * height * 2;
    if frame.data.len() < needed {
        // Short buffer means the driver handed us a partial frame.
        return Err(SessionError::NoFrameAvailable);
    }

    let mut rgb = Vec::with_capacity(width * height * 3);
    for pair in frame.data[..needed].chunks_exact(4) {
        let (y0, u, y1, v) = (pair[0], pair[1], pair[2], pair[3]);
        for y in [y0, y1] {
            let (r, g, b) = yuv_to_rgb(y, u, v);
            rgb.extend_from_slice(&[r, g, b]);
        }
    }
    Ok(rgb)
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y = f32::from(y);
    let u = f32::from(u) - 128.0;
    let v = f32::from(v) - 128.0;

    let r = y + 1.402 * v;
    let g = y - 0.344_14 * u - 0.714_14 * v;
    let b = y + 1.772 * u;

    let clamp = |value: f32| value.clamp(0.0, 255.0) as u8;
    (clamp(r), clamp(g), clamp(b))
}
