//! V4L2-backed video source.

use log::info;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::config::CaptureConfig;
use crate::error::SessionError;

use super::{PixelFormat, RawFrame, VideoSource};

/// Video source over /dev/videoN. Prefers MJPG (frames arrive JPEG-encoded
/// already) and falls back to YUYV.
pub struct V4l2Source {
    index: u32,
    width: u32,
    height: u32,
    device: Option<(Device, PixelFormat, u32, u32)>,
}

impl V4l2Source {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            index: config.device_index,
            width: config.width,
            height: config.height,
            device: None,
        }
    }
}

impl VideoSource for V4l2Source {
    fn open(&mut self) -> Result<(), SessionError> {
        if self.device.is_some() {
            return Ok(());
        }

        let device = Device::new(self.index as usize)
            .map_err(|err| SessionError::CameraUnavailable(format!("open: {err}")))?;

        let mut fmt = device
            .format()
            .map_err(|err| SessionError::CameraUnavailable(format!("query format: {err}")))?;
        fmt.width = self.width;
        fmt.height = self.height;

        // The driver answers with the nearest format it actually supports.
        fmt.fourcc = FourCC::new(b"MJPG");
        let mut actual = device
            .set_format(&fmt)
            .map_err(|err| SessionError::CameraUnavailable(format!("set format: {err}")))?;
        if actual.fourcc.repr != *b"MJPG" {
            fmt.fourcc = FourCC::new(b"YUYV");
            actual = device
                .set_format(&fmt)
                .map_err(|err| SessionError::CameraUnavailable(format!("set format: {err}")))?;
        }

        let format = match &actual.fourcc.repr {
            b"MJPG" => PixelFormat::Mjpg,
            b"YUYV" => PixelFormat::Yuyv,
            _ => {
                return Err(SessionError::CameraUnavailable(format!(
                    "unsupported pixel format {}",
                    actual.fourcc
                )))
            }
        };

        info!(
            "camera {} open: {}x{} {}",
            self.index, actual.width, actual.height, actual.fourcc
        );
        self.device = Some((device, format, actual.width, actual.height));
        Ok(())
    }

    fn grab(&mut self) -> Result<RawFrame, SessionError> {
        let (device, format, width, height) = self
            .device
            .as_ref()
            .ok_or_else(|| SessionError::CameraUnavailable("source not open".into()))?;

        let mut stream = Stream::with_buffers(device, Type::VideoCapture, 2)
            .map_err(|err| SessionError::CameraUnavailable(format!("stream: {err}")))?;

        // The first buffer after stream-on can be empty while the sensor
        // settles; skip empty buffers and keep the first real frame.
        for _ in 0..2 {
            let (buf, meta) = stream
                .next()
                .map_err(|err| SessionError::CameraUnavailable(format!("dequeue: {err}")))?;
            let used = meta.bytesused as usize;
            if used == 0 {
                continue;
            }
            let data = buf[..used.min(buf.len())].to_vec();
            return Ok(RawFrame {
                width: *width,
                height: *height,
                format: *format,
                data,
            });
        }

        Err(SessionError::NoFrameAvailable)
    }

    fn close(&mut self) {
        if self.device.take().is_some() {
            info!("camera {} released", self.index);
        }
    }
}
