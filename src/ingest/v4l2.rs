//! V4L2 webcam source.
//!
//! Opens a local device node (e.g. /dev/video0), negotiates the requested
//! resolution and captures frames through an mmap buffer stream. Frames in
//! YUYV or NV12 are converted to RGB24 before they leave this module.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::{FrameSource, SourceConfig, SourceStats};
use crate::frame::Frame;

const STREAM_BUFFERS: u32 = 4;
const READ_TIMEOUT: Duration = Duration::from_secs(5);

pub struct V4l2Source {
    config: SourceConfig,
    state: Option<DeviceState>,
    frame_count: u64,
    active_width: u32,
    active_height: u32,
    pixel_format: PixelFormat,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            frame_count: 0,
            pixel_format: PixelFormat::Rgb24,
        }
    }
}

impl FrameSource for V4l2Source {
    fn open(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let path = self.config.device_path();
        let mut device = v4l::Device::with_path(&path)
            .with_context(|| format!("could not open camera {}", path))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Source: failed to set format on {}: {}", path, err);
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("V4l2Source: failed to set fps on {}: {}", path, err);
            }
        }

        self.pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr)
            .with_context(|| format!("camera {} negotiated an unusable format", path))?;
        self.active_width = format.width;
        self.active_height = format.height;
        if (self.active_width, self.active_height) != (self.config.width, self.config.height) {
            log::warn!(
                "V4l2Source: requested {}x{}, device gave {}x{}",
                self.config.width,
                self.config.height,
                self.active_width,
                self.active_height
            );
        }

        let state = DeviceStateTryBuilder {
            device,
            stream_builder: |device| -> Result<_> {
                let mut stream = v4l::prelude::MmapStream::with_buffers(
                    device,
                    Type::VideoCapture,
                    STREAM_BUFFERS,
                )
                .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))?;
                // A stalled camera surfaces as a read error instead of blocking forever.
                stream.set_timeout(READ_TIMEOUT);
                Ok(stream)
            },
        }
        .try_build()?;
        self.state = Some(state);

        log::info!(
            "V4l2Source: opened {} ({}x{}, {:?})",
            path,
            self.active_width,
            self.active_height,
            self.pixel_format
        );
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let state = self
            .state
            .as_mut()
            .ok_or_else(|| anyhow!("v4l2 device not opened"))?;
        let (width, height, format) = (self.active_width, self.active_height, self.pixel_format);
        let pixels = state.with_mut(|fields| -> Result<Vec<u8>> {
            let (buf, _meta) = fields.stream.next().context("capture v4l2 frame")?;
            normalize_to_rgb(buf, width, height, format)
        })?;

        self.frame_count += 1;
        Frame::from_rgb(pixels, width, height, self.frame_count).map(Some)
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!("V4l2Source: released {}", self.config.device_path());
        }
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            device: self.config.device_path(),
            width: self.active_width,
            height: self.active_height,
        }
    }
}

impl Drop for V4l2Source {
    fn drop(&mut self) {
        self.release();
    }
}
