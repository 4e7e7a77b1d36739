//! Frame sources.
//!
//! This module provides the capture side of the detection loop:
//! - `FrameSource`: capability trait (`open`, `read`, `release`)
//! - `SyntheticSource`: deterministic frames for `stub://` devices (testing, demos)
//! - `V4l2Source`: USB/V4L2 webcams (feature: ingest-v4l2)
//!
//! A source is configured once with a device and a requested resolution.
//! `read` returns `Ok(None)` at end of stream; the loop treats a read error the
//! same way and stops without retrying.

#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};

use crate::frame::Frame;

pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

const STUB_SCHEME: &str = "stub://";

/// Capture configuration shared by all sources.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// Device selector: a numeric index (`0`), a device node (`/dev/video2`)
    /// or a synthetic device (`stub://name`).
    pub device: String,
    /// Requested frame width.
    pub width: u32,
    /// Requested frame height.
    pub height: u32,
    /// Requested frame rate. 0 leaves the device default.
    pub target_fps: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            device: "0".to_string(),
            width: 1280,
            height: 720,
            target_fps: 30,
        }
    }
}

impl SourceConfig {
    pub fn is_synthetic(&self) -> bool {
        self.device.starts_with(STUB_SCHEME)
    }

    /// Resolve the device selector to a device node path.
    ///
    /// `0` becomes `/dev/video0`; explicit paths are returned as-is.
    pub fn device_path(&self) -> String {
        match self.device.trim().parse::<u32>() {
            Ok(index) => format!("/dev/video{}", index),
            Err(_) => self.device.clone(),
        }
    }
}

/// Capture statistics.
#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub device: String,
    pub width: u32,
    pub height: u32,
}

/// Video input device.
///
/// Implementations are driven from a single thread: `open` once, `read` until
/// it yields `None` or an error, then `release`.
pub trait FrameSource {
    /// Open the device at the configured resolution.
    fn open(&mut self) -> Result<()>;

    /// Capture the next frame. `Ok(None)` signals end of stream.
    fn read(&mut self) -> Result<Option<Frame>>;

    /// Release the device. Safe to call more than once.
    fn release(&mut self);

    fn stats(&self) -> SourceStats;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        (**self).read()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }
}

/// Build the source matching `config.device`.
///
/// The returned source is not opened yet.
pub fn source_for(config: SourceConfig) -> Result<Box<dyn FrameSource>> {
    if config.width == 0 || config.height == 0 {
        return Err(anyhow!(
            "capture resolution must be non-zero (got {}x{})",
            config.width,
            config.height
        ));
    }
    if config.is_synthetic() {
        return Ok(Box::new(SyntheticSource::new(config)?));
    }
    #[cfg(feature = "ingest-v4l2")]
    {
        Ok(Box::new(V4l2Source::new(config)))
    }
    #[cfg(not(feature = "ingest-v4l2"))]
    {
        Err(anyhow!(
            "camera capture from {} requires the ingest-v4l2 feature",
            config.device_path()
        ))
    }
}
