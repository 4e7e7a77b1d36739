//! Synthetic frame source for `stub://` devices.
//!
//! Produces a moving gradient at the configured resolution. A frame limit can
//! be given as a query parameter (`stub://desk?frames=120`) or with
//! `with_frame_limit`, after which `read` reports end of stream.

use anyhow::{anyhow, Context, Result};

use super::{FrameSource, SourceConfig, SourceStats};
use crate::frame::Frame;

pub struct SyntheticSource {
    config: SourceConfig,
    frame_count: u64,
    frame_limit: Option<u64>,
    /// Simulated scene state, shifted every 50 frames.
    scene_state: u8,
    opened: bool,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let frame_limit = parse_frame_limit(&config.device)?;
        Ok(Self {
            config,
            frame_count: 0,
            frame_limit,
            scene_state: 0,
            opened: false,
        })
    }

    /// Report end of stream after `frames` successful reads.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    fn generate_synthetic_pixels(&mut self) -> Vec<u8> {
        let width = self.config.width as usize;
        let height = self.config.height as usize;

        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let shift = self.frame_count as usize + self.scene_state as usize;
        let mut pixels = vec![0u8; width * height * 3];
        for (i, px) in pixels.chunks_exact_mut(3).enumerate() {
            let x = i % width;
            let y = i / width;
            px[0] = ((x + shift) % 256) as u8;
            px[1] = ((y + shift) % 256) as u8;
            px[2] = (((x + y) / 2) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn open(&mut self) -> Result<()> {
        self.opened = true;
        log::info!(
            "SyntheticSource: opened {} ({}x{})",
            self.config.device,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        if !self.opened {
            return Err(anyhow!("synthetic source {} not opened", self.config.device));
        }
        if self
            .frame_limit
            .is_some_and(|limit| self.frame_count >= limit)
        {
            return Ok(None);
        }

        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels();
        let frame = Frame::from_rgb(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        )?;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        if self.opened {
            log::debug!("SyntheticSource: released {}", self.config.device);
        }
        self.opened = false;
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
            width: self.config.width,
            height: self.config.height,
        }
    }
}

fn parse_frame_limit(device: &str) -> Result<Option<u64>> {
    let Some((_, query)) = device.split_once('?') else {
        return Ok(None);
    };
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("frames=") {
            let frames = value
                .parse::<u64>()
                .with_context(|| format!("invalid frame limit in {}", device))?;
            return Ok(Some(frames));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config(device: &str) -> SourceConfig {
        SourceConfig {
            device: device.to_string(),
            width: 32,
            height: 24,
            target_fps: 0,
        }
    }

    #[test]
    fn read_before_open_fails() -> Result<()> {
        let mut source = SyntheticSource::new(stub_config("stub://a"))?;
        assert!(source.read().is_err());
        Ok(())
    }

    #[test]
    fn frame_limit_from_query_ends_stream() -> Result<()> {
        let mut source = SyntheticSource::new(stub_config("stub://a?frames=2"))?;
        source.open()?;
        assert!(source.read()?.is_some());
        assert!(source.read()?.is_some());
        assert!(source.read()?.is_none());
        assert_eq!(source.stats().frames_captured, 2);
        Ok(())
    }

    #[test]
    fn consecutive_frames_differ() -> Result<()> {
        let mut source = SyntheticSource::new(stub_config("stub://a"))?;
        source.open()?;
        let first = source.read()?.ok_or_else(|| anyhow!("no frame"))?;
        let second = source.read()?.ok_or_else(|| anyhow!("no frame"))?;
        assert_ne!(first.pixels(), second.pixels());
        assert_eq!(second.sequence, 2);
        Ok(())
    }

    #[test]
    fn malformed_frame_limit_is_rejected() {
        assert!(SyntheticSource::new(stub_config("stub://a?frames=lots")).is_err());
    }
}
