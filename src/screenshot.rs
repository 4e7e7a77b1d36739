//! Screenshot files for the save key.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use image::ImageFormat;

use crate::frame::Frame;

/// `screenshot_<DD>:<MM>:<YY>-<HH>:<MM>:<SS>.jpg` for the given local time.
pub fn screenshot_file_name(at: NaiveDateTime) -> String {
    format!("screenshot_{}.jpg", at.format("%d:%m:%y-%H:%M:%S"))
}

/// Writes annotated frames as JPEG files into one directory.
#[derive(Clone, Debug)]
pub struct ScreenshotWriter {
    dir: PathBuf,
}

impl ScreenshotWriter {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Save `frame` under a name derived from the current local time.
    pub fn save(&self, frame: &Frame) -> Result<PathBuf> {
        self.save_at(frame, Local::now().naive_local())
    }

    pub fn save_at(&self, frame: &Frame, at: NaiveDateTime) -> Result<PathBuf> {
        let path = self.dir.join(screenshot_file_name(at));
        frame
            .image()
            .save_with_format(&path, ImageFormat::Jpeg)
            .with_context(|| format!("failed to write screenshot {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 4)
            .and_then(|d| d.and_hms_opt(h, m, s))
            .expect("valid timestamp")
    }

    #[test]
    fn file_name_pattern() {
        assert_eq!(
            screenshot_file_name(at(5, 6, 7)),
            "screenshot_04:03:26-05:06:07.jpg"
        );
    }

    #[test]
    fn save_writes_jpeg() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let writer = ScreenshotWriter::new(dir.path());
        let frame = Frame::filled(32, 16, [200, 10, 10], 1);

        let path = writer.save_at(&frame, at(23, 59, 1))?;
        assert!(path.ends_with("screenshot_04:03:26-23:59:01.jpg"));

        let decoded = image::open(&path)?;
        assert_eq!((decoded.width(), decoded.height()), (32, 16));
        Ok(())
    }

    #[test]
    fn missing_directory_reports_error() {
        let writer = ScreenshotWriter::new("/nonexistent/screens");
        let frame = Frame::filled(4, 4, [0, 0, 0], 1);
        assert!(writer.save(&frame).is_err());
    }
}
