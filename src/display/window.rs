use std::time::Duration;

use anyhow::{Context, Result};
use opencv::core::{Mat, Scalar, CV_8UC3};
use opencv::highgui;
use opencv::prelude::*;

use super::DisplaySurface;
use crate::frame::Frame;

/// highgui window. Frames are converted from RGB to OpenCV's BGR order.
pub struct OpenCvDisplay {
    title: String,
    canvas: Mat,
    open: bool,
}

impl OpenCvDisplay {
    pub fn open(title: &str) -> Result<Self> {
        highgui::named_window(title, highgui::WINDOW_AUTOSIZE)
            .with_context(|| format!("failed to create window \"{}\"", title))?;
        Ok(Self {
            title: title.to_string(),
            canvas: Mat::default(),
            open: true,
        })
    }

    fn upload(&mut self, frame: &Frame) -> Result<()> {
        let (rows, cols) = (frame.height() as i32, frame.width() as i32);
        if self.canvas.rows() != rows || self.canvas.cols() != cols {
            self.canvas =
                Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::all(0.0))
                    .context("allocate display buffer")?;
        }
        let dst = self.canvas.data_bytes_mut().context("map display buffer")?;
        for (bgr, rgb) in dst.chunks_exact_mut(3).zip(frame.pixels().chunks_exact(3)) {
            bgr[0] = rgb[2];
            bgr[1] = rgb[1];
            bgr[2] = rgb[0];
        }
        Ok(())
    }
}

impl DisplaySurface for OpenCvDisplay {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        self.upload(frame)?;
        highgui::imshow(&self.title, &self.canvas).context("imshow failed")?;
        Ok(())
    }

    fn poll_key(&mut self, wait: Duration) -> Result<Option<char>> {
        let key = highgui::wait_key(wait_millis(wait)).context("wait_key failed")?;
        if key < 0 {
            return Ok(None);
        }
        Ok(Some(((key & 0xFF) as u8) as char))
    }

    fn close(&mut self) {
        if self.open {
            if let Err(err) = highgui::destroy_all_windows() {
                log::warn!("failed to close window \"{}\": {}", self.title, err);
            }
            self.open = false;
        }
    }
}

/// `wait_key` delay in milliseconds; 0 would block until a key arrives.
fn wait_millis(wait: Duration) -> i32 {
    i32::try_from(wait.as_millis()).unwrap_or(i32::MAX).max(1)
}

impl Drop for OpenCvDisplay {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_is_at_least_one_millisecond_and_saturates() {
        assert_eq!(wait_millis(Duration::ZERO), 1);
        assert_eq!(wait_millis(Duration::from_millis(30)), 30);
        assert_eq!(wait_millis(Duration::from_secs(u64::MAX)), i32::MAX);
    }
}
