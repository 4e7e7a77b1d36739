//! Presentation surfaces.
//!
//! - `HeadlessDisplay`: no window, never yields keys (CI, servers, SSH)
//! - `OpenCvDisplay`: highgui window with keyboard polling (feature: display-opencv)
//!
//! Showing frames is a side effect only; nothing the loop computes depends on it.

#[cfg(feature = "display-opencv")]
mod window;

use std::time::Duration;

use anyhow::Result;

use crate::frame::Frame;

#[cfg(feature = "display-opencv")]
pub use window::OpenCvDisplay;

/// A window (or lack of one) that shows annotated frames and reports key presses.
pub trait DisplaySurface {
    fn show(&mut self, frame: &Frame) -> Result<()>;

    /// Wait at most `wait` for a key press.
    fn poll_key(&mut self, wait: Duration) -> Result<Option<char>>;

    /// Close any windows. Safe to call more than once.
    fn close(&mut self);
}

impl<V: DisplaySurface + ?Sized> DisplaySurface for Box<V> {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        (**self).show(frame)
    }

    fn poll_key(&mut self, wait: Duration) -> Result<Option<char>> {
        (**self).poll_key(wait)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Surface that shows nothing. Sessions end via Ctrl-C, end of stream or a frame limit.
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    frames_shown: u64,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }
}

impl DisplaySurface for HeadlessDisplay {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        self.frames_shown += 1;
        log::trace!("headless: frame #{} not displayed", frame.sequence);
        Ok(())
    }

    fn poll_key(&mut self, _wait: Duration) -> Result<Option<char>> {
        Ok(None)
    }

    fn close(&mut self) {}
}

/// Open the window requested by the user, falling back to headless when no
/// window backend is compiled in or the window cannot be created.
pub fn open_display(headless: bool, title: &str) -> Box<dyn DisplaySurface> {
    if headless {
        return Box::new(HeadlessDisplay::new());
    }
    #[cfg(feature = "display-opencv")]
    {
        match OpenCvDisplay::open(title) {
            Ok(display) => return Box::new(display),
            Err(err) => log::warn!("failed to open display window: {:#}. Running headless.", err),
        }
    }
    #[cfg(not(feature = "display-opencv"))]
    log::warn!(
        "no window backend compiled in (enable display-opencv); running \"{}\" headless",
        title
    );
    Box::new(HeadlessDisplay::new())
}
