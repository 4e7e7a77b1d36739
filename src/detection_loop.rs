//! The interactive detection loop.
//!
//! One thread, one frame at a time:
//!
//! 1. Read a frame from the `FrameSource` (none or an error ends the session)
//! 2. Run the `Detector` at the current confidence threshold
//! 3. Count people versus other objects, skipping excluded classes
//! 4. Draw the HUD onto the annotated copy and show it
//! 5. Poll the keyboard briefly and apply the command
//!
//! The loop is `RUNNING` after `initialize` and becomes `STOPPED` on the quit
//! key, end of stream, an interrupt or the optional frame limit. Errors from
//! the detector or the display propagate to the caller; a failed screenshot is
//! logged and the loop carries on.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::detect::Detector;
use crate::display::DisplaySurface;
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::overlay::{draw_hud, HudStats};
use crate::screenshot::ScreenshotWriter;
use crate::session::{
    ClassFilter, ConfidenceThreshold, Effect, ObjectCounts, SessionState, SessionSummary,
    StopReason,
};

const DEFAULT_START_DELAY: Duration = Duration::from_secs(2);
const DEFAULT_KEY_WAIT: Duration = Duration::from_millis(1);

/// Tunables of one session.
#[derive(Clone, Debug)]
pub struct LoopSettings {
    pub initial_threshold: ConfidenceThreshold,
    pub class_filter: ClassFilter,
    pub screenshot_dir: PathBuf,
    /// Pause between the instruction banner and the first frame.
    pub start_delay: Duration,
    /// Stop after this many processed frames.
    pub max_frames: Option<u64>,
    /// Upper bound on the per-frame keyboard wait.
    pub key_wait: Duration,
    pub show_instructions: bool,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            initial_threshold: ConfidenceThreshold::default(),
            class_filter: ClassFilter::default(),
            screenshot_dir: PathBuf::from("."),
            start_delay: DEFAULT_START_DELAY,
            max_frames: None,
            key_wait: DEFAULT_KEY_WAIT,
            show_instructions: true,
        }
    }
}

/// Result of a single `step`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Stopped(StopReason),
}

pub struct DetectionLoop<S, D, V> {
    source: S,
    detector: D,
    display: V,
    settings: LoopSettings,
    screenshots: ScreenshotWriter,
    state: SessionState,
    interrupt: Option<Arc<AtomicBool>>,
    stop_reason: Option<StopReason>,
}

impl<S, D, V> DetectionLoop<S, D, V>
where
    S: FrameSource,
    D: Detector,
    V: DisplaySurface,
{
    /// Open the source, warm the detector up and start the session clock.
    ///
    /// A source that cannot be opened is fatal; the loop is never entered.
    pub fn initialize(
        mut source: S,
        mut detector: D,
        display: V,
        settings: LoopSettings,
    ) -> Result<Self> {
        source.open().context("Could not open camera")?;
        if let Err(err) = detector.warm_up() {
            source.release();
            return Err(err.context(format!("detector {} failed to warm up", detector.name())));
        }

        let stats = source.stats();
        log::info!(
            "camera {} opened ({}x{}), detector {} ready",
            stats.device,
            stats.width,
            stats.height,
            detector.name()
        );

        if settings.show_instructions {
            print_instructions(&settings);
        }
        if !settings.start_delay.is_zero() {
            std::thread::sleep(settings.start_delay);
        }

        Ok(Self {
            source,
            detector,
            display,
            screenshots: ScreenshotWriter::new(settings.screenshot_dir.clone()),
            state: SessionState::new(settings.initial_threshold),
            settings,
            interrupt: None,
            stop_reason: None,
        })
    }

    /// Stop gracefully once `flag` becomes true (e.g. set from a Ctrl-C handler).
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn display(&self) -> &V {
        &self.display
    }

    pub fn is_running(&self) -> bool {
        self.stop_reason.is_none()
    }

    /// Process one frame. Calling `step` after the loop stopped is a no-op.
    pub fn step(&mut self) -> Result<StepOutcome> {
        if let Some(reason) = self.stop_reason {
            return Ok(StepOutcome::Stopped(reason));
        }
        if self
            .interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
        {
            return Ok(self.stop(StopReason::Interrupted));
        }
        if self
            .settings
            .max_frames
            .is_some_and(|limit| self.state.frame_count >= limit)
        {
            return Ok(self.stop(StopReason::FrameLimit));
        }

        let frame = match self.source.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::error!("failed to read frame from camera: end of stream");
                return Ok(self.stop(StopReason::EndOfStream));
            }
            Err(err) => {
                log::error!("failed to read frame from camera: {:#}", err);
                return Ok(self.stop(StopReason::EndOfStream));
            }
        };

        let threshold = self.state.threshold.value();
        let inference = self
            .detector
            .infer(&frame, threshold)
            .with_context(|| format!("detection failed on frame #{}", frame.sequence))?;

        let counts = ObjectCounts::tally(&inference.detections, &self.settings.class_filter);
        let fps = self.state.record_frame(counts, self.state.elapsed());

        let mut annotated = inference.annotated;
        draw_hud(
            &mut annotated,
            &HudStats {
                fps,
                people: counts.people,
                objects: counts.objects,
                confidence_threshold: threshold,
            },
        );
        self.display.show(&annotated)?;

        if let Some(key) = self.display.poll_key(self.settings.key_wait)? {
            match self.state.apply_key(key) {
                Effect::None => {}
                Effect::Stop => log::info!("quitting..."),
                Effect::SaveScreenshot => self.save_screenshot(&annotated),
                Effect::ThresholdChanged(value) => {
                    log::info!("confidence threshold set to {:.2}", value)
                }
            }
        }

        if !self.state.running {
            return Ok(self.stop(StopReason::QuitKey));
        }
        Ok(StepOutcome::Continue)
    }

    /// Step until the session stops.
    pub fn run(&mut self) -> Result<StopReason> {
        loop {
            match self.step() {
                Ok(StepOutcome::Continue) => {}
                Ok(StepOutcome::Stopped(reason)) => return Ok(reason),
                Err(err) => {
                    self.stop(StopReason::Failed);
                    return Err(err);
                }
            }
        }
    }

    /// Release the source, close the display and report final statistics.
    pub fn shutdown(mut self) -> SessionSummary {
        self.source.release();
        self.display.close();

        let summary = SessionSummary {
            frames: self.state.frame_count,
            elapsed: self.state.elapsed(),
            average_fps: self.state.last_fps,
            final_threshold: self.state.threshold.value(),
            screenshots_saved: self.state.screenshots_saved,
            stop_reason: self.stop_reason.unwrap_or(StopReason::Failed),
        };
        log::info!(
            "session finished: {} frames, {:.1} fps average, stop reason {:?}",
            summary.frames,
            summary.average_fps,
            summary.stop_reason
        );
        summary
    }

    fn stop(&mut self, reason: StopReason) -> StepOutcome {
        self.state.running = false;
        self.stop_reason = Some(reason);
        StepOutcome::Stopped(reason)
    }

    fn save_screenshot(&mut self, annotated: &Frame) {
        match self.screenshots.save(annotated) {
            Ok(path) => {
                self.state.screenshots_saved += 1;
                log::info!("screenshot saved as {}", path.display());
            }
            Err(err) => {
                self.state.screenshot_failures += 1;
                log::error!("{:#}", err);
            }
        }
    }
}

fn print_instructions(settings: &LoopSettings) {
    println!();
    println!("Instructions:");
    println!("   - Press 'Q' to quit");
    println!("   - Press 'S' to save a screenshot");
    println!("   - Press '+' to increase confidence threshold");
    println!("   - Press '-' to decrease confidence threshold");
    if !settings.start_delay.is_zero() {
        println!();
        println!(
            "Starting detection in {} seconds...",
            settings.start_delay.as_secs_f32()
        );
    }
}
