//! Session state and the pure rules of the detection loop.
//!
//! Nothing in here touches a camera, a model or a window: the loop feeds
//! frame results and key presses in, and reads counts and the threshold out.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use crate::detect::Detection;

/// Class id the detector uses for people.
pub const PERSON_CLASS_ID: u32 = 0;

/// Threshold bounds and step, in hundredths.
const MIN_CONFIDENCE_PCT: u32 = 10;
const MAX_CONFIDENCE_PCT: u32 = 90;
const CONFIDENCE_STEP_PCT: u32 = 5;
const DEFAULT_CONFIDENCE_PCT: u32 = 60;
/// Slack for f32 representation error when scaling to hundredths.
const HUNDREDTHS_TOLERANCE: f32 = 1e-3;

pub const MIN_CONFIDENCE: f32 = MIN_CONFIDENCE_PCT as f32 / 100.0;
pub const MAX_CONFIDENCE: f32 = MAX_CONFIDENCE_PCT as f32 / 100.0;
pub const DEFAULT_CONFIDENCE: f32 = DEFAULT_CONFIDENCE_PCT as f32 / 100.0;

/// Confidence threshold in `[0.10, 0.90]`, stored as whole hundredths so that
/// repeated ±0.05 steps land exactly on the bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConfidenceThreshold {
    hundredths: u32,
}

impl ConfidenceThreshold {
    /// Accepts whole hundredths within the bounds.
    pub fn new(value: f32) -> Result<Self> {
        if !value.is_finite() {
            return Err(anyhow!("confidence threshold must be a number"));
        }
        if !(MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&value) {
            return Err(anyhow!(
                "confidence threshold {} outside [{:.2}, {:.2}]",
                value,
                MIN_CONFIDENCE,
                MAX_CONFIDENCE
            ));
        }
        let scaled = value * 100.0;
        let hundredths = scaled.round();
        if (scaled - hundredths).abs() > HUNDREDTHS_TOLERANCE {
            return Err(anyhow!(
                "confidence threshold {} must be a multiple of 0.01",
                value
            ));
        }
        Ok(Self {
            hundredths: hundredths as u32,
        })
    }

    pub fn value(&self) -> f32 {
        self.hundredths as f32 / 100.0
    }

    /// One step up, clamped at the upper bound.
    pub fn increased(self) -> Self {
        Self {
            hundredths: (self.hundredths + CONFIDENCE_STEP_PCT).min(MAX_CONFIDENCE_PCT),
        }
    }

    /// One step down, clamped at the lower bound.
    pub fn decreased(self) -> Self {
        Self {
            hundredths: self
                .hundredths
                .saturating_sub(CONFIDENCE_STEP_PCT)
                .max(MIN_CONFIDENCE_PCT),
        }
    }
}

impl Default for ConfidenceThreshold {
    fn default() -> Self {
        Self {
            hundredths: DEFAULT_CONFIDENCE_PCT,
        }
    }
}

/// Keyboard commands understood by the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Quit,
    Screenshot,
    IncreaseConfidence,
    DecreaseConfidence,
}

impl Command {
    /// Map a key press to a command. Letters are case-insensitive; `=` and `_`
    /// alias `+` and `-` so the unshifted keys work too.
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'q' => Some(Command::Quit),
            's' => Some(Command::Screenshot),
            '+' | '=' => Some(Command::IncreaseConfidence),
            '-' | '_' => Some(Command::DecreaseConfidence),
            _ => None,
        }
    }
}

/// What the loop has to do after a command was applied to the state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Effect {
    None,
    Stop,
    SaveScreenshot,
    ThresholdChanged(f32),
}

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    QuitKey,
    EndOfStream,
    Interrupted,
    FrameLimit,
    /// Unrecoverable error inside the loop body.
    Failed,
}

/// Class ids ignored when counting. Empty unless configured.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassFilter {
    excluded: BTreeSet<u32>,
}

impl ClassFilter {
    pub fn new<I: IntoIterator<Item = u32>>(excluded: I) -> Self {
        Self {
            excluded: excluded.into_iter().collect(),
        }
    }

    pub fn is_excluded(&self, class_id: u32) -> bool {
        self.excluded.contains(&class_id)
    }

    pub fn excluded(&self) -> impl Iterator<Item = u32> + '_ {
        self.excluded.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.excluded.is_empty()
    }
}

/// Per-frame tally of people versus everything else.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObjectCounts {
    pub people: usize,
    pub objects: usize,
}

impl ObjectCounts {
    pub fn tally(detections: &[Detection], filter: &ClassFilter) -> Self {
        detections
            .iter()
            .filter(|det| !filter.is_excluded(det.class_id))
            .fold(Self::default(), |mut counts, det| {
                if det.class_id == PERSON_CLASS_ID {
                    counts.people += 1;
                } else {
                    counts.objects += 1;
                }
                counts
            })
    }

    pub fn total(&self) -> usize {
        self.people + self.objects
    }
}

/// Frames per second; zero when no time has elapsed.
pub fn throughput(frames: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        frames as f64 / secs
    } else {
        0.0
    }
}

/// Mutable state owned by one detection session.
#[derive(Clone, Debug)]
pub struct SessionState {
    pub threshold: ConfidenceThreshold,
    pub frame_count: u64,
    pub running: bool,
    pub screenshots_saved: u64,
    pub screenshot_failures: u64,
    /// Throughput measured at the last processed frame.
    pub last_fps: f64,
    pub last_counts: ObjectCounts,
    started: Instant,
}

impl SessionState {
    pub fn new(threshold: ConfidenceThreshold) -> Self {
        Self {
            threshold,
            frame_count: 0,
            running: true,
            screenshots_saved: 0,
            screenshot_failures: 0,
            last_fps: 0.0,
            last_counts: ObjectCounts::default(),
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Account for one processed frame and return the updated throughput.
    pub fn record_frame(&mut self, counts: ObjectCounts, elapsed: Duration) -> f64 {
        self.frame_count += 1;
        self.last_counts = counts;
        self.last_fps = throughput(self.frame_count, elapsed);
        self.last_fps
    }

    pub fn apply(&mut self, command: Command) -> Effect {
        match command {
            Command::Quit => {
                self.running = false;
                Effect::Stop
            }
            Command::Screenshot => Effect::SaveScreenshot,
            Command::IncreaseConfidence => {
                self.threshold = self.threshold.increased();
                Effect::ThresholdChanged(self.threshold.value())
            }
            Command::DecreaseConfidence => {
                self.threshold = self.threshold.decreased();
                Effect::ThresholdChanged(self.threshold.value())
            }
        }
    }

    /// Apply a raw key press; unknown keys are ignored.
    pub fn apply_key(&mut self, key: char) -> Effect {
        Command::from_key(key).map_or(Effect::None, |command| self.apply(command))
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(ConfidenceThreshold::default())
    }
}

/// Final statistics of a finished session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSummary {
    pub frames: u64,
    pub elapsed: Duration,
    pub average_fps: f64,
    pub final_threshold: f32,
    pub screenshots_saved: u64,
    pub stop_reason: StopReason,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn det(class_id: u32) -> Detection {
        Detection {
            class_id,
            class_name: String::new(),
            confidence: 0.9,
            bbox: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
        }
    }

    #[test]
    fn six_increases_reach_upper_bound_and_clamp() {
        let mut state = SessionState::default();
        for _ in 0..6 {
            state.apply(Command::IncreaseConfidence);
        }
        assert_eq!(state.threshold.value(), 0.9);
        assert_eq!(
            state.apply(Command::IncreaseConfidence),
            Effect::ThresholdChanged(0.9)
        );
        assert_eq!(state.threshold.value(), 0.9);
    }

    #[test]
    fn ten_decreases_reach_lower_bound_and_clamp() {
        let mut state = SessionState::default();
        for _ in 0..10 {
            state.apply(Command::DecreaseConfidence);
        }
        assert_eq!(state.threshold.value(), 0.1);
        state.apply(Command::DecreaseConfidence);
        assert_eq!(state.threshold.value(), 0.1);
    }

    #[test]
    fn any_key_sequence_stays_in_bounds_with_exact_steps() {
        let mut state = SessionState::default();
        // Deterministic pseudo-random walk over the two keys.
        let mut seed: u32 = 0x2545_f491;
        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let before = state.threshold.value();
            let key = if seed & 1 == 0 { '+' } else { '-' };
            state.apply_key(key);
            let after = state.threshold.value();
            assert!((MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&after));
            let delta = (after - before).abs();
            let at_bound = after == MIN_CONFIDENCE || after == MAX_CONFIDENCE;
            assert!((delta - 0.05).abs() < 1e-6 || (delta == 0.0 && at_bound));
        }
    }

    #[test]
    fn key_mapping() {
        assert_eq!(Command::from_key('q'), Some(Command::Quit));
        assert_eq!(Command::from_key('Q'), Some(Command::Quit));
        assert_eq!(Command::from_key('S'), Some(Command::Screenshot));
        assert_eq!(Command::from_key('='), Some(Command::IncreaseConfidence));
        assert_eq!(Command::from_key('_'), Some(Command::DecreaseConfidence));
        assert_eq!(Command::from_key('x'), None);
    }

    #[test]
    fn unknown_key_is_a_no_op() {
        let mut state = SessionState::default();
        assert_eq!(state.apply_key('x'), Effect::None);
        assert!(state.running);
        assert_eq!(state.threshold, ConfidenceThreshold::default());
    }

    #[test]
    fn quit_stops_running() {
        let mut state = SessionState::default();
        assert_eq!(state.apply_key('Q'), Effect::Stop);
        assert!(!state.running);
    }

    #[test]
    fn threshold_validation() {
        assert!(ConfidenceThreshold::new(0.6).is_ok());
        assert!(ConfidenceThreshold::new(0.1).is_ok());
        assert!(ConfidenceThreshold::new(0.9).is_ok());
        assert!(ConfidenceThreshold::new(0.95).is_err());
        assert!(ConfidenceThreshold::new(0.05).is_err());
        assert!(ConfidenceThreshold::new(f32::NAN).is_err());
        assert_eq!(ConfidenceThreshold::default().value(), 0.6);

        // Just outside the bounds must not round back in.
        assert!(ConfidenceThreshold::new(0.0951).is_err());
        assert!(ConfidenceThreshold::new(0.9049).is_err());
        // Values are never silently changed.
        assert!(ConfidenceThreshold::new(0.123).is_err());
        assert_eq!(ConfidenceThreshold::new(0.35).map(|t| t.value()).ok(), Some(0.35));
    }

    #[test]
    fn counts_partition_people_and_objects() {
        let dets = vec![det(0), det(0), det(2), det(41), det(0)];
        let counts = ObjectCounts::tally(&dets, &ClassFilter::default());
        assert_eq!(counts, ObjectCounts { people: 3, objects: 2 });
        assert_eq!(counts.total(), dets.len());
    }

    #[test]
    fn excluded_classes_count_nowhere() {
        let dets = vec![det(0), det(2), det(2), det(41)];
        let counts = ObjectCounts::tally(&dets, &ClassFilter::new([2]));
        assert_eq!(counts, ObjectCounts { people: 1, objects: 1 });

        let counts = ObjectCounts::tally(&dets, &ClassFilter::new([0]));
        assert_eq!(counts, ObjectCounts { people: 0, objects: 3 });
    }

    #[test]
    fn throughput_handles_zero_elapsed() {
        assert_eq!(throughput(10, Duration::ZERO), 0.0);
        assert_eq!(throughput(30, Duration::from_secs(2)), 15.0);
        assert_eq!(throughput(1, Duration::from_millis(250)), 4.0);
    }

    #[test]
    fn record_frame_advances_count_and_fps() {
        let mut state = SessionState::default();
        let counts = ObjectCounts { people: 1, objects: 0 };
        state.record_frame(counts, Duration::from_secs(1));
        let fps = state.record_frame(counts, Duration::from_secs(1));
        assert_eq!(state.frame_count, 2);
        assert_eq!(fps, 2.0);
        assert_eq!(state.last_counts, counts);
    }
}
