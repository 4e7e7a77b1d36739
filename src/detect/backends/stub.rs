use anyhow::Result;

use crate::detect::backend::Detector;
use crate::detect::labels::{class_name, coco_class_names};
use crate::detect::result::{BoundingBox, Detection};
use crate::frame::Frame;

/// Deterministic detector for tests and `stub://` demos.
///
/// Replays a script of per-frame candidate detections (cycling when the
/// script runs out) and applies the confidence threshold the way a real model
/// would. An empty script yields no detections.
pub struct StubBackend {
    class_names: Vec<String>,
    script: Vec<Vec<Detection>>,
    calls: usize,
    mode: StubMode,
}

enum StubMode {
    Scripted,
    Demo,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::scripted(Vec::new())
    }

    /// Replay `script[i % len]` on the i-th call.
    pub fn scripted(script: Vec<Vec<Detection>>) -> Self {
        Self {
            class_names: coco_class_names(),
            script,
            calls: 0,
            mode: StubMode::Scripted,
        }
    }

    /// Candidates drift across the frame with fixed scores so that the
    /// threshold keys visibly change the counts.
    pub fn demo() -> Self {
        Self {
            mode: StubMode::Demo,
            ..Self::new()
        }
    }

    /// Number of `detect` calls so far.
    pub fn calls(&self) -> usize {
        self.calls
    }

    fn demo_candidates(&self, frame: &Frame) -> Vec<Detection> {
        let (w, h) = (frame.width() as f32, frame.height() as f32);
        let phase = (frame.sequence % 200) as f32 / 200.0;
        let candidates = [
            (0u32, 0.91f32, 0.15 + 0.5 * phase, 0.25, 0.2, 0.6),
            (0, 0.48, 0.70 - 0.4 * phase, 0.30, 0.15, 0.5),
            (41, 0.72, 0.55, 0.65, 0.08, 0.12),
            (63, 0.35, 0.10, 0.70, 0.2, 0.15),
        ];
        candidates
            .iter()
            .map(|&(class_id, confidence, cx, cy, bw, bh)| Detection {
                class_id,
                class_name: class_name(&self.class_names, class_id),
                confidence,
                bbox: BoundingBox::from_center(cx * w, cy * h, bw * w, bh * h).clamp_to(
                    frame.width(),
                    frame.height(),
                ),
            })
            .collect()
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }

    fn detect(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>> {
        let candidates = match self.mode {
            StubMode::Demo => self.demo_candidates(frame),
            StubMode::Scripted if self.script.is_empty() => Vec::new(),
            StubMode::Scripted => self.script[self.calls % self.script.len()].clone(),
        };
        self.calls += 1;

        Ok(candidates
            .into_iter()
            .filter(|det| det.confidence >= confidence_threshold)
            .collect())
    }
}
