//! Live webcam detection with an interactive confidence threshold.
//!
//! A single-threaded loop reads frames from a camera, runs a YOLO-family
//! detector, counts people versus everything else, draws a HUD and reacts to
//! single-key commands (quit, screenshot, raise or lower the threshold).
//!
//! # Module Structure
//!
//! - `frame`: owned RGB24 frames
//! - `ingest`: frame sources (V4L2 cameras, synthetic `stub://` sources)
//! - `detect`: detector capability, YOLOv8 decoding, box annotation
//! - `overlay`: HUD text rendering
//! - `session`: threshold, key commands, counting and FPS bookkeeping
//! - `display`: window surfaces and the headless fallback
//! - `screenshot`: timestamped JPEG capture
//! - `detection_loop`: the per-frame pipeline tying everything together
//! - `config`: command line and environment configuration
//! - `ui`: setup-stage progress reporting

pub mod config;
pub mod detect;
pub mod detection_loop;
pub mod display;
pub mod frame;
pub mod ingest;
pub mod overlay;
pub mod screenshot;
pub mod session;
pub mod ui;

pub use config::{Cli, LoopConfig};
pub use detect::{load_detector, BoundingBox, Detection, Detector, Inference, ModelConfig};
pub use detection_loop::{DetectionLoop, LoopSettings, StepOutcome};
pub use display::{open_display, DisplaySurface, HeadlessDisplay};
pub use frame::Frame;
pub use ingest::{source_for, FrameSource, SourceConfig, SourceStats};
pub use screenshot::ScreenshotWriter;
pub use session::{
    ClassFilter, Command, ConfidenceThreshold, Effect, ObjectCounts, SessionState,
    SessionSummary, StopReason,
};
