use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::detect::ModelConfig;
use crate::detection_loop::LoopSettings;
use crate::ingest::SourceConfig;
use crate::session::{ClassFilter, ConfidenceThreshold, DEFAULT_CONFIDENCE};
use crate::ui::UiMode;

const DEFAULT_DEVICE: &str = "0";
const DEFAULT_WIDTH: u32 = 1280;
const DEFAULT_HEIGHT: u32 = 720;
const DEFAULT_TARGET_FPS: u32 = 30;
const DEFAULT_MODEL: &str = "yolov8s.onnx";
const DEFAULT_IOU: f32 = 0.45;
const DEFAULT_WINDOW_TITLE: &str = "People & Objects Detection";
const DEFAULT_START_DELAY_SECS: f64 = 2.0;

/// Command line of `live_detect`. Every flag can also be set through the environment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "live_detect",
    version,
    about = "Real-time people and object detection from a webcam"
)]
pub struct Cli {
    /// Camera index, device node, or stub://name for synthetic frames.
    #[arg(long, env = "LIVE_DETECT_DEVICE", default_value = DEFAULT_DEVICE)]
    pub device: String,
    /// Requested capture width.
    #[arg(long, env = "LIVE_DETECT_WIDTH", default_value_t = DEFAULT_WIDTH)]
    pub width: u32,
    /// Requested capture height.
    #[arg(long, env = "LIVE_DETECT_HEIGHT", default_value_t = DEFAULT_HEIGHT)]
    pub height: u32,
    /// Requested capture frame rate (0 keeps the device default).
    #[arg(long, env = "LIVE_DETECT_FPS", default_value_t = DEFAULT_TARGET_FPS)]
    pub fps: u32,
    /// YOLOv8 ONNX model path, or stub://demo for the built-in demo detector.
    #[arg(long, env = "LIVE_DETECT_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,
    /// IoU threshold for non-maximum suppression.
    #[arg(long, env = "LIVE_DETECT_IOU", default_value_t = DEFAULT_IOU)]
    pub iou: f32,
    /// Initial confidence threshold, 0.10 to 0.90.
    #[arg(long, env = "LIVE_DETECT_CONFIDENCE", default_value_t = DEFAULT_CONFIDENCE)]
    pub confidence: f32,
    /// Comma-separated class ids to leave out of the counts.
    #[arg(long, env = "LIVE_DETECT_EXCLUDE", default_value = "")]
    pub exclude: String,
    /// Directory screenshots are written to.
    #[arg(long, env = "LIVE_DETECT_SCREENSHOT_DIR", default_value = ".")]
    pub screenshot_dir: PathBuf,
    /// Seconds to wait after printing the instructions.
    #[arg(long, env = "LIVE_DETECT_START_DELAY", default_value_t = DEFAULT_START_DELAY_SECS)]
    pub start_delay: f64,
    /// Stop after this many frames.
    #[arg(long, env = "LIVE_DETECT_MAX_FRAMES")]
    pub max_frames: Option<u64>,
    /// Run without a window (keyboard commands are unavailable).
    #[arg(long, env = "LIVE_DETECT_HEADLESS")]
    pub headless: bool,
    /// Window title.
    #[arg(long, default_value = DEFAULT_WINDOW_TITLE)]
    pub window_title: String,
    /// Setup progress style.
    #[arg(long, value_enum, default_value_t = UiMode::Auto)]
    pub ui: UiMode,
}

/// Validated configuration for one run.
#[derive(Clone, Debug)]
pub struct LoopConfig {
    pub source: SourceConfig,
    pub model: ModelConfig,
    pub settings: LoopSettings,
    pub headless: bool,
    pub window_title: String,
    pub ui: UiMode,
}

impl Cli {
    pub fn into_config(self) -> Result<LoopConfig> {
        if self.device.trim().is_empty() {
            return Err(anyhow!("device must not be empty"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!(
                "capture resolution must be non-zero (got {}x{})",
                self.width,
                self.height
            ));
        }
        if self.model.trim().is_empty() {
            return Err(anyhow!("model must not be empty"));
        }
        if !(self.iou > 0.0 && self.iou <= 1.0) {
            return Err(anyhow!("iou must be within (0, 1], got {}", self.iou));
        }
        if !self.start_delay.is_finite() || self.start_delay < 0.0 {
            return Err(anyhow!("start delay must be a non-negative number of seconds"));
        }
        if self.max_frames == Some(0) {
            return Err(anyhow!("max frames must be at least 1"));
        }

        let initial_threshold =
            ConfidenceThreshold::new(self.confidence).context("invalid --confidence")?;
        let class_filter = ClassFilter::new(parse_class_ids(&self.exclude)?);

        Ok(LoopConfig {
            source: SourceConfig {
                device: self.device.trim().to_string(),
                width: self.width,
                height: self.height,
                target_fps: self.fps,
            },
            model: ModelConfig {
                identifier: self.model.trim().to_string(),
                iou_threshold: self.iou,
            },
            settings: LoopSettings {
                initial_threshold,
                class_filter,
                screenshot_dir: self.screenshot_dir,
                start_delay: Duration::from_secs_f64(self.start_delay),
                max_frames: self.max_frames,
                ..LoopSettings::default()
            },
            headless: self.headless,
            window_title: self.window_title,
            ui: self.ui,
        })
    }
}

fn parse_class_ids(value: &str) -> Result<Vec<u32>> {
    split_csv(value)
        .into_iter()
        .map(|entry| {
            entry
                .parse::<u32>()
                .map_err(|_| anyhow!("excluded class '{}' is not a class id", entry))
        })
        .collect()
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
