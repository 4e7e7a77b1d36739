//! YOLOv8 output decoding.
//!
//! A YOLOv8 detection head emits a `[1, 4 + C, N]` tensor: for each of the `N`
//! anchors, a center-format box in model input pixels followed by `C` class
//! scores. There is no separate objectness score.

use anyhow::{anyhow, Result};
use std::cmp::Ordering;

use super::labels::class_name;
use super::result::{BoundingBox, Detection};

/// Geometry needed to map model-space boxes back onto the frame.
#[derive(Clone, Copy, Debug)]
pub struct Projection {
    pub scale_x: f32,
    pub scale_y: f32,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Projection {
    /// Projection for a frame resized (without letterboxing) to a square input.
    pub fn for_resize(frame_width: u32, frame_height: u32, input_size: u32) -> Self {
        Self {
            scale_x: frame_width as f32 / input_size as f32,
            scale_y: frame_height as f32 / input_size as f32,
            frame_width,
            frame_height,
        }
    }
}

/// Decode a channel-major `[4 + C, N]` output into frame-space detections.
///
/// Candidates scoring below `confidence_threshold` are dropped before NMS.
pub fn decode(
    output: &[f32],
    channels: usize,
    anchors: usize,
    confidence_threshold: f32,
    projection: Projection,
    class_names: &[String],
) -> Result<Vec<Detection>> {
    if channels < 5 {
        return Err(anyhow!(
            "unexpected YOLO output: {} channels, need at least 5",
            channels
        ));
    }
    if output.len() != channels * anchors {
        return Err(anyhow!(
            "YOLO output length mismatch: expected {}x{}={}, got {}",
            channels,
            anchors,
            channels * anchors,
            output.len()
        ));
    }

    let at = |channel: usize, anchor: usize| output[channel * anchors + anchor];
    let mut detections = Vec::new();
    for anchor in 0..anchors {
        let (class_id, score) = (4..channels)
            .map(|c| (c - 4, at(c, anchor)))
            .fold((0usize, f32::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            });
        if !score.is_finite() || score < confidence_threshold {
            continue;
        }

        let bbox = BoundingBox::from_center(
            at(0, anchor) * projection.scale_x,
            at(1, anchor) * projection.scale_y,
            at(2, anchor) * projection.scale_x,
            at(3, anchor) * projection.scale_y,
        )
        .clamp_to(projection.frame_width, projection.frame_height);
        if bbox.area() <= 0.0 {
            continue;
        }

        let class_id = class_id as u32;
        detections.push(Detection {
            class_id,
            class_name: class_name(class_names, class_id),
            confidence: score.min(1.0),
            bbox,
        });
    }
    Ok(detections)
}

/// Greedy per-class non-maximum suppression, highest confidence first.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut keep: Vec<Detection> = Vec::new();
    for det in detections {
        let suppressed = keep
            .iter()
            .any(|kept| kept.class_id == det.class_id && kept.bbox.iou(&det.bbox) > iou_threshold);
        if !suppressed {
            keep.push(det);
        }
    }
    keep
}
