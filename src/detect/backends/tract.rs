#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use crate::detect::backend::{Detector, ModelMetadata};
use crate::detect::result::Detection;
use crate::detect::yolo::{decode, non_max_suppression, Projection};
use crate::frame::Frame;

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract-based YOLOv8 backend for ONNX exports.
///
/// Loads a local model file once; inference is fully in-process.
pub struct TractBackend {
    model: Plan,
    metadata: ModelMetadata,
    iou_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        metadata: ModelMetadata,
        iou_threshold: f32,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = metadata.input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "TractBackend: loaded {} ({} classes, {}px input)",
            model_path.display(),
            metadata.class_names.len(),
            metadata.input_size
        );
        Ok(Self {
            model,
            metadata,
            iou_threshold,
        })
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let size = self.metadata.input_size;
        let resized = imageops::resize(frame.image(), size, size, FilterType::Triangle);
        let size = size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        input.into_tensor()
    }
}

impl Detector for TractBackend {
    fn name(&self) -> &str {
        "tract"
    }

    fn class_names(&self) -> &[String] {
        &self.metadata.class_names
    }

    fn warm_up(&mut self) -> Result<()> {
        let size = self.metadata.input_size;
        let blank = Frame::filled(size, size, [114, 114, 114], 0);
        self.detect(&blank, 1.0).map(|_| ())
    }

    fn detect(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 {
            return Err(anyhow!("unexpected YOLO output shape {:?}", shape));
        }
        let flat: Vec<f32> = view.iter().copied().collect();

        let projection =
            Projection::for_resize(frame.width(), frame.height(), self.metadata.input_size);
        let candidates = decode(
            &flat,
            shape[1],
            shape[2],
            confidence_threshold,
            projection,
            &self.metadata.class_names,
        )?;
        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}
