use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use super::annotate::annotate;
use super::backends::StubBackend;
use super::labels::coco_class_names;
use super::result::{Detection, Inference};
use crate::frame::Frame;

const STUB_SCHEME: &str = "stub://";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

/// Object detector.
///
/// `detect` must only report detections whose confidence is at least
/// `confidence_threshold`. It must not mutate or retain the frame.
pub trait Detector {
    /// Backend identifier.
    fn name(&self) -> &str;

    /// Class vocabulary, indexed by class id.
    fn class_names(&self) -> &[String];

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, run once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    /// Run detection and render boxes and labels onto a copy of the frame.
    fn infer(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<Inference> {
        let detections = self.detect(frame, confidence_threshold)?;
        let annotated = annotate(frame, &detections);
        Ok(Inference {
            detections,
            annotated,
        })
    }
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn class_names(&self) -> &[String] {
        (**self).class_names()
    }

    fn detect(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>> {
        (**self).detect(frame, confidence_threshold)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }

    fn infer(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<Inference> {
        (**self).infer(frame, confidence_threshold)
    }
}

/// Which model to load and how to post-process it.
#[derive(Clone, Debug)]
pub struct ModelConfig {
    /// Path to an ONNX file, or `stub://<name>` for the built-in demo detector.
    pub identifier: String,
    /// IoU above which same-class boxes are suppressed.
    pub iou_threshold: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            identifier: "yolov8s.onnx".to_string(),
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

/// Optional `<model>.json` sidecar describing an exported model.
#[derive(Debug, Deserialize, Default)]
pub struct ModelManifest {
    pub names: Option<Vec<String>>,
    pub input_size: Option<u32>,
}

/// Resolved model metadata.
#[derive(Clone, Debug)]
pub struct ModelMetadata {
    pub class_names: Vec<String>,
    pub input_size: u32,
}

impl ModelMetadata {
    /// Read the sidecar next to `model_path` if present, else COCO-80 at 640px.
    pub fn for_model(model_path: &Path) -> Result<Self> {
        let sidecar = manifest_path(model_path);
        let manifest = if sidecar.is_file() {
            let raw = std::fs::read_to_string(&sidecar)
                .with_context(|| format!("failed to read model manifest {}", sidecar.display()))?;
            serde_json::from_str::<ModelManifest>(&raw)
                .with_context(|| format!("invalid model manifest {}", sidecar.display()))?
        } else {
            ModelManifest::default()
        };

        let class_names = match manifest.names {
            Some(names) if !names.is_empty() => names,
            Some(_) => return Err(anyhow!("model manifest {} lists no classes", sidecar.display())),
            None => coco_class_names(),
        };
        let input_size = manifest.input_size.unwrap_or(DEFAULT_INPUT_SIZE);
        if input_size == 0 {
            return Err(anyhow!("model input size must be greater than zero"));
        }
        Ok(Self {
            class_names,
            input_size,
        })
    }
}

fn manifest_path(model_path: &Path) -> PathBuf {
    model_path.with_extension("json")
}

/// Load the detector named by `config.identifier`.
///
/// This may take a while for real models; failures are fatal to the caller.
pub fn load_detector(config: &ModelConfig) -> Result<Box<dyn Detector>> {
    let identifier = config.identifier.trim();
    if identifier.is_empty() {
        return Err(anyhow!("model identifier must not be empty"));
    }
    if identifier.starts_with(STUB_SCHEME) {
        log::info!("loading built-in demo detector ({})", identifier);
        return Ok(Box::new(StubBackend::demo()));
    }

    let path = Path::new(identifier);
    if !path.is_file() {
        return Err(anyhow!("model file {} not found", path.display()));
    }

    #[cfg(feature = "backend-tract")]
    {
        let metadata = ModelMetadata::for_model(path)?;
        let backend = super::backends::TractBackend::load(path, metadata, config.iou_threshold)?;
        Ok(Box::new(backend))
    }
    #[cfg(not(feature = "backend-tract"))]
    {
        Err(anyhow!(
            "loading {} requires the backend-tract feature",
            path.display()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_identifier_loads_demo_detector() -> Result<()> {
        let config = ModelConfig {
            identifier: "stub://demo".to_string(),
            ..ModelConfig::default()
        };
        let detector = load_detector(&config)?;
        assert_eq!(detector.name(), "stub");
        assert_eq!(detector.class_names()[0], "person");
        Ok(())
    }

    #[test]
    fn missing_model_file_is_fatal() {
        let config = ModelConfig {
            identifier: "/nonexistent/model.onnx".to_string(),
            ..ModelConfig::default()
        };
        let err = load_detector(&config).err().map(|e| e.to_string());
        assert!(err.unwrap_or_default().contains("not found"));
    }

    #[test]
    fn empty_identifier_is_rejected() {
        let config = ModelConfig {
            identifier: "  ".to_string(),
            ..ModelConfig::default()
        };
        assert!(load_detector(&config).is_err());
    }
}
