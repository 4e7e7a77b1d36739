mod annotate;
mod backend;
mod backends;
pub mod labels;
mod result;
pub mod yolo;

pub use annotate::{annotate, class_color};
pub use backend::{load_detector, Detector, ModelConfig, ModelManifest, ModelMetadata};
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{BoundingBox, Detection, Inference};
