mod glyphs;

pub mod annotator;
pub mod config;
pub mod detection;
pub mod error;
pub mod extractor;
pub mod labels;
pub mod leaf;
pub mod model_service;
pub mod ort_service;
pub mod pipeline;

pub use annotator::Annotator;
pub use detection::{BoundingBox, CandidateBox, Detection, InferenceResult};
pub use error::DetectionError;
pub use labels::{ClassLabel, ClassLabels};
pub use leaf::{LeafDiagnosis, LeafReport};
pub use model_service::ModelService;
pub use ort_service::OrtModelService;
pub use pipeline::{decode_image, Analysis, CucumberDetection};
