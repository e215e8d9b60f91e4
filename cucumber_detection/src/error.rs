use crate::detection::BoundingBox;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("File not found: {0:?}")]
    FileNotFound(PathBuf),
    #[error("Failed to load model: {0}")]
    ModelLoad(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("No object detected in image")]
    EmptyResult,
    #[error("Bounding box {bounding_box} does not fit in a {width}x{height} image")]
    InvalidGeometry {
        bounding_box: BoundingBox,
        width: u32,
        height: u32,
    },
    #[error("Failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("Failed to read labels: {0}")]
    Labels(#[from] std::io::Error),
    #[error("Invalid labels line {line}: {content}")]
    InvalidLabelLine { line: usize, content: String },
    #[error("Failed to load font: {0}")]
    Font(String),
}
