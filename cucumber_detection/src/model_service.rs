use crate::{detection::InferenceResult, error::DetectionError};
use image::RgbImage;

/// A loaded detection model. Implementations are shared read-only between requests.
pub trait ModelService: Send + Sync + 'static {
    /// Runs one forward pass and returns the raw per-image results unchanged.
    fn detect(&self, image: &RgbImage) -> Result<Vec<InferenceResult>, DetectionError>;
}
