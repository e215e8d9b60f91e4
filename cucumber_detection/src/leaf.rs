use crate::{detection::Detection, error::DetectionError};
use serde::Serialize;

pub const UNKNOWN_OBJECT_MESSAGE: &str = "Uploaded Image has unknown object";

/// The first detection, or [`DetectionError::EmptyResult`] when there is none.
pub fn primary_detection(detections: &[Detection]) -> Result<&Detection, DetectionError> {
    detections.first().ok_or(DetectionError::EmptyResult)
}

#[derive(Debug, Clone, PartialEq)]
pub enum LeafDiagnosis {
    Recognized { label: String, confidence: f32 },
    Unknown,
}

impl LeafDiagnosis {
    pub fn from_detections(detections: &[Detection]) -> Self {
        match primary_detection(detections) {
            Ok(detection) => LeafDiagnosis::Recognized {
                label: detection.label.clone(),
                confidence: detection.confidence,
            },
            Err(_) => LeafDiagnosis::Unknown,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            LeafDiagnosis::Recognized { label, .. } => label,
            LeafDiagnosis::Unknown => UNKNOWN_OBJECT_MESSAGE,
        }
    }

    pub fn is_recognized(&self) -> bool {
        matches!(self, LeafDiagnosis::Recognized { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeafReport {
    pub label: String,
    pub confidence: Option<f32>,
    pub recognized: bool,
}

impl From<&LeafDiagnosis> for LeafReport {
    fn from(diagnosis: &LeafDiagnosis) -> Self {
        let confidence = match diagnosis {
            LeafDiagnosis::Recognized { confidence, .. } => Some(*confidence),
            LeafDiagnosis::Unknown => None,
        };
        Self {
            label: diagnosis.message().to_string(),
            confidence,
            recognized: diagnosis.is_recognized(),
        }
    }
}
