use crate::{
    annotator::Annotator,
    config::{AnnotationConfig, LabelsConfig, ModelConfig},
    detection::{Detection, InferenceResult},
    error::DetectionError,
    extractor::extract_detections,
    labels::ClassLabels,
    leaf::LeafDiagnosis,
    model_service::ModelService,
    ort_service::OrtModelService,
};
use image::{imageops::FilterType, DynamicImage, RgbImage};
use std::sync::Arc;

/// Uploaded images are brought to this square size before anything else happens.
pub const DISPLAY_SIZE: u32 = 640;

/// Outcome of one upload.
///
/// Annotation is visual only: running detection again on `annotated` is not
/// expected to give back `detections`.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub original: RgbImage,
    pub annotated: RgbImage,
    pub detections: Vec<Detection>,
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, DetectionError> {
    let image = image::ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DetectionError::ImageDecode(image::ImageError::IoError(e)))?
        .decode()?;
    Ok(image)
}

pub fn prepare_image(image: &DynamicImage) -> RgbImage {
    image
        .resize_exact(DISPLAY_SIZE, DISPLAY_SIZE, FilterType::Triangle)
        .to_rgb8()
}

/// One model together with its label mapping and an annotator.
pub struct CucumberDetection {
    model: Arc<dyn ModelService>,
    labels: ClassLabels,
    annotator: Annotator,
    strict_geometry: bool,
}

impl CucumberDetection {
    pub fn new(model: Arc<dyn ModelService>, labels: ClassLabels, annotator: Annotator) -> Self {
        let annotator = annotator.with_palette(labels.clone());
        Self {
            model,
            labels,
            annotator,
            strict_geometry: false,
        }
    }

    pub fn load(
        model_config: &ModelConfig,
        labels_config: &LabelsConfig,
        annotation_config: &AnnotationConfig,
    ) -> Result<Self, DetectionError> {
        let model = OrtModelService::new(model_config)?;
        let labels = ClassLabels::load(labels_config)?;
        let annotator = Annotator::from_config(annotation_config)?;
        Ok(Self::new(Arc::new(model), labels, annotator)
            .with_strict_geometry(annotation_config.strict_geometry))
    }

    pub fn with_strict_geometry(mut self, strict_geometry: bool) -> Self {
        self.strict_geometry = strict_geometry;
        self
    }

    pub fn labels(&self) -> &ClassLabels {
        &self.labels
    }

    pub fn detect_cucumbers(&self, image: &RgbImage) -> Result<Vec<InferenceResult>, DetectionError> {
        self.model.detect(image)
    }

    pub fn extract(&self, results: &[InferenceResult]) -> Vec<Detection> {
        extract_detections(results, &self.labels)
    }

    pub fn draw_detections(
        &self,
        image: RgbImage,
        detections: &[Detection],
    ) -> Result<RgbImage, DetectionError> {
        if self.strict_geometry {
            self.annotator.annotate_checked(image, detections)
        } else {
            Ok(self.annotator.annotate(image, detections))
        }
    }

    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, DetectionError> {
        let prepared = prepare_image(image);
        self.detections_for(&prepared)
    }

    pub fn analyze(&self, image: &DynamicImage) -> Result<Analysis, DetectionError> {
        let original = prepare_image(image);
        let detections = self.detections_for(&original)?;
        let annotated = self.draw_detections(original.clone(), &detections)?;

        Ok(Analysis {
            original,
            annotated,
            detections,
        })
    }

    pub fn recognize(&self, image: &DynamicImage) -> Result<LeafDiagnosis, DetectionError> {
        let detections = self.detect(image)?;
        let diagnosis = LeafDiagnosis::from_detections(&detections);
        tracing::info!("Leaf diagnosis: {}", diagnosis.message());
        Ok(diagnosis)
    }

    fn detections_for(&self, image: &RgbImage) -> Result<Vec<Detection>, DetectionError> {
        let results = self.detect_cucumbers(image)?;
        let detections = self.extract(&results);

        tracing::debug!("Extracted {} detections", detections.len());
        for (i, detection) in detections.iter().enumerate() {
            tracing::debug!(
                "Detection {}: label={}, confidence={:.3}, bbox={}",
                i,
                detection.label,
                detection.confidence,
                detection.bounding_box
            );
        }

        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BoundingBox, CandidateBox};
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockModelService {
        boxes: Vec<CandidateBox>,
        calls: AtomicUsize,
    }

    impl MockModelService {
        fn new(boxes: Vec<CandidateBox>) -> Self {
            Self {
                boxes,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ModelService for MockModelService {
        fn detect(&self, image: &RgbImage) -> Result<Vec<InferenceResult>, DetectionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![InferenceResult {
                boxes: self.boxes.clone(),
                image_width: image.width(),
                image_height: image.height(),
            }])
        }
    }

    struct FailingModelService;

    impl ModelService for FailingModelService {
        fn detect(&self, _image: &RgbImage) -> Result<Vec<InferenceResult>, DetectionError> {
            Err(DetectionError::Inference("session exploded".to_string()))
        }
    }

    fn fruit_labels() -> ClassLabels {
        ClassLabels::from_names(["ripe", "unripe"])
    }

    fn upload() -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(320, 200, Rgb([30, 30, 30])))
    }

    #[test]
    fn test_analyze_resizes_and_annotates_copy() {
        let model = Arc::new(MockModelService::new(vec![CandidateBox {
            class_id: 0,
            confidence: 0.87,
            xyxy: [10., 10., 50., 50.],
        }]));
        let detector = CucumberDetection::new(model.clone(), fruit_labels(), Annotator::new());

        let analysis = detector.analyze(&upload()).unwrap();

        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(analysis.original.dimensions(), (640, 640));
        assert_eq!(analysis.annotated.dimensions(), (640, 640));
        assert_eq!(
            analysis.detections,
            vec![Detection {
                bounding_box: BoundingBox::new(10, 10, 50, 50),
                confidence: 0.87,
                label: "ripe".to_string(),
            }]
        );
        assert_eq!(*analysis.original.get_pixel(10, 10), Rgb([30, 30, 30]));
        assert_eq!(*analysis.annotated.get_pixel(10, 10), Rgb([0, 255, 0]));
    }

    #[test]
    fn test_analyze_without_detections_is_pixel_identical() {
        let detector = CucumberDetection::new(
            Arc::new(MockModelService::new(vec![])),
            fruit_labels(),
            Annotator::new(),
        );

        let analysis = detector.analyze(&upload()).unwrap();

        assert!(analysis.detections.is_empty());
        assert_eq!(analysis.annotated, analysis.original);
    }

    #[test]
    fn test_strict_geometry_surfaces_invalid_boxes() {
        let model = Arc::new(MockModelService::new(vec![CandidateBox {
            class_id: 1,
            confidence: 0.5,
            xyxy: [600., 600., 700., 700.],
        }]));
        let lenient = CucumberDetection::new(model.clone(), fruit_labels(), Annotator::new());
        let strict = CucumberDetection::new(model, fruit_labels(), Annotator::new())
            .with_strict_geometry(true);

        assert!(lenient.analyze(&upload()).is_ok());
        assert!(matches!(
            strict.analyze(&upload()),
            Err(DetectionError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn test_recognize_leaf() {
        let leaf_labels = ClassLabels::from_names(["healthy", "downy_mildew"]);
        let sick = CucumberDetection::new(
            Arc::new(MockModelService::new(vec![CandidateBox {
                class_id: 1,
                confidence: 0.66,
                xyxy: [0., 0., 640., 640.],
            }])),
            leaf_labels.clone(),
            Annotator::new(),
        );
        let empty = CucumberDetection::new(
            Arc::new(MockModelService::new(vec![])),
            leaf_labels,
            Annotator::new(),
        );

        assert_eq!(
            sick.recognize(&upload()).unwrap(),
            LeafDiagnosis::Recognized {
                label: "downy_mildew".to_string(),
                confidence: 0.66,
            }
        );
        assert_eq!(empty.recognize(&upload()).unwrap(), LeafDiagnosis::Unknown);
    }

    #[test]
    fn test_inference_failure_is_surfaced() {
        let detector =
            CucumberDetection::new(Arc::new(FailingModelService), fruit_labels(), Annotator::new());

        assert!(matches!(
            detector.analyze(&upload()),
            Err(DetectionError::Inference(_))
        ));
        assert!(matches!(
            detector.recognize(&upload()),
            Err(DetectionError::Inference(_))
        ));
    }

    #[test]
    fn test_decode_image() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(64, 48, Rgb([255, 0, 0]));
        let mut image_data: Vec<u8> = Vec::new();
        img.write_to(&mut Cursor::new(&mut image_data), image::ImageFormat::Png)
            .unwrap();

        let decoded = decode_image(&image_data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));

        assert!(matches!(
            decode_image(b"definitely not an image"),
            Err(DetectionError::ImageDecode(_))
        ));
    }
}
