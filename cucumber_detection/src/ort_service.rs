use crate::{
    config::{ModelConfig, Validatable},
    detection::{CandidateBox, InferenceResult},
    error::DetectionError,
    model_service::ModelService,
};
use image::{imageops::FilterType, RgbImage};
use ndarray::{Array, ArrayD, Axis, Ix3, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use parking_lot::Mutex;

const OUTPUT_NAME: &str = "output0";

/// Resizes to the model input and lays the pixels out as a normalised NCHW tensor.
pub fn transform_image(image: &RgbImage, input_size: u32) -> Array<f32, Ix4> {
    let resized = image::imageops::resize(image, input_size, input_size, FilterType::CatmullRom);
    let size = input_size as usize;

    let mut input = Array::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = pixel.0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    input
}

/// Decodes a YOLOv8 head, `[1, 4 + classes, candidates]` or its transpose, into
/// corner boxes in the original image space. Candidates under `min_probability` are dropped.
pub fn decode_output(
    output: &ArrayD<f32>,
    image_width: u32,
    image_height: u32,
    input_size: u32,
    min_probability: f32,
) -> Result<Vec<CandidateBox>, DetectionError> {
    let output = output
        .view()
        .into_dimensionality::<Ix3>()
        .map_err(|e| DetectionError::Inference(format!("unexpected output shape: {}", e)))?;
    if output.len_of(Axis(0)) == 0 {
        return Err(DetectionError::Inference("output holds no batch entry".to_string()));
    }
    let output = output.index_axis_move(Axis(0), 0);
    let candidates = if output.shape()[0] <= output.shape()[1] {
        output
    } else {
        output.reversed_axes()
    };

    if candidates.shape()[0] < 5 {
        return Err(DetectionError::Inference(format!(
            "output has {} rows, expected box coordinates and at least one class",
            candidates.shape()[0]
        )));
    }

    let scale_x = image_width as f32 / input_size as f32;
    let scale_y = image_height as f32 / input_size as f32;
    let mut boxes = Vec::new();

    for column in candidates.axis_iter(Axis(1)) {
        let Some((class_id, prob)) = column
            .iter()
            .skip(4)
            .copied()
            .enumerate()
            .reduce(|accum, row| if row.1 > accum.1 { row } else { accum })
        else {
            continue;
        };

        if prob < min_probability {
            continue;
        }

        let xc = column[0] * scale_x;
        let yc = column[1] * scale_y;
        let w = column[2] * scale_x;
        let h = column[3] * scale_y;

        boxes.push(CandidateBox {
            class_id,
            confidence: prob,
            xyxy: [
                (xc - w / 2.).clamp(0., image_width as f32),
                (yc - h / 2.).clamp(0., image_height as f32),
                (xc + w / 2.).clamp(0., image_width as f32),
                (yc + h / 2.).clamp(0., image_height as f32),
            ],
        });
    }

    Ok(boxes)
}

/// Greedy per-class suppression. The result is ordered by descending confidence.
pub fn non_max_suppression(mut boxes: Vec<CandidateBox>, iou_threshold: f32) -> Vec<CandidateBox> {
    boxes.sort_by(|box1, box2| box2.confidence.total_cmp(&box1.confidence));

    let mut kept: Vec<CandidateBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && k.iou(&candidate) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

pub struct OrtModelService {
    session: Mutex<Session>,
    input_size: u32,
    min_probability: f32,
    iou_threshold: f32,
}

impl OrtModelService {
    pub fn new(model_config: &ModelConfig) -> Result<Self, DetectionError> {
        model_config.validate()?;
        let session = build_session(model_config)
            .map_err(|e| DetectionError::ModelLoad(format!("{:?}: {}", model_config.get_path(), e)))?;

        tracing::info!(
            "Loaded ONNX model {:?} (input {}x{}, min probability {}, iou threshold {})",
            model_config.get_path(),
            model_config.input_size,
            model_config.input_size,
            model_config.min_probability,
            model_config.iou_threshold
        );

        Ok(Self {
            session: Mutex::new(session),
            input_size: model_config.input_size,
            min_probability: model_config.min_probability,
            iou_threshold: model_config.iou_threshold,
        })
    }

    pub fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<ArrayD<f32>, DetectionError> {
        let mut session = self.session.lock();

        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| DetectionError::Inference(format!("failed to build tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| DetectionError::Inference(e.to_string()))?;

        let (shape, data) = outputs[OUTPUT_NAME]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectionError::Inference(format!("failed to extract tensor: {}", e)))?;

        let array = ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec())
            .map_err(|e| DetectionError::Inference(format!("invalid tensor shape: {}", e)))?;

        Ok(array)
    }
}

fn build_session(model_config: &ModelConfig) -> ort::Result<Session> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(model_config.intra_threads)?
        .commit_from_file(model_config.get_path())
}

impl ModelService for OrtModelService {
    fn detect(&self, image: &RgbImage) -> Result<Vec<InferenceResult>, DetectionError> {
        let (image_width, image_height) = image.dimensions();
        let input = transform_image(image, self.input_size);
        let output = self.run_inference(&input)?;

        let candidates = decode_output(
            &output,
            image_width,
            image_height,
            self.input_size,
            self.min_probability,
        )?;
        let total = candidates.len();
        let boxes = non_max_suppression(candidates, self.iou_threshold);
        tracing::debug!("{} candidates above threshold, {} after nms", total, boxes.len());

        Ok(vec![InferenceResult {
            boxes,
            image_width,
            image_height,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use ndarray::{Array3, IxDyn};

    #[test]
    fn test_transform_image() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(100, 100, Rgb([255, 0, 0]));

        let input = transform_image(&img, 640);

        assert_eq!(input.shape(), &[1, 3, 640, 640]);
        assert!((input[[0, 0, 320, 320]] - 1.).abs() < 1e-6);
        assert_eq!(input[[0, 1, 320, 320]], 0.);
        assert_eq!(input[[0, 2, 320, 320]], 0.);
    }

    // Two classes, ten candidates laid out as [1, 6, 10]; only the first three are non-zero.
    fn yolo_head() -> ArrayD<f32> {
        let rows = [
            [100., 300., 600.],  // xc
            [100., 300., 600.],  // yc
            [40., 20., 100.],    // w
            [20., 20., 100.],    // h
            [0.9, 0.1, 0.3],     // class 0
            [0.05, 0.2, 0.6],    // class 1
        ];
        let mut head = Array3::<f32>::zeros((1, 6, 10));
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                head[[0, r, c]] = *value;
            }
        }
        head.into_dyn()
    }

    #[test]
    fn test_decode_output() {
        let boxes = decode_output(&yolo_head(), 640, 640, 640, 0.25).unwrap();

        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].class_id, 0);
        assert!((boxes[0].confidence - 0.9).abs() < 1e-6);
        assert_eq!(boxes[0].xyxy, [80., 90., 120., 110.]);
        // Clipped to the image border.
        assert_eq!(boxes[1].class_id, 1);
        assert_eq!(boxes[1].xyxy, [550., 550., 640., 640.]);
    }

    #[test]
    fn test_decode_output_scales_and_accepts_transposed_layout() {
        let head = yolo_head();
        let transposed = head
            .view()
            .into_dimensionality::<Ix3>()
            .unwrap()
            .permuted_axes([0, 2, 1])
            .to_owned()
            .into_dyn();

        let boxes = decode_output(&transposed, 320, 1280, 640, 0.25).unwrap();

        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].xyxy, [40., 180., 60., 220.]);
    }

    #[test]
    fn test_decode_output_rejects_bad_shape() {
        let flat = ArrayD::<f32>::zeros(IxDyn(&[1, 6]));
        assert!(matches!(
            decode_output(&flat, 640, 640, 640, 0.25),
            Err(DetectionError::Inference(_))
        ));

        let empty_batch = ArrayD::<f32>::zeros(IxDyn(&[0, 6, 10]));
        assert!(matches!(
            decode_output(&empty_batch, 640, 640, 640, 0.25),
            Err(DetectionError::Inference(_))
        ));
    }

    #[test]
    fn test_non_max_suppression() {
        let strong = CandidateBox {
            class_id: 0,
            confidence: 0.9,
            xyxy: [0., 0., 100., 100.],
        };
        let overlapping = CandidateBox {
            confidence: 0.8,
            xyxy: [5., 5., 100., 100.],
            ..strong
        };
        let other_class = CandidateBox {
            class_id: 1,
            ..overlapping
        };
        let apart = CandidateBox {
            confidence: 0.95,
            xyxy: [200., 200., 250., 250.],
            ..strong
        };

        let kept = non_max_suppression(vec![overlapping, strong, other_class, apart], 0.7);

        assert_eq!(kept, vec![apart, strong, other_class]);
    }

    #[test]
    fn test_missing_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelConfig {
            onnx_file: "missing.onnx".to_string(),
            model_dir: dir.path().to_path_buf(),
            input_size: 640,
            min_probability: 0.25,
            iou_threshold: 0.7,
            intra_threads: 1,
        };

        assert!(matches!(
            OrtModelService::new(&config),
            Err(DetectionError::FileNotFound(_))
        ));
    }
}
