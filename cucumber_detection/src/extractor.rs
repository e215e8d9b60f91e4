use crate::{
    detection::{BoundingBox, Detection, InferenceResult},
    labels::ClassLabels,
};

/// Flattens raw results into one detection per candidate box, keeping the model's order.
///
/// No threshold or suppression is applied here; whatever filtering the detector
/// did is all the filtering there is.
pub fn extract_detections(results: &[InferenceResult], labels: &ClassLabels) -> Vec<Detection> {
    results
        .iter()
        .flat_map(|result| result.boxes.iter())
        .map(|candidate| Detection {
            bounding_box: BoundingBox::from_xyxy(candidate.xyxy),
            confidence: bound_confidence(candidate.confidence),
            label: labels.name(candidate.class_id),
        })
        .collect()
}

fn bound_confidence(confidence: f32) -> f32 {
    if confidence.is_nan() {
        return 0.;
    }
    confidence.clamp(0., 1.)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::CandidateBox;

    fn candidate(class_id: usize, confidence: f32, x: f32) -> CandidateBox {
        CandidateBox {
            class_id,
            confidence,
            xyxy: [x, 10.5, x + 40.7, 50.2],
        }
    }

    #[test]
    fn test_extract_keeps_count_and_order() {
        let labels = ClassLabels::from_names(["ripe", "unripe"]);
        let results = vec![
            InferenceResult {
                boxes: vec![candidate(1, 0.4, 300.), candidate(0, 0.9, 10.)],
                image_width: 640,
                image_height: 640,
            },
            InferenceResult::default(),
            InferenceResult {
                boxes: vec![candidate(0, 0.6, 100.)],
                image_width: 640,
                image_height: 640,
            },
        ];

        let detections = extract_detections(&results, &labels);

        assert_eq!(detections.len(), 3);
        let names: Vec<&str> = detections.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(names, vec!["unripe", "ripe", "ripe"]);
        assert_eq!(detections[0].bounding_box, BoundingBox::new(300, 10, 340, 50));
        assert_eq!(detections[1].bounding_box, BoundingBox::new(10, 10, 50, 50));
        assert_eq!(detections[2].confidence, 0.6);
    }

    #[test]
    fn test_extract_bounds_confidence() {
        let labels = ClassLabels::from_names(["ripe"]);
        let results = vec![InferenceResult {
            boxes: vec![
                candidate(0, 1.3, 0.),
                candidate(0, -0.2, 0.),
                candidate(0, f32::NAN, 0.),
                candidate(0, 0.87, 0.),
            ],
            image_width: 640,
            image_height: 640,
        }];

        let detections = extract_detections(&results, &labels);

        assert_eq!(detections.len(), 4);
        assert!(detections
            .iter()
            .all(|d| (0.0..=1.0).contains(&d.confidence)));
        assert_eq!(detections[0].confidence, 1.);
        assert_eq!(detections[3].confidence, 0.87);
    }

    #[test]
    fn test_extract_unknown_class_and_empty_input() {
        let labels = ClassLabels::from_names(["ripe"]);
        let results = vec![InferenceResult {
            boxes: vec![candidate(4, 0.5, 0.)],
            image_width: 640,
            image_height: 640,
        }];

        assert_eq!(extract_detections(&results, &labels)[0].label, "Unknown class 4");
        assert!(extract_detections(&[], &labels).is_empty());
    }
}
