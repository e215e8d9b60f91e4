use super::{run_model, RouteError};
use crate::server::SharedState;
use axum::{body::Bytes, extract::State, response::Json};
use cucumber_detection::{decode_image, LeafReport};
use std::time::Instant;
use tracing::instrument;

#[instrument(skip(state, image_data))]
pub async fn recognize_leaf(
    State(state): State<SharedState>,
    image_data: Bytes,
) -> Result<Json<LeafReport>, RouteError> {
    state.metrics.record_request("/leaf/recognize");
    let started = Instant::now();

    let leaf = state.leaf.clone();
    let diagnosis = run_model(move || {
        let image = decode_image(&image_data)?;
        leaf.recognize(&image)
    })
    .await?;

    let found = usize::from(diagnosis.is_recognized());
    state.metrics.record_inference(started.elapsed(), "leaf", found);

    Ok(Json(LeafReport::from(&diagnosis)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{png_upload, state};
    use cucumber_detection::CandidateBox;

    #[tokio::test]
    async fn test_recognized_leaf() {
        let state = state(
            vec![],
            vec![CandidateBox {
                class_id: 1,
                confidence: 0.75,
                xyxy: [0., 0., 640., 640.],
            }],
        );

        let Json(report) = recognize_leaf(State(state), Bytes::from(png_upload(128, 128)))
            .await
            .unwrap();

        assert!(report.recognized);
        assert_eq!(report.label, "downy_mildew");
        assert_eq!(report.confidence, Some(0.75));
    }

    #[tokio::test]
    async fn test_no_detection_reports_unknown_object() {
        let state = state(vec![], vec![]);

        let Json(report) = recognize_leaf(State(state), Bytes::from(png_upload(128, 128)))
            .await
            .unwrap();

        assert!(!report.recognized);
        assert_eq!(report.label, "Uploaded Image has unknown object");
        assert_eq!(report.confidence, None);
    }
}
