use super::{run_model, RouteError};
use crate::server::SharedState;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::header,
    response::{Json, Response},
};
use cucumber_detection::{decode_image, Detection};
use image::{codecs::jpeg::JpegEncoder, RgbImage};
use std::time::Instant;
use tracing::instrument;

const JPEG_QUALITY: u8 = 90;
pub const DETECTION_COUNT_HEADER: &str = "x-detection-count";

#[instrument(skip(state, image_data))]
pub async fn annotate_fruit(
    State(state): State<SharedState>,
    image_data: Bytes,
) -> Result<Response, RouteError> {
    state.metrics.record_request("/fruit/annotate");
    let started = Instant::now();

    let fruit = state.fruit.clone();
    let analysis = run_model(move || {
        let image = decode_image(&image_data)?;
        fruit.analyze(&image)
    })
    .await?;

    state
        .metrics
        .record_inference(started.elapsed(), "fruit", analysis.detections.len());
    tracing::info!("Annotated {} detections", analysis.detections.len());

    let jpeg = encode_jpeg(&analysis.annotated)?;

    Response::builder()
        .header(header::CONTENT_TYPE, "image/jpeg")
        .header(DETECTION_COUNT_HEADER, analysis.detections.len())
        .body(Body::from(jpeg))
        .map_err(|e| RouteError::HttpBuilder(e.to_string()))
}

#[instrument(skip(state, image_data))]
pub async fn fruit_detections(
    State(state): State<SharedState>,
    image_data: Bytes,
) -> Result<Json<Vec<Detection>>, RouteError> {
    state.metrics.record_request("/fruit/detections");
    let started = Instant::now();

    let fruit = state.fruit.clone();
    let detections = run_model(move || {
        let image = decode_image(&image_data)?;
        fruit.detect(&image)
    })
    .await?;

    state
        .metrics
        .record_inference(started.elapsed(), "fruit", detections.len());

    Ok(Json(detections))
}

fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, RouteError> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY).encode_image(image)?;
    Ok(buffer)
}
