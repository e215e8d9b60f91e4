mod fruit;
mod health;
mod index;
mod leaf;
mod metrics;

use crate::server::SharedState;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use cucumber_detection::DetectionError;
use thiserror::Error;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(index::index))
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/fruit/annotate", post(fruit::annotate_fruit))
        .route("/fruit/detections", post(fruit::fruit_detections))
        .route("/leaf/recognize", post(leaf::recognize_leaf))
}

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Detection failed: {0}")]
    Detection(#[from] DetectionError),
    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("Inference task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("HTTP builder failed: {0}")]
    HttpBuilder(String),
}

impl RouteError {
    fn status(&self) -> StatusCode {
        match self {
            RouteError::Detection(DetectionError::ImageDecode(_)) => StatusCode::BAD_REQUEST,
            RouteError::Detection(DetectionError::InvalidGeometry { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("{}", self);
        }
        (status, self.to_string()).into_response()
    }
}

/// Model calls block, so they go to the blocking pool.
async fn run_model<T, F>(task: F) -> Result<T, RouteError>
where
    F: FnOnce() -> Result<T, DetectionError> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(task).await??)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        let decode = RouteError::Detection(DetectionError::ImageDecode(image::ImageError::IoError(
            std::io::Error::new(std::io::ErrorKind::InvalidData, "bad"),
        )));
        assert_eq!(decode.status(), StatusCode::BAD_REQUEST);

        let geometry = RouteError::Detection(DetectionError::InvalidGeometry {
            bounding_box: cucumber_detection::BoundingBox::new(0, 0, 700, 700),
            width: 640,
            height: 640,
        });
        assert_eq!(geometry.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let inference = RouteError::Detection(DetectionError::Inference("boom".to_string()));
        assert_eq!(
            inference.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
