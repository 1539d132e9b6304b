//! Face detection endpoint.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use face_detect_core::{run_detection, DetectResponse};
use tracing::debug;

use super::{extract_image, run_blocking};
use crate::error::ApiError;
use crate::state::AppState;

/// `POST /detect`: run the detector on the uploaded `image` field.
pub async fn detect(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectResponse>, ApiError> {
    let bytes = extract_image(multipart).await?;
    debug!("Received {} bytes", bytes.len());

    let detector = state.detector.clone();
    let params = state.params;
    let quality = state.jpeg_quality;

    let response = run_blocking(move || {
        run_detection(detector.as_ref(), &params, quality, &bytes)
    })
    .await?;

    Ok(Json(response))
}
