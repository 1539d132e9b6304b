//! Face blurring endpoint.

use std::time::Instant;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use face_detect_core::{run_blur, ProcessResponse};
use tracing::{debug, info};

use super::{extract_image, run_blocking};
use crate::error::ApiError;
use crate::state::AppState;

/// `POST /process`: detect faces in the uploaded `image` field and return
/// the image with each face blurred.
pub async fn process(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let started = Instant::now();
    let bytes = extract_image(multipart).await?;
    debug!("Received {} bytes", bytes.len());

    let detector = state.detector.clone();
    let params = state.params;
    let sigma = state.blur_sigma;
    let quality = state.blur_jpeg_quality;

    let response = run_blocking(move || {
        run_blur(detector.as_ref(), &params, sigma, quality, &bytes)
    })
    .await?
    .with_elapsed(started.elapsed());
    info!(
        "Blurred {} faces in {}ms",
        response.num_faces, response.processing_time_ms
    );

    Ok(Json(response))
}
