//! HTTP routes.

mod detect;
mod health;
mod process;

use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart};
use axum::routing::{get, post};
use axum::Router;
use face_detect_core::DetectError;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Name of the multipart field carrying the upload.
pub const IMAGE_FIELD: &str = "image";

/// Create the main API router.
pub fn create_router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.body_limit);

    Router::new()
        .route("/health", get(health::health))
        .route("/detect", post(detect::detect).layer(body_limit))
        .route("/process", post(process::process).layer(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Pulls the uploaded image out of a multipart request.
///
/// Non-multipart requests and requests without an `image` file part are
/// reported as [`DetectError::MissingImage`].
async fn extract_image(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Bytes, ApiError> {
    let mut multipart = match multipart {
        Ok(m) => m,
        Err(rejection) => {
            debug!("Not a multipart request: {rejection}");
            return Err(DetectError::MissingImage.into());
        }
    };

    while let Some(field) = multipart.next_field().await? {
        // Only file parts count as uploads
        if field.name() == Some(IMAGE_FIELD) && field.file_name().is_some() {
            return Ok(field.bytes().await?);
        }
    }
    Err(DetectError::MissingImage.into())
}

/// Runs CPU-bound request work on a blocking worker.
///
/// A panicked worker becomes [`DetectError::Unknown`]; server-side failures
/// are logged before being returned.
async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, DetectError> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(work).await.map_err(|e| {
        warn!("Request task failed: {e}");
        DetectError::Unknown(format!("detection task failed: {e}"))
    })?;

    result.map_err(|e| {
        if !e.is_client_error() {
            warn!("Request failed: {e}");
        }
        e.into()
    })
}
