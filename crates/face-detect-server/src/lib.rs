//! Face Detect Server - HTTP face detection service.
//!
//! Exposes `GET /health`, `POST /detect` and `POST /process` over axum, with
//! the detector loaded once at startup and shared through [`AppState`].

pub mod api;
pub mod config;
pub mod error;
pub mod state;

pub use api::create_router;
pub use error::ApiError;
pub use state::AppState;
