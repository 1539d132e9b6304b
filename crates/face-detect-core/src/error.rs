//! Errors surfaced by the detection pipeline.

use thiserror::Error;

/// Failure of a single detection request.
#[derive(Debug, Error)]
pub enum DetectError {
    /// The request carried no image.
    #[error("No image provided")]
    MissingImage,

    /// The uploaded bytes could not be decoded as an image.
    #[error("Invalid image")]
    InvalidImage(#[source] image::ImageError),

    /// The detector failed.
    #[error("inference failed: {0:#}")]
    Inference(anyhow::Error),

    /// Re-encoding the image failed.
    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    /// Anything else, e.g. a panicked worker.
    #[error("{0}")]
    Unknown(String),
}

impl DetectError {
    /// Stable machine-readable name of the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingImage => "missing_image",
            Self::InvalidImage(_) => "invalid_image",
            Self::Inference(_) => "inference",
            Self::Encode(_) => "encode",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Returns true if the error was caused by the request itself.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::MissingImage | Self::InvalidImage(_))
    }
}
