use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid backend URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Camera acquisition errors
///
/// The two kinds are kept apart because the user is told different things:
/// a denied permission can be fixed in settings, a missing device cannot.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Frame capture errors
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Expected right after acquisition, before the first frame is decoded.
    #[error("Video surface has no dimensions yet")]
    NoVideoDimensions,

    #[error("Failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),
}

/// Inference request errors
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}
