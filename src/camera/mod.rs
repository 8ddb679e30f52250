//! Camera access
//!
//! A [`MediaSource`] hands out [`MediaStream`]s; [`release`] gives them back.
//! Every acquired stream must be released exactly once, which the session
//! controller guarantees by owning the stream for its whole lifetime.
//!
//! Two sources exist: a synthetic test pattern (always available) and a
//! V4L2 device reader behind the `camera-v4l2` feature.

mod synthetic;
mod types;
#[cfg(feature = "camera-v4l2")]
mod v4l2;

pub use synthetic::SyntheticCamera;
pub use types::{FacingMode, FrameSlot, MediaConstraints, MediaStream, MediaTrack, TrackKind};
#[cfg(feature = "camera-v4l2")]
pub use v4l2::V4l2Camera;

use crate::config::{CameraBackend, CameraConfig};
use crate::error::{CameraError, ConfigError};
use async_trait::async_trait;
use std::sync::Arc;

/// Something that can open a camera stream
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Open a video stream matching `constraints` as closely as the device allows
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<MediaStream, CameraError>;
}

/// Stop every track of `stream` and clear the handle
///
/// Safe to call on `None` or on a stream that was already released. Returns
/// only after all capture workers have exited.
pub fn release(stream: &mut Option<MediaStream>) {
    if let Some(mut stream) = stream.take() {
        stream.stop_all_tracks();
    }
}

/// Build the camera source selected in configuration
pub(crate) fn from_config(config: &CameraConfig) -> Result<Arc<dyn MediaSource>, ConfigError> {
    match config.backend {
        CameraBackend::Synthetic => Ok(Arc::new(SyntheticCamera::new())),
        CameraBackend::V4l2 => v4l2_source(config),
    }
}

#[cfg(feature = "camera-v4l2")]
fn v4l2_source(config: &CameraConfig) -> Result<Arc<dyn MediaSource>, ConfigError> {
    Ok(Arc::new(V4l2Camera::new(&config.device)))
}

#[cfg(not(feature = "camera-v4l2"))]
fn v4l2_source(_config: &CameraConfig) -> Result<Arc<dyn MediaSource>, ConfigError> {
    Err(ConfigError::Invalid(
        "camera.backend = \"v4l2\" requires building with the camera-v4l2 feature".into(),
    ))
}
