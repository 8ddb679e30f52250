//! V4L2 device camera
//!
//! Negotiates MJPG at the preferred resolution and decodes every buffer into
//! the stream's frame slot on a dedicated capture thread. Buffers are mapped
//! and streaming is switched on before `acquire` returns, so a busy device
//! fails the acquisition instead of producing an empty session.

use super::types::{FrameSlot, MediaConstraints, MediaStream, MediaTrack, TrackKind};
use super::MediaSource;
use crate::error::CameraError;
use async_trait::async_trait;
use image::ImageFormat;
use ouroboros::self_referencing;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, trace, warn};
use v4l::buffer::Type;
use v4l::io::traits::{CaptureStream, Stream};
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

/// Number of mmap buffers requested from the driver
const BUFFER_COUNT: u32 = 4;

/// Longest a dequeue may block before the live flag is checked again
const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(200);

/// An open device together with its mapped buffer stream
#[self_referencing]
struct CaptureState {
    device: Device,
    #[borrows(device)]
    #[covariant]
    stream: MmapStream<'this>,
}

pub struct V4l2Camera {
    device_path: PathBuf,
}

impl V4l2Camera {
    pub fn new(device_path: impl Into<PathBuf>) -> Self {
        Self {
            device_path: device_path.into(),
        }
    }
}

#[async_trait]
impl MediaSource for V4l2Camera {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<MediaStream, CameraError> {
        let path = self.device_path.clone();
        let constraints = constraints.clone();
        tokio::task::spawn_blocking(move || open_stream(path, &constraints))
            .await
            .map_err(|e| CameraError::DeviceUnavailable(format!("camera open task failed: {e}")))?
    }
}

fn open_stream(path: PathBuf, constraints: &MediaConstraints) -> Result<MediaStream, CameraError> {
    let label = path.display().to_string();
    let device = Device::with_path(&path).map_err(|e| classify(&label, e))?;

    let mut format = device.format().map_err(|e| classify(&label, e))?;
    format.width = constraints.width;
    format.height = constraints.height;
    format.fourcc = FourCC::new(b"MJPG");

    let format = match device.set_format(&format) {
        Ok(format) => format,
        Err(e) => {
            warn!(device = %label, error = %e, "Failed to set preferred format");
            device.format().map_err(|e| classify(&label, e))?
        }
    };
    if format.fourcc != FourCC::new(b"MJPG") {
        return Err(CameraError::DeviceUnavailable(format!(
            "{label} does not support MJPG capture (got {})",
            format.fourcc
        )));
    }

    let mut capture = CaptureStateTryBuilder {
        device,
        stream_builder: |device| MmapStream::with_buffers(device, Type::VideoCapture, BUFFER_COUNT),
    }
    .try_build()
    .map_err(|e| classify(&label, e))?;
    capture
        .with_stream_mut(|stream| {
            stream.set_timeout(DEQUEUE_TIMEOUT);
            stream.start()
        })
        .map_err(|e| classify(&label, e))?;

    info!(
        device = %label,
        width = format.width,
        height = format.height,
        "V4L2 camera opened"
    );

    let frames = FrameSlot::default();
    let writer = frames.clone();
    let track_label = label.clone();
    let track = MediaTrack::spawn(TrackKind::Video, label, move |live| {
        let result = capture.with_stream_mut(|stream| {
            let result = capture_loop(stream, &writer, &live);
            if let Err(e) = stream.stop() {
                warn!(device = %track_label, error = %e, "Failed to stop V4L2 streaming");
            }
            result
        });
        if let Err(e) = result {
            error!(device = %track_label, error = %e, "V4L2 capture stopped");
            live.store(false, Ordering::SeqCst);
        }
    })
    .map_err(|e| CameraError::DeviceUnavailable(e.to_string()))?;

    Ok(MediaStream::new(vec![track], frames))
}

fn capture_loop(
    stream: &mut MmapStream<'_>,
    frames: &FrameSlot,
    live: &Arc<AtomicBool>,
) -> io::Result<()> {
    while live.load(Ordering::SeqCst) {
        let buf = match stream.next() {
            Ok((buf, _meta)) => buf,
            Err(e) if is_timeout(&e) => {
                trace!("No V4L2 buffer within the dequeue timeout");
                continue;
            }
            Err(e) => return Err(e),
        };
        match image::load_from_memory_with_format(buf, ImageFormat::Jpeg) {
            Ok(decoded) => frames.publish(decoded.to_rgb8()),
            Err(e) => warn!(error = %e, "Dropping undecodable MJPG buffer"),
        }
    }
    Ok(())
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

fn classify(device: &str, err: io::Error) -> CameraError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => CameraError::PermissionDenied(format!("{device}: {err}")),
        _ => CameraError::DeviceUnavailable(format!("{device}: {err}")),
    }
}
