//! Synthetic camera producing a moving test pattern

use super::types::{FrameSlot, MediaConstraints, MediaStream, MediaTrack, TrackKind};
use super::MediaSource;
use crate::error::CameraError;
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;

/// Roughly 30 frames per second
const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Camera that renders a test pattern at the requested resolution
///
/// Like a real device, the first frame only shows up after one frame
/// interval, so the video surface has no dimensions right after `acquire`.
pub struct SyntheticCamera {
    frame_interval: Duration,
}

impl SyntheticCamera {
    pub fn new() -> Self {
        Self {
            frame_interval: DEFAULT_FRAME_INTERVAL,
        }
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaSource for SyntheticCamera {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<MediaStream, CameraError> {
        if constraints.width == 0 || constraints.height == 0 {
            return Err(CameraError::DeviceUnavailable(
                "requested a zero-sized video track".into(),
            ));
        }

        let frames = FrameSlot::default();
        let writer = frames.clone();
        let (width, height) = (constraints.width, constraints.height);
        let interval = self.frame_interval;

        let track = MediaTrack::spawn(TrackKind::Video, "synthetic", move |live| {
            run_pattern(&live, &writer, width, height, interval)
        })
        .map_err(|e| CameraError::DeviceUnavailable(e.to_string()))?;

        info!(width, height, "Synthetic camera started");
        Ok(MediaStream::new(vec![track], frames))
    }
}

fn run_pattern(live: &Arc<AtomicBool>, frames: &FrameSlot, width: u32, height: u32, interval: Duration) {
    let mut frame_number: u32 = 0;
    while live.load(Ordering::SeqCst) {
        thread::sleep(interval);
        if !live.load(Ordering::SeqCst) {
            break;
        }
        frames.publish(render_pattern(width, height, frame_number));
        frame_number = frame_number.wrapping_add(1);
    }
}

/// Diagonal gradient with a dark band sweeping vertically
fn render_pattern(width: u32, height: u32, frame_number: u32) -> RgbImage {
    let band_center = (frame_number.wrapping_mul(4)) % height.max(1);
    RgbImage::from_fn(width, height, |x, y| {
        if y.abs_diff(band_center) < height / 16 + 1 {
            return Rgb([24, 24, 24]);
        }
        let r = ((x + frame_number) % 256) as u8;
        let g = ((y + frame_number / 2) % 256) as u8;
        let b = ((x + y) / 4 % 256) as u8;
        Rgb([r, g, b])
    })
}
