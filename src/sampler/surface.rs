//! Video and drawing surfaces

use crate::camera::{FrameSlot, MediaStream};
use image::RgbImage;
use tracing::debug;

/// Displays the frames of an attached stream
///
/// Holds only a read handle on the stream's frames; the stream itself stays
/// with the session controller.
#[derive(Debug, Default)]
pub struct VideoSurface {
    source: Option<FrameSlot>,
    playing: bool,
}

impl VideoSurface {
    pub fn attach(&mut self, stream: &MediaStream) {
        debug!(stream_id = stream.id(), "Attaching stream to video surface");
        self.source = Some(stream.frame_slot());
        self.playing = false;
    }

    pub fn play(&mut self) {
        self.playing = self.source.is_some();
    }

    pub fn detach(&mut self) {
        self.source = None;
        self.playing = false;
    }

    #[allow(dead_code)]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Intrinsic size of the current frame; `(0, 0)` when detached, paused or
    /// before the first frame has been decoded
    pub fn video_dimensions(&self) -> (u32, u32) {
        match (&self.source, self.playing) {
            (Some(slot), true) => slot.dimensions(),
            _ => (0, 0),
        }
    }

    fn current_frame(&self) -> Option<&FrameSlot> {
        self.source.as_ref().filter(|_| self.playing)
    }
}

/// Off-screen canvas frames are drawn onto before encoding
#[derive(Debug)]
pub struct DrawingSurface {
    canvas: RgbImage,
}

impl Default for DrawingSurface {
    fn default() -> Self {
        Self {
            canvas: RgbImage::new(0, 0),
        }
    }
}

impl DrawingSurface {
    #[allow(dead_code)]
    pub fn dimensions(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    /// Reallocate the canvas when the requested size differs
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.canvas.dimensions() != (width, height) {
            self.canvas = RgbImage::new(width, height);
        }
    }

    /// Copy the video surface's current frame onto the canvas
    ///
    /// Returns false if the surface has no frame or its size no longer
    /// matches the canvas (the stream renegotiated between resize and draw).
    pub fn draw(&mut self, video: &VideoSurface) -> bool {
        let Some(slot) = video.current_frame() else {
            return false;
        };
        let canvas = &mut self.canvas;
        slot.with_frame(|frame| {
            if frame.dimensions() != canvas.dimensions() {
                return false;
            }
            canvas.copy_from_slice(frame.as_raw());
            true
        })
        .unwrap_or(false)
    }

    pub fn image(&self) -> &RgbImage {
        &self.canvas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{MediaTrack, TrackKind};
    use image::Rgb;

    fn stream_with_frame(width: u32, height: u32) -> MediaStream {
        let slot = FrameSlot::default();
        slot.publish(RgbImage::from_pixel(width, height, Rgb([10, 20, 30])));
        MediaStream::new(vec![MediaTrack::new(TrackKind::Video, "test")], slot)
    }

    #[test]
    fn test_video_dimensions_require_playback() {
        let stream = stream_with_frame(8, 6);
        let mut video = VideoSurface::default();
        assert_eq!(video.video_dimensions(), (0, 0));

        video.attach(&stream);
        assert_eq!(video.video_dimensions(), (0, 0));

        video.play();
        assert_eq!(video.video_dimensions(), (8, 6));

        video.detach();
        assert_eq!(video.video_dimensions(), (0, 0));
        assert!(!video.is_playing());
    }

    #[test]
    fn test_play_without_source_does_nothing() {
        let mut video = VideoSurface::default();
        video.play();
        assert!(!video.is_playing());
    }

    #[test]
    fn test_draw_copies_frame() {
        let stream = stream_with_frame(4, 4);
        let mut video = VideoSurface::default();
        video.attach(&stream);
        video.play();

        let mut canvas = DrawingSurface::default();
        canvas.resize(4, 4);
        assert!(canvas.draw(&video));
        assert_eq!(canvas.image().get_pixel(3, 3), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_draw_rejects_size_mismatch() {
        let stream = stream_with_frame(4, 4);
        let mut video = VideoSurface::default();
        video.attach(&stream);
        video.play();

        let mut canvas = DrawingSurface::default();
        canvas.resize(2, 2);
        assert!(!canvas.draw(&video));
    }
}
