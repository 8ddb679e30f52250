//! Frame sampling
//!
//! Pulls single stills off the live video surface and encodes them as JPEG
//! data URLs ready to be posted to the inference backend. The cadence comes
//! from [`SamplingTimer`].

mod surface;
mod timer;

pub use surface::{DrawingSurface, VideoSurface};
pub use timer::SamplingTimer;

use crate::camera::MediaStream;
use crate::error::CaptureError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// An encoded still, ready to send
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    data_url: String,
    width: u32,
    height: u32,
}

impl EncodedFrame {
    pub fn new(data_url: String, width: u32, height: u32) -> Self {
        Self {
            data_url,
            width,
            height,
        }
    }

    pub fn as_data_url(&self) -> &str {
        &self.data_url
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Captures frames from a video surface through an off-screen canvas
#[derive(Debug)]
pub struct FrameSampler {
    video: VideoSurface,
    canvas: DrawingSurface,
    jpeg_quality: u8,
}

impl FrameSampler {
    /// `jpeg_quality` is on the 1..=100 scale
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            video: VideoSurface::default(),
            canvas: DrawingSurface::default(),
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    /// Show `stream` on the video surface and start playback
    pub fn attach(&mut self, stream: &MediaStream) {
        self.video.attach(stream);
        self.video.play();
    }

    pub fn detach(&mut self) {
        self.video.detach();
    }

    /// Grab and encode the frame currently shown on the video surface
    ///
    /// The canvas is resized to the intrinsic video size first, since that
    /// size is only known once the stream has delivered a frame.
    pub fn capture_frame(&mut self) -> Result<EncodedFrame, CaptureError> {
        let (width, height) = self.video.video_dimensions();
        if width == 0 || height == 0 {
            return Err(CaptureError::NoVideoDimensions);
        }

        self.canvas.resize(width, height);
        if !self.canvas.draw(&self.video) {
            return Err(CaptureError::NoVideoDimensions);
        }

        let data_url = encode_jpeg_data_url(self.canvas.image(), self.jpeg_quality)?;
        Ok(EncodedFrame::new(data_url, width, height))
    }
}

fn encode_jpeg_data_url(image: &RgbImage, quality: u8) -> Result<String, CaptureError> {
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality).encode_image(image)?;
    Ok(format!("{JPEG_DATA_URL_PREFIX}{}", STANDARD.encode(&jpeg)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{FrameSlot, MediaTrack, TrackKind};
    use image::Rgb;

    fn live_stream(slot: &FrameSlot) -> MediaStream {
        MediaStream::new(vec![MediaTrack::new(TrackKind::Video, "test")], slot.clone())
    }

    fn decode(frame: &EncodedFrame) -> image::DynamicImage {
        let payload = frame
            .as_data_url()
            .strip_prefix(JPEG_DATA_URL_PREFIX)
            .expect("data URL prefix");
        let bytes = STANDARD.decode(payload).expect("valid base64");
        image::load_from_memory(&bytes).expect("valid jpeg")
    }

    #[test]
    fn test_capture_before_first_frame() {
        let slot = FrameSlot::default();
        let stream = live_stream(&slot);
        let mut sampler = FrameSampler::new(80);
        sampler.attach(&stream);

        assert!(matches!(
            sampler.capture_frame(),
            Err(CaptureError::NoVideoDimensions)
        ));
    }

    #[test]
    fn test_capture_when_detached() {
        let mut sampler = FrameSampler::new(80);
        assert!(matches!(
            sampler.capture_frame(),
            Err(CaptureError::NoVideoDimensions)
        ));
    }

    #[test]
    fn test_capture_encodes_jpeg_data_url() {
        let slot = FrameSlot::default();
        slot.publish(RgbImage::from_pixel(64, 48, Rgb([200, 40, 40])));
        let stream = live_stream(&slot);
        let mut sampler = FrameSampler::new(80);
        sampler.attach(&stream);

        let frame = sampler.capture_frame().expect("capture");
        assert!(frame.as_data_url().starts_with("data:image/jpeg;base64,"));
        assert_eq!(frame.dimensions(), (64, 48));

        let decoded = decode(&frame);
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn test_canvas_follows_renegotiated_size() {
        let slot = FrameSlot::default();
        slot.publish(RgbImage::new(32, 24));
        let stream = live_stream(&slot);
        let mut sampler = FrameSampler::new(80);
        sampler.attach(&stream);

        sampler.capture_frame().expect("first capture");
        slot.publish(RgbImage::new(16, 12));
        let frame = sampler.capture_frame().expect("second capture");

        assert_eq!(frame.dimensions(), (16, 12));
        assert_eq!(sampler.canvas.dimensions(), (16, 12));
    }

    #[test]
    fn test_quality_is_clamped() {
        let sampler = FrameSampler::new(0);
        assert_eq!(sampler.jpeg_quality, 1);
    }
}
