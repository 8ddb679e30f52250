//! Camera stream types and handles

use image::RgbImage;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Which way the requested camera should face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    #[default]
    User,
    Environment,
}

/// Requested stream properties
///
/// Width and height are preferences, not requirements: a device may negotiate
/// a different size, which the video surface picks up from the decoded frames.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaConstraints {
    pub width: u32,
    pub height: u32,
    pub facing_mode: FacingMode,
    pub audio: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            facing_mode: FacingMode::User,
            audio: false,
        }
    }
}

/// Latest decoded frame of a stream
///
/// Written by the capture worker, read by the video surface. Empty until the
/// first frame has been decoded.
#[derive(Debug, Clone, Default)]
pub struct FrameSlot(Arc<RwLock<Option<RgbImage>>>);

impl FrameSlot {
    /// Replace the current frame
    pub fn publish(&self, frame: RgbImage) {
        match self.0.write() {
            Ok(mut slot) => *slot = Some(frame),
            Err(poisoned) => *poisoned.into_inner() = Some(frame),
        }
    }

    /// Drop the current frame
    pub fn clear(&self) {
        match self.0.write() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    /// Run `f` against the current frame, if there is one
    pub fn with_frame<R>(&self, f: impl FnOnce(&RgbImage) -> R) -> Option<R> {
        let guard = match self.0.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.as_ref().map(f)
    }

    /// Intrinsic size of the current frame, `(0, 0)` when empty
    pub fn dimensions(&self) -> (u32, u32) {
        self.with_frame(|frame| frame.dimensions()).unwrap_or((0, 0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum TrackKind {
    Video,
    Audio,
}

/// One track of a media stream
///
/// A track optionally owns the worker thread feeding it. Stopping the track
/// clears its live flag and joins the worker, so once `stop` returns the
/// device is no longer being read. The track stops itself when dropped.
pub struct MediaTrack {
    kind: TrackKind,
    label: String,
    live: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl MediaTrack {
    /// Create a live track with no worker behind it
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            live: Arc::new(AtomicBool::new(true)),
            worker: None,
        }
    }

    /// Create a live track driven by `worker` on a dedicated thread
    ///
    /// The worker receives the track's live flag and must return promptly once
    /// it reads `false`.
    pub fn spawn<F>(kind: TrackKind, label: impl Into<String>, worker: F) -> std::io::Result<Self>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let label = label.into();
        let live = Arc::new(AtomicBool::new(true));
        let worker_live = live.clone();
        let handle = thread::Builder::new()
            .name(format!("track:{label}"))
            .spawn(move || worker(worker_live))?;

        Ok(Self {
            kind,
            label,
            live,
            worker: Some(handle),
        })
    }

    #[allow(dead_code)]
    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Shared live flag, for observers that outlive the track
    pub fn live_flag(&self) -> Arc<AtomicBool> {
        self.live.clone()
    }

    /// Stop the track and wait for its worker to exit. Idempotent.
    pub fn stop(&mut self) {
        let was_live = self.live.swap(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!(track = %self.label, "Track worker panicked");
            }
        }
        if was_live {
            debug!(track = %self.label, kind = ?self.kind, "Track stopped");
        }
    }
}

impl Drop for MediaTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

/// An acquired camera stream
pub struct MediaStream {
    id: u64,
    tracks: Vec<MediaTrack>,
    frames: FrameSlot,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>, frames: FrameSlot) -> Self {
        Self {
            id: NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed),
            tracks,
            frames,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    #[allow(dead_code)]
    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    /// Read handle on the decoded frames, for attaching a video surface
    pub fn frame_slot(&self) -> FrameSlot {
        self.frames.clone()
    }

    /// True while any track is still live
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }

    /// Stop every track, blocking until each worker has exited
    pub fn stop_all_tracks(&mut self) {
        let was_active = self.is_active();
        for track in &mut self.tracks {
            track.stop();
        }
        self.frames.clear();
        if was_active {
            info!(stream_id = self.id, "Media stream released");
        }
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id)
            .field(
                "tracks",
                &self.tracks.iter().map(MediaTrack::label).collect::<Vec<_>>(),
            )
            .field("active", &self.is_active())
            .finish()
    }
}
