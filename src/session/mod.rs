//! Live session controller
//!
//! Owns the camera stream, the sampling timer and the derived view state of
//! one capture-and-inference session at a time.
//!
//! # Concurrency
//! All state lives behind one mutex that is never held across an `.await`.
//! Every session is tagged with an epoch that is bumped on start and on
//! teardown. Ticks capture frames only while holding the lock and only if
//! their epoch is current, so nothing is captured from a stream that has
//! begun release. Inference calls are not cancelled on stop; their results
//! carry the epoch that issued them and are dropped if it no longer matches.
//!
//! Ticks do not wait for earlier calls, so several calls may be in flight and
//! may resolve out of order. The subtitle shows the last *resolved*
//! prediction, not the last *sent* one.

mod state;

pub use state::{SessionSnapshot, SessionStatus};

use crate::camera::{self, MediaConstraints, MediaSource, MediaStream};
use crate::config::Config;
use crate::error::{CameraError, CaptureError, InferenceError};
use crate::inference::{InferenceClient, Prediction};
use crate::sampler::{FrameSampler, SamplingTimer};
use state::{fold_prediction, ErrorBanner, History, Subtitle};
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

pub(crate) const PERMISSION_DENIED_MESSAGE: &str =
    "Camera access denied. Please enable camera permissions.";
pub(crate) const CAMERA_UNAVAILABLE_MESSAGE: &str =
    "Failed to access camera. Ensure camera is available and working.";

/// Session tuning
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub constraints: MediaConstraints,
    pub sample_interval: Duration,
    pub jpeg_quality: u8,
    /// `None` lets ticks pile up calls without bound
    pub max_in_flight: Option<usize>,
    pub error_display: Duration,
    pub history_limit: usize,
    pub reset_backend_on_start: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            constraints: MediaConstraints::default(),
            sample_interval: Duration::from_millis(500),
            jpeg_quality: 80,
            max_in_flight: None,
            error_display: Duration::from_secs(6),
            history_limit: 10,
            reset_backend_on_start: false,
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            constraints: config.camera.constraints(),
            sample_interval: config.sampling.interval(),
            jpeg_quality: config.sampling.jpeg_quality,
            max_in_flight: config.sampling.max_in_flight,
            error_display: config.display.error_display(),
            history_limit: config.display.history_limit,
            reset_backend_on_start: config.backend.reset_on_start,
        }
    }
}

/// Drives one live session at a time
///
/// Dropping the controller releases the camera whatever state it is in.
pub struct SessionController {
    inner: Arc<Inner>,
}

struct Inner {
    source: Arc<dyn MediaSource>,
    client: Arc<dyn InferenceClient>,
    config: SessionConfig,
    state: Mutex<ControllerState>,
    view_tx: watch::Sender<SessionSnapshot>,
}

struct ControllerState {
    status: SessionStatus,
    epoch: u64,
    stream: Option<MediaStream>,
    timer: Option<SamplingTimer>,
    sampler: FrameSampler,
    subtitle: Subtitle,
    history: History,
    /// Calls of the current epoch not yet resolved
    in_flight: usize,
    error: Option<ErrorBanner>,
    next_error_id: u64,
}

impl ControllerState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            subtitle_text: self.subtitle.text.clone(),
            confidence: self.subtitle.confidence,
            is_loading: self.in_flight > 0,
            error_message: self.error.as_ref().map(|e| e.message.clone()),
            history: self.history.to_vec(),
        }
    }
}

impl SessionController {
    pub fn new(
        source: Arc<dyn MediaSource>,
        client: Arc<dyn InferenceClient>,
        config: SessionConfig,
    ) -> Self {
        let state = ControllerState {
            status: SessionStatus::Idle,
            epoch: 0,
            stream: None,
            timer: None,
            sampler: FrameSampler::new(config.jpeg_quality),
            subtitle: Subtitle::default(),
            history: History::new(config.history_limit),
            in_flight: 0,
            error: None,
            next_error_id: 0,
        };
        let (view_tx, _) = watch::channel(state.snapshot());

        Self {
            inner: Arc::new(Inner {
                source,
                client,
                config,
                state: Mutex::new(state),
                view_tx,
            }),
        }
    }

    /// Current view state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().snapshot()
    }

    /// Receive a fresh snapshot on every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.view_tx.subscribe()
    }

    /// Open the camera and go live
    ///
    /// No-op unless idle. A failure to open the camera is shown through the
    /// error banner and leaves the session idle.
    pub async fn start(&self) {
        let epoch = {
            let mut state = self.inner.lock();
            if state.status != SessionStatus::Idle {
                debug!(status = %state.status, "Start ignored, session already active");
                return;
            }
            state.epoch += 1;
            state.status = SessionStatus::Starting;
            state.error = None;
            self.inner.publish(&state);
            state.epoch
        };
        info!(epoch, "Starting live session");

        let result = self.inner.source.acquire(&self.inner.config.constraints).await;

        let mut state = self.inner.lock();
        if state.epoch != epoch {
            if let Ok(stream) = result {
                camera::release(&mut Some(stream));
            }
            info!(epoch, "Session stopped while the camera was opening");
            return;
        }

        match result {
            Ok(stream) => {
                state.sampler.attach(&stream);
                state.stream = Some(stream);
                state.status = SessionStatus::Live;
                state.subtitle.clear();
                state.error = None;
                state.timer = Some(self.inner.start_timer(epoch));
                self.inner.publish(&state);
                drop(state);

                info!(epoch, "Session live");
                if self.inner.config.reset_backend_on_start {
                    self.inner.spawn_backend_reset();
                }
            }
            Err(e) => {
                error!(epoch, error = %e, "Camera access error");
                state.status = SessionStatus::Idle;
                self.inner.show_error(&mut state, camera_error_message(&e));
                self.inner.publish(&state);
            }
        }
    }

    /// Leave the live session
    ///
    /// The sampling timer is cancelled before the camera is released, and the
    /// camera is released before this returns. History is kept.
    pub fn stop(&self) {
        self.inner.teardown("stop");
    }

    /// Release everything, whatever the current state
    pub fn dispose(&self) {
        self.inner.teardown("dispose");
    }

    pub fn dismiss_error(&self) {
        let mut state = self.inner.lock();
        if state.error.take().is_some() {
            self.inner.publish(&state);
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Inner {
    /// Lock the controller state, recovering from a poisoned mutex
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => {
                warn!("Session mutex was poisoned, recovering state");
                poisoned.into_inner()
            }
        }
    }

    fn publish(&self, state: &ControllerState) {
        self.view_tx.send_replace(state.snapshot());
    }

    fn start_timer(self: &Arc<Self>, epoch: u64) -> SamplingTimer {
        let weak = Arc::downgrade(self);
        SamplingTimer::start(self.config.sample_interval, move || match weak.upgrade() {
            Some(inner) => inner.on_tick(epoch),
            None => ControlFlow::Break(()),
        })
    }

    fn on_tick(self: &Arc<Self>, epoch: u64) -> ControlFlow<()> {
        let mut state = self.lock();
        if state.epoch != epoch || state.status != SessionStatus::Live {
            return ControlFlow::Break(());
        }
        if let Some(limit) = self.config.max_in_flight {
            if state.in_flight >= limit {
                debug!(epoch, in_flight = state.in_flight, "Skipping tick, backend is behind");
                return ControlFlow::Continue(());
            }
        }

        let frame = match state.sampler.capture_frame() {
            Ok(frame) => frame,
            Err(CaptureError::NoVideoDimensions) => {
                trace!(epoch, "No video frame yet, skipping tick");
                return ControlFlow::Continue(());
            }
            Err(e) => {
                warn!(epoch, error = %e, "Frame capture failed");
                return ControlFlow::Continue(());
            }
        };
        let (width, height) = frame.dimensions();
        trace!(epoch, width, height, "Frame captured");
        state.in_flight += 1;
        self.publish(&state);
        drop(state);

        let client = self.client.clone();
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let result = client.send(frame).await;
            if let Some(inner) = weak.upgrade() {
                inner.fold(epoch, result);
            }
        });
        ControlFlow::Continue(())
    }

    fn fold(&self, epoch: u64, result: Result<Prediction, InferenceError>) {
        let mut state = self.lock();
        if state.epoch != epoch {
            debug!(epoch, current_epoch = state.epoch, "Discarding result of an ended session");
            return;
        }
        state.in_flight = state.in_flight.saturating_sub(1);

        match result {
            Ok(prediction) => {
                if !prediction.is_empty() {
                    debug!(
                        epoch,
                        text = %prediction.text,
                        confidence = prediction.confidence,
                        "Prediction received"
                    );
                }
                let state = &mut *state;
                fold_prediction(&mut state.subtitle, &mut state.history, prediction);
            }
            // Per-frame failures are expected now and then and never reach the user
            Err(e) => warn!(epoch, error = %e, "Frame processing error"),
        }
        self.publish(&state);
    }

    fn teardown(&self, reason: &'static str) {
        let mut state = self.lock();
        if state.status == SessionStatus::Idle && state.stream.is_none() && state.timer.is_none() {
            return;
        }

        let previous = state.status;
        state.status = SessionStatus::Stopping;
        state.epoch += 1;
        if let Some(timer) = state.timer.take() {
            timer.cancel();
        }
        camera::release(&mut state.stream);
        state.sampler.detach();
        state.subtitle.clear();
        state.in_flight = 0;
        state.status = SessionStatus::Idle;
        self.publish(&state);

        info!(reason, previous = %previous, "Session stopped");
    }

    fn show_error(self: &Arc<Self>, state: &mut ControllerState, message: &str) {
        state.next_error_id += 1;
        let id = state.next_error_id;
        state.error = Some(ErrorBanner {
            id,
            message: message.to_string(),
        });

        let expiry = tokio::time::sleep(self.config.error_display);
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            expiry.await;
            if let Some(inner) = weak.upgrade() {
                inner.expire_error(id);
            }
        });
    }

    fn expire_error(&self, id: u64) {
        let mut state = self.lock();
        if state.error.as_ref().is_some_and(|banner| banner.id == id) {
            state.error = None;
            self.publish(&state);
        }
    }

    fn spawn_backend_reset(&self) {
        let client = self.client.clone();
        tokio::spawn(async move {
            if let Err(e) = client.reset().await {
                warn!(error = %e, "Failed to reset backend frame history");
            }
        });
    }
}

fn camera_error_message(error: &CameraError) -> &'static str {
    match error {
        CameraError::PermissionDenied(_) => PERMISSION_DENIED_MESSAGE,
        CameraError::DeviceUnavailable(_) => CAMERA_UNAVAILABLE_MESSAGE,
    }
}
