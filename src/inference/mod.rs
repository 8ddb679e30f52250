//! Inference backend access
//!
//! One request per sampled frame. Clients never retry: a failed frame is
//! reported to the caller, which logs it and moves on to the next tick.

mod http;

pub use http::{BackendHealth, HttpInferenceClient};

use crate::error::InferenceError;
use crate::sampler::EncodedFrame;
use async_trait::async_trait;

/// Transcription returned for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub text: String,
    /// Always within `[0, 1]`
    pub confidence: f64,
}

impl Prediction {
    pub fn new(text: impl Into<String>, confidence: f64) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            text: text.into(),
            confidence,
        }
    }

    /// No transcription this tick
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Submit one frame and wait for its prediction
    async fn send(&self, frame: EncodedFrame) -> Result<Prediction, InferenceError>;

    /// Clear any per-client state the backend keeps between frames
    async fn reset(&self) -> Result<(), InferenceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(Prediction::new("a", 1.7).confidence, 1.0);
        assert_eq!(Prediction::new("a", -0.2).confidence, 0.0);
        assert_eq!(Prediction::new("a", f64::NAN).confidence, 0.0);
        assert_eq!(Prediction::new("a", 0.42).confidence, 0.42);
    }

    #[test]
    fn test_empty_prediction() {
        assert!(Prediction::new("", 0.5).is_empty());
        assert!(!Prediction::new("hello", 0.5).is_empty());
    }
}
