//! Derived view state of a live session

use crate::inference::Prediction;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Starting,
    Live,
    Stopping,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "idle"),
            SessionStatus::Starting => write!(f, "starting"),
            SessionStatus::Live => write!(f, "live"),
            SessionStatus::Stopping => write!(f, "stopping"),
        }
    }
}

/// Most recently resolved transcription
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Subtitle {
    pub(crate) text: String,
    pub(crate) confidence: f64,
}

impl Subtitle {
    pub(crate) fn clear(&mut self) {
        self.text.clear();
        self.confidence = 0.0;
    }
}

/// Distinct recent predictions, newest first
#[derive(Debug, Clone)]
pub(crate) struct History {
    entries: VecDeque<String>,
    limit: usize,
}

impl History {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
        }
    }

    /// Prepend `text` unless it is already present anywhere in the history
    ///
    /// Returns true if the entry was added.
    pub(crate) fn push(&mut self, text: &str) -> bool {
        if self.entries.iter().any(|entry| entry == text) {
            return false;
        }
        self.entries.push_front(text.to_string());
        self.entries.truncate(self.limit);
        true
    }

    pub(crate) fn to_vec(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    #[allow(dead_code)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The single visible error message
#[derive(Debug, Clone)]
pub(crate) struct ErrorBanner {
    /// Lets an expiry timer tell whether the banner it was started for is
    /// still the one showing
    pub(crate) id: u64,
    pub(crate) message: String,
}

/// Everything the presentation layer may read
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub subtitle_text: String,
    pub confidence: f64,
    pub is_loading: bool,
    pub error_message: Option<String>,
    pub history: Vec<String>,
}

impl SessionSnapshot {
    pub fn is_live(&self) -> bool {
        self.status == SessionStatus::Live
    }
}

/// Apply a prediction to the subtitle and history
///
/// Empty predictions leave both untouched. Returns true if anything changed.
pub(crate) fn fold_prediction(
    subtitle: &mut Subtitle,
    history: &mut History,
    prediction: Prediction,
) -> bool {
    if prediction.is_empty() {
        return false;
    }
    history.push(&prediction.text);
    subtitle.text = prediction.text;
    subtitle.confidence = prediction.confidence;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_newest_first() {
        let mut history = History::new(10);
        history.push("hi");
        history.push("hello");
        assert_eq!(history.to_vec(), vec!["hello", "hi"]);
    }

    #[test]
    fn test_history_deduplicates_against_all_entries() {
        let mut history = History::new(10);
        assert!(history.push("a"));
        assert!(history.push("b"));
        assert!(!history.push("a"));
        assert_eq!(history.to_vec(), vec!["b", "a"]);
    }

    #[test]
    fn test_history_is_capped() {
        let mut history = History::new(10);
        for i in 0..25 {
            history.push(&format!("word {i}"));
        }
        assert_eq!(history.len(), 10);
        let entries = history.to_vec();
        assert_eq!(entries[0], "word 24");
        assert_eq!(entries[9], "word 15");
    }

    #[test]
    fn test_evicted_entry_can_return() {
        let mut history = History::new(2);
        history.push("a");
        history.push("b");
        history.push("c");
        assert!(history.push("a"));
        assert_eq!(history.to_vec(), vec!["a", "c"]);
    }

    #[test]
    fn test_fold_ignores_empty_prediction() {
        let mut subtitle = Subtitle {
            text: "hello".into(),
            confidence: 0.9,
        };
        let mut history = History::new(10);
        assert!(!fold_prediction(
            &mut subtitle,
            &mut history,
            Prediction::new("", 0.4)
        ));
        assert_eq!(subtitle.text, "hello");
        assert_eq!(subtitle.confidence, 0.9);
        assert_eq!(history.len(), 0);
    }

    #[test]
    fn test_fold_overwrites_subtitle_even_for_known_text() {
        let mut subtitle = Subtitle::default();
        let mut history = History::new(10);
        fold_prediction(&mut subtitle, &mut history, Prediction::new("hi", 0.5));
        fold_prediction(&mut subtitle, &mut history, Prediction::new("hello", 0.9));
        fold_prediction(&mut subtitle, &mut history, Prediction::new("hi", 0.7));

        assert_eq!(subtitle.text, "hi");
        assert_eq!(subtitle.confidence, 0.7);
        assert_eq!(history.to_vec(), vec!["hello", "hi"]);
    }
}
