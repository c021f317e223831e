//! Caption update contract and sink abstraction.
//!
//! The pipeline publishes caption updates through the `CaptionSink` trait,
//! decoupling transcript logic from whatever renders the subtitles and
//! enabling unit tests without a UI.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// A subtitle update delivered to the UI collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionUpdate {
    /// Transcribed English text.
    pub english: String,
    /// Final text for the segment (incremental updates set this false).
    pub is_final: bool,
    /// Marks the subtitle as cleared after its display time elapsed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub should_clear: bool,
}

impl CaptionUpdate {
    /// Debounced partial text for the active segment.
    pub fn incremental(english: impl Into<String>) -> Self {
        Self {
            english: english.into(),
            is_final: false,
            should_clear: false,
        }
    }

    /// Final text for a segment, sent immediately.
    pub fn finalized(english: impl Into<String>) -> Self {
        Self {
            english: english.into(),
            is_final: true,
            should_clear: false,
        }
    }

    /// Explicit clear of a previously displayed final subtitle.
    pub fn clear() -> Self {
        Self {
            english: String::new(),
            is_final: true,
            should_clear: true,
        }
    }
}

/// Trait for delivering caption updates to subscribers.
///
/// Implementations must tolerate a finalized-transcription update and a
/// speech-stop final update arriving for the same segment in either
/// order: the latest final text is authoritative replacement text.
pub trait CaptionSink: Send + Sync {
    fn publish(&self, update: CaptionUpdate);

    /// Non-fatal service error surfaced to collaborators.
    fn report_error(&self, _message: &str) {}
}

/// Shared sink reference held by a session.
pub type CaptionSinkRef = Arc<dyn CaptionSink>;

/// In-memory sink for testing; captures everything published.
#[derive(Default)]
pub struct InMemoryCaptionSink {
    updates: Mutex<Vec<CaptionUpdate>>,
    errors: Mutex<Vec<String>>,
}

impl InMemoryCaptionSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured updates, in publish order.
    pub fn updates(&self) -> Vec<CaptionUpdate> {
        self.updates.lock().unwrap().clone()
    }

    /// Captured final updates only (clears included).
    pub fn finals(&self) -> Vec<CaptionUpdate> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.is_final)
            .cloned()
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.lock().unwrap().is_empty()
    }
}

impl CaptionSink for InMemoryCaptionSink {
    fn publish(&self, update: CaptionUpdate) {
        self.updates.lock().unwrap().push(update);
    }

    fn report_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

/// No-op sink that discards all updates.
pub struct NullCaptionSink;

impl CaptionSink for NullCaptionSink {
    fn publish(&self, _update: CaptionUpdate) {
        // Intentionally empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_sink_captures_in_order() {
        let sink = InMemoryCaptionSink::new();
        sink.publish(CaptionUpdate::incremental("hello"));
        sink.publish(CaptionUpdate::finalized("hello world"));
        sink.publish(CaptionUpdate::clear());

        let updates = sink.updates();
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0], CaptionUpdate::incremental("hello"));
        assert_eq!(sink.finals().len(), 2);
        assert!(sink.finals()[1].should_clear);
    }

    #[test]
    fn test_in_memory_sink_errors() {
        let sink = InMemoryCaptionSink::new();
        assert!(sink.errors().is_empty());
        sink.report_error("rate limited");
        assert_eq!(sink.errors(), vec!["rate limited".to_string()]);
    }

    #[test]
    fn test_null_sink() {
        let sink = NullCaptionSink;
        // Should not panic; default error hook is a no-op.
        sink.publish(CaptionUpdate::finalized("ignored"));
        sink.report_error("ignored");
    }

    #[test]
    fn test_serialization_omits_false_clear_flag() {
        let json = serde_json::to_string(&CaptionUpdate::incremental("hi")).unwrap();
        assert_eq!(json, r#"{"english":"hi","isFinal":false}"#);

        let json = serde_json::to_string(&CaptionUpdate::clear()).unwrap();
        assert_eq!(json, r#"{"english":"","isFinal":true,"shouldClear":true}"#);
    }

    #[test]
    fn test_deserialize_without_clear_flag() {
        let update: CaptionUpdate =
            serde_json::from_str(r#"{"english":"hey","isFinal":true}"#).unwrap();
        assert!(update.is_final);
        assert!(!update.should_clear);
    }
}
