//! Transcript event interpreter.
//!
//! A state machine over the realtime service's event stream. It tracks the
//! word list for the active speech segment and translates each event into
//! a list of [`TranscriptOutput`] actions for the session loop to execute.
//! Keeping the interpreter free of timers and I/O means every segment
//! behavior tests without a runtime.

use livecap_protocol::{ApiError, ServerEvent};

/// Non-benign error reported by the realtime service.
///
/// Non-fatal to the session; surfaced to collaborators exactly once.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("realtime service error ({code}): {message}")]
pub struct ServiceError {
    pub code: String,
    pub message: String,
}

impl From<&ApiError> for ServiceError {
    fn from(error: &ApiError) -> Self {
        Self {
            code: error.code.clone().unwrap_or_else(|| "unknown".into()),
            message: error.message.clone().unwrap_or_default(),
        }
    }
}

/// Actions the session loop must take in response to a server event.
///
/// Order within the returned vector is significant and must be applied
/// front to back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptOutput {
    /// Schedule (or reschedule) the debounced incremental update. The
    /// payload is read from [`TranscriptInterpreter::current_text`] when
    /// the timer fires, not now.
    ScheduleIncremental,
    /// Cancel any pending incremental update.
    CancelIncremental,
    /// Publish a final caption immediately, bypassing the debouncer.
    EmitFinal(String),
    /// Schedule the post-final subtitle clear.
    ScheduleClear,
    /// Reset the audio commit counters.
    ResetCommitCounters,
    /// Surface a non-benign service error.
    ServiceError(ServiceError),
}

/// Running transcript state for the capture session.
///
/// Segment state (word list, accumulated text) is bounded by
/// `speech_started`/`speech_stopped`; a `speech_started` while a segment
/// is already active restarts the segment rather than erroring.
#[derive(Debug, Default)]
pub struct TranscriptInterpreter {
    words: Vec<String>,
    accumulated: String,
    segment_active: bool,
}

impl TranscriptInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The joined word list for the active segment, read at debounce
    /// fire time.
    pub fn current_text(&self) -> String {
        self.words.join(" ")
    }

    /// Raw delta text accumulated for the active segment.
    pub fn accumulated_text(&self) -> &str {
        &self.accumulated
    }

    pub fn is_segment_active(&self) -> bool {
        self.segment_active
    }

    /// Drop all segment state (session teardown).
    pub fn reset(&mut self) {
        self.words.clear();
        self.accumulated.clear();
        self.segment_active = false;
    }

    /// Process one server event, returning the actions it implies.
    pub fn handle(&mut self, event: &ServerEvent) -> Vec<TranscriptOutput> {
        match event {
            ServerEvent::SessionCreated | ServerEvent::SessionUpdated => Vec::new(),

            ServerEvent::SpeechStarted => {
                // Fresh segment, even if one was already active.
                self.words.clear();
                self.accumulated.clear();
                self.segment_active = true;
                vec![
                    TranscriptOutput::CancelIncremental,
                    TranscriptOutput::ResetCommitCounters,
                ]
            }

            ServerEvent::SpeechStopped => {
                self.segment_active = false;
                let mut outputs = vec![TranscriptOutput::CancelIncremental];
                if !self.words.is_empty() {
                    outputs.push(TranscriptOutput::EmitFinal(self.current_text()));
                    outputs.push(TranscriptOutput::ScheduleClear);
                    self.words.clear();
                }
                outputs.push(TranscriptOutput::ResetCommitCounters);
                outputs
            }

            ServerEvent::TranscriptionDelta { delta } => {
                self.words
                    .extend(delta.split_whitespace().map(str::to_string));
                self.accumulated.push_str(delta);
                vec![TranscriptOutput::ScheduleIncremental]
            }

            ServerEvent::TranscriptionCompleted { transcript } => {
                // Authoritative final text; can arrive before or after
                // speech_stopped and replaces whatever is displayed.
                self.accumulated = transcript.clone();
                self.words.clear();
                vec![
                    TranscriptOutput::CancelIncremental,
                    TranscriptOutput::EmitFinal(transcript.clone()),
                ]
            }

            ServerEvent::Error { error } => {
                if error.is_commit_empty() {
                    vec![TranscriptOutput::ResetCommitCounters]
                } else {
                    vec![TranscriptOutput::ServiceError(ServiceError::from(error))]
                }
            }

            ServerEvent::Unknown => Vec::new(),
        }
    }
}
