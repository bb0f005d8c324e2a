//! Stream state for one model and for a side-by-side session

use super::record::{Side, StreamRecord};

/// Lifecycle stage of one model's stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStage {
    Idle,
    Streaming,
    Complete,
    Failed,
    Cancelled,
}

/// Accumulated state of one model's translation stream
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StreamState {
    /// Text received so far, in arrival order
    pub text: String,
    /// True from session start until completion, error or cancellation
    pub is_streaming: bool,
    /// Terminal flag, only cleared by a reset or a new session
    pub is_complete: bool,
    /// Set at most once per session
    pub error: Option<String>,
    /// Handle needed to vote on this output
    pub output_id: Option<String>,
    /// The session was stopped by the user
    pub cancelled: bool,
}

/// What applying one record changed
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Applied<'a> {
    pub(crate) chunk: Option<&'a str>,
    pub(crate) completed: bool,
    pub(crate) error: Option<&'a str>,
}

impl Applied<'_> {
    pub(crate) fn is_empty(&self) -> bool {
        self.chunk.is_none() && !self.completed && self.error.is_none()
    }
}

impl StreamState {
    /// Fresh state for a session that is about to open its stream
    pub(crate) fn streaming() -> Self {
        Self {
            is_streaming: true,
            ..Self::default()
        }
    }

    /// Terminal error state without ever streaming (validation failures)
    pub(crate) fn failed(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn stage(&self) -> StreamStage {
        if self.is_streaming {
            StreamStage::Streaming
        } else if self.cancelled {
            StreamStage::Cancelled
        } else if self.error.is_some() {
            StreamStage::Failed
        } else if self.is_complete {
            StreamStage::Complete
        } else {
            StreamStage::Idle
        }
    }

    /// Whether further records may still change this state
    pub(crate) fn is_terminal(&self) -> bool {
        self.is_complete || self.error.is_some() || self.cancelled
    }

    /// Apply a record's signals in order: chunk, completion, error.
    ///
    /// Records arriving after the state went terminal are ignored.
    pub(crate) fn apply<'r>(&mut self, record: &'r StreamRecord) -> Applied<'r> {
        let mut applied = Applied::default();
        if self.is_terminal() {
            return applied;
        }

        if let Some(chunk) = record.chunk_text() {
            self.text.push_str(chunk);
            applied.chunk = Some(chunk);
        }
        if record.complete {
            self.mark_complete(record.output_id.clone());
            applied.completed = true;
        }
        if let Some(message) = record.error.as_deref() {
            if self.mark_error(message) {
                applied.error = Some(message);
            }
        }
        applied
    }

    pub(crate) fn mark_complete(&mut self, output_id: Option<String>) {
        self.is_streaming = false;
        self.is_complete = true;
        if output_id.is_some() {
            self.output_id = output_id;
        }
    }

    /// Record an error; returns false if one was already set.
    pub(crate) fn mark_error(&mut self, message: &str) -> bool {
        if self.error.is_some() {
            return false;
        }
        self.error = Some(message.to_string());
        self.is_streaming = false;
        true
    }

    /// Forced terminal transition used by `stop()`
    pub(crate) fn mark_stopped(&mut self) {
        if !self.is_terminal() {
            self.cancelled = true;
        }
        self.is_streaming = false;
        self.is_complete = true;
    }
}

/// Both sides of a comparison
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DualState {
    pub a: StreamState,
    pub b: StreamState,
}

impl DualState {
    pub(crate) fn streaming() -> Self {
        Self {
            a: StreamState::streaming(),
            b: StreamState::streaming(),
        }
    }

    pub fn side(&self, side: Side) -> &StreamState {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }

    pub(crate) fn side_mut(&mut self, side: Side) -> &mut StreamState {
        match side {
            Side::A => &mut self.a,
            Side::B => &mut self.b,
        }
    }

    pub fn both_complete(&self) -> bool {
        self.a.is_complete && self.b.is_complete
    }

    pub fn any_streaming(&self) -> bool {
        self.a.is_streaming || self.b.is_streaming
    }

    pub(crate) fn mark_stopped(&mut self) {
        self.a.mark_stopped();
        self.b.mark_stopped();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: &str) -> StreamRecord {
        StreamRecord::parse(json).expect("valid record")
    }

    #[test]
    fn test_chunks_accumulate_in_order() {
        let mut state = StreamState::streaming();
        state.apply(&record(r#"{"chunk":"Hel"}"#));
        state.apply(&record(r#"{"chunk":"lo"}"#));
        assert_eq!(state.text, "Hello");
        assert_eq!(state.stage(), StreamStage::Streaming);
    }

    #[test]
    fn test_complete_keeps_previous_output_id_when_absent() {
        let mut state = StreamState::streaming();
        state.output_id = Some("earlier".to_string());
        let rec = record(r#"{"complete":true}"#);
        let applied = state.apply(&rec);
        assert!(applied.completed);
        assert_eq!(state.output_id.as_deref(), Some("earlier"));
        assert!(!state.is_streaming);
        assert!(state.is_complete);
    }

    #[test]
    fn test_record_with_every_signal() {
        let mut state = StreamState::streaming();
        let rec = record(r#"{"chunk":"x","complete":true,"output_id":"o","error":"late"}"#);
        let applied = state.apply(&rec);
        assert_eq!(applied.chunk, Some("x"));
        assert!(applied.completed);
        assert_eq!(applied.error, Some("late"));
        assert_eq!(state.text, "x");
        assert!(state.is_complete);
        assert_eq!(state.error.as_deref(), Some("late"));
        assert_eq!(state.stage(), StreamStage::Failed);
    }

    #[test]
    fn test_error_leaves_complete_flag_untouched() {
        let mut state = StreamState::streaming();
        state.apply(&record(r#"{"error":"upstream failed"}"#));
        assert!(!state.is_streaming);
        assert!(!state.is_complete);
        assert_eq!(state.stage(), StreamStage::Failed);
    }

    #[test]
    fn test_terminal_state_ignores_later_records() {
        let mut state = StreamState::streaming();
        state.apply(&record(r#"{"chunk":"done","complete":true}"#));
        let late = record(r#"{"chunk":"extra","error":"x"}"#);
        let applied = state.apply(&late);
        assert!(applied.is_empty());
        assert_eq!(state.text, "done");
        assert_eq!(state.error, None);
    }

    #[test]
    fn test_stop_is_terminal_and_idempotent() {
        let mut state = StreamState::streaming();
        state.mark_stopped();
        state.mark_stopped();
        assert!(state.is_complete);
        assert!(!state.is_streaming);
        assert_eq!(state.stage(), StreamStage::Cancelled);

        // Stopping a finished stream does not relabel it as cancelled
        let mut finished = StreamState::streaming();
        finished.mark_complete(Some("o".to_string()));
        finished.mark_stopped();
        assert_eq!(finished.stage(), StreamStage::Complete);
    }

    #[test]
    fn test_dual_aggregates() {
        let mut state = DualState::streaming();
        assert!(state.any_streaming());
        assert!(!state.both_complete());

        state.side_mut(Side::A).mark_complete(None);
        assert!(state.any_streaming());
        assert!(!state.both_complete());

        state.side_mut(Side::B).mark_complete(None);
        assert!(!state.any_streaming());
        assert!(state.both_complete());
    }

    #[test]
    fn test_validation_failure_never_streams() {
        let state = StreamState::failed("Missing model");
        assert!(!state.is_streaming);
        assert_eq!(state.stage(), StreamStage::Failed);
    }
}
