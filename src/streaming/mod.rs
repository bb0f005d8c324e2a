//! Streaming translation sessions
//!
//! Reads Server-Sent-Event responses from the arena API, decodes and frames
//! them into JSON records, routes records to the model they belong to, and
//! publishes debounced state snapshots for display and voting.

mod decoder;
mod dual;
mod error;
mod framer;
mod record;
mod scheduler;
mod single;
mod state;
mod transport;

pub use error::StreamError;
pub use record::Side;
pub use state::{DualState, StreamStage, StreamState};

pub(crate) use dual::{DualCallbacks, DualStreamController};
pub(crate) use scheduler::DEFAULT_DEBOUNCE;
pub(crate) use single::{SingleCallbacks, SingleStreamController};
pub(crate) use transport::{ByteStream, StreamTransport};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The response stream was read to its end; per-model results are in the state
    Finished,
    /// `stop()` was called before the stream ended
    Cancelled,
    /// The transport failed; every model that was still streaming carries the message
    Failed(String),
}

/// Marks a controller busy for the lifetime of one `start()` call.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked
fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("Controller mutex was poisoned, recovering data");
            poisoned.into_inner()
        }
    }
}

/// Shared checks before any connection is opened
fn validate(token: Option<&str>, model_ids: &[&str], text: &str) -> Result<(), StreamError> {
    if token.map_or(true, |t| t.trim().is_empty()) {
        return Err(StreamError::Validation(error::MISSING_TOKEN.to_string()));
    }
    if model_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(StreamError::Validation(error::MISSING_MODEL.to_string()));
    }
    if text.trim().is_empty() {
        return Err(StreamError::Validation(error::MISSING_TEXT.to_string()));
    }
    Ok(())
}
