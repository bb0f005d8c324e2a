//! Single-model session: every record belongs to the one active stream

use super::framer::EventReader;
use super::record::StreamRecord;
use super::scheduler::{wait_for, Debouncer, Publisher};
use super::state::StreamState;
use super::transport::StreamTransport;
use super::{lock_or_recover, validate, InFlightGuard, SessionOutcome, StreamError};
use crate::translation::TranslationRequest;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, trace, warn};

/// Optional hooks invoked as records are applied
#[derive(Clone, Default)]
pub(crate) struct SingleCallbacks {
    pub(crate) on_chunk: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    pub(crate) on_complete: Option<Arc<dyn Fn(Option<&str>) + Send + Sync>>,
    pub(crate) on_error: Option<Arc<dyn Fn(&str) + Send + Sync>>,
}

/// Drives single-model translation sessions
pub(crate) struct SingleStreamController {
    transport: Arc<dyn StreamTransport>,
    callbacks: SingleCallbacks,
    debounce: Duration,
    state_tx: watch::Sender<StreamState>,
    cancel: Mutex<CancellationToken>,
    in_flight: AtomicBool,
}

impl SingleStreamController {
    pub(crate) fn new(
        transport: Arc<dyn StreamTransport>,
        callbacks: SingleCallbacks,
        debounce: Duration,
    ) -> Self {
        let (state_tx, _) = watch::channel(StreamState::default());
        Self {
            transport,
            callbacks,
            debounce,
            state_tx,
            cancel: Mutex::new(CancellationToken::new()),
            in_flight: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> StreamState {
        self.state_tx.borrow().clone()
    }

    /// Stream one model's translation to its end.
    #[instrument(skip_all, fields(model_id = %model_id))]
    pub(crate) async fn start(
        &self,
        token: Option<&str>,
        model_id: &str,
        request: &TranslationRequest,
    ) -> Result<SessionOutcome, StreamError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            warn!("Ignoring start while a translation is already streaming");
            return Err(StreamError::Busy);
        };

        if let Err(e) = validate(token, &[model_id], &request.text) {
            warn!(error = %e, "Translation rejected before connecting");
            self.state_tx
                .send_replace(StreamState::failed(&e.to_string()));
            return Err(e);
        }
        let token = token.unwrap_or_default();

        let cancel = CancellationToken::new();
        *lock_or_recover(&self.cancel) = cancel.clone();

        let mut run = SingleRun {
            callbacks: &self.callbacks,
            publisher: Publisher::new(&self.state_tx, cancel.clone()),
            debouncer: Debouncer::new(self.debounce),
            working: StreamState::streaming(),
        };
        run.publisher.commit(|state| *state = StreamState::streaming());

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(SessionOutcome::Cancelled),
            opened = self.transport.open_single(token, model_id, request) => opened,
        };

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, "Failed to open translation stream");
                let message = e.user_message();
                run.fail(&message);
                return Ok(SessionOutcome::Failed(message));
            }
        };

        let mut reader = EventReader::new();
        let outcome = loop {
            let due = run.debouncer.deadline().map(|deadline| ((), deadline));
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break SessionOutcome::Cancelled,
                _ = wait_for(due) => run.flush(),
                next = stream.next() => match next {
                    Some(Ok(bytes)) => {
                        for payload in reader.feed(&bytes) {
                            if run.publisher.is_stopped() {
                                break;
                            }
                            run.handle_payload(&payload);
                        }
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "Translation stream failed while reading");
                        let message = e.user_message();
                        run.fail(&message);
                        break SessionOutcome::Failed(message);
                    }
                    None => {
                        for payload in reader.finish() {
                            run.handle_payload(&payload);
                        }
                        run.finish_stream();
                        break SessionOutcome::Finished;
                    }
                },
            }
        };

        drop(stream);
        info!(?outcome, "Translation session ended");
        Ok(outcome)
    }

    /// Abort the running session; always leaves a terminal state.
    pub(crate) fn stop(&self) {
        lock_or_recover(&self.cancel).cancel();
        self.state_tx.send_modify(StreamState::mark_stopped);
        info!("Translation stop requested");
    }

    pub(crate) fn reset(&self) {
        if self.in_flight.load(Ordering::SeqCst) {
            warn!("Ignoring reset while a translation is streaming; stop it first");
            return;
        }
        self.state_tx.send_replace(StreamState::default());
    }
}

struct SingleRun<'a> {
    callbacks: &'a SingleCallbacks,
    publisher: Publisher<'a, StreamState>,
    debouncer: Debouncer,
    working: StreamState,
}

impl SingleRun<'_> {
    fn handle_payload(&mut self, payload: &str) {
        trace!(payload, "Translation record");
        let record = match StreamRecord::parse(payload) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Skipping malformed translation record");
                return;
            }
        };

        let applied = self.working.apply(&record);
        if applied.is_empty() {
            return;
        }
        if let Some(chunk) = applied.chunk {
            self.debouncer.arm();
            self.notify(|cb| {
                if let Some(on_chunk) = &cb.on_chunk {
                    on_chunk(chunk);
                }
            });
        }
        if applied.completed {
            self.flush();
            let output_id = self.working.output_id.clone();
            self.notify(|cb| {
                if let Some(on_complete) = &cb.on_complete {
                    on_complete(output_id.as_deref());
                }
            });
        }
        if let Some(message) = applied.error {
            warn!(error = message, "Model reported an error");
            self.flush();
            self.notify(|cb| {
                if let Some(on_error) = &cb.on_error {
                    on_error(message);
                }
            });
        }
    }

    fn flush(&mut self) {
        self.debouncer.cancel();
        let snapshot = self.working.clone();
        self.publisher.commit(|state| *state = snapshot);
    }

    fn finish_stream(&mut self) {
        if self.working.is_streaming {
            info!("Stream ended without a completion record");
            self.working.mark_complete(None);
            self.flush();
            self.notify(|cb| {
                if let Some(on_complete) = &cb.on_complete {
                    on_complete(None);
                }
            });
        } else {
            self.flush();
        }
    }

    fn fail(&mut self, message: &str) {
        let newly_failed = self.working.is_streaming && self.working.mark_error(message);
        self.flush();
        if newly_failed {
            self.notify(|cb| {
                if let Some(on_error) = &cb.on_error {
                    on_error(message);
                }
            });
        }
    }

    fn notify<F>(&self, f: F)
    where
        F: FnOnce(&SingleCallbacks),
    {
        if !self.publisher.is_stopped() {
            f(self.callbacks);
        }
    }
}
