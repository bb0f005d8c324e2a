//! Side-by-side session: one response stream carrying records for two models

use super::framer::EventReader;
use super::record::{Side, StreamRecord};
use super::scheduler::{wait_for, Publisher, UpdateScheduler};
use super::state::DualState;
use super::transport::StreamTransport;
use super::{lock_or_recover, validate, InFlightGuard, SessionOutcome, StreamError};
use crate::translation::ComparisonRequest;
use futures_util::StreamExt;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

/// Optional hooks invoked as records are applied
#[derive(Clone, Default)]
pub(crate) struct DualCallbacks {
    pub(crate) on_chunk: Option<Arc<dyn Fn(Side, &str) + Send + Sync>>,
    /// Receives the output id captured for that side, if any
    pub(crate) on_complete: Option<Arc<dyn Fn(Side, Option<&str>) + Send + Sync>>,
    pub(crate) on_error: Option<Arc<dyn Fn(Side, &str) + Send + Sync>>,
    /// Fires at most once per session
    pub(crate) on_both_complete: Option<Arc<dyn Fn(&DualState) + Send + Sync>>,
}

/// Drives comparison sessions and publishes their state.
pub(crate) struct DualStreamController {
    transport: Arc<dyn StreamTransport>,
    callbacks: DualCallbacks,
    debounce: Duration,
    state_tx: watch::Sender<DualState>,
    cancel: Mutex<CancellationToken>,
    in_flight: AtomicBool,
}

impl DualStreamController {
    pub(crate) fn new(
        transport: Arc<dyn StreamTransport>,
        callbacks: DualCallbacks,
        debounce: Duration,
    ) -> Self {
        let (state_tx, _) = watch::channel(DualState::default());
        Self {
            transport,
            callbacks,
            debounce,
            state_tx,
            cancel: Mutex::new(CancellationToken::new()),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Receive every committed snapshot
    pub(crate) fn subscribe(&self) -> watch::Receiver<DualState> {
        self.state_tx.subscribe()
    }

    /// Latest committed snapshot
    pub(crate) fn state(&self) -> DualState {
        self.state_tx.borrow().clone()
    }

    pub(crate) fn any_streaming(&self) -> bool {
        self.state_tx.borrow().any_streaming()
    }

    pub(crate) fn both_complete(&self) -> bool {
        self.state_tx.borrow().both_complete()
    }

    /// Run one comparison session to its end.
    ///
    /// Returns `Err` only when the session could not start at all: missing
    /// token, model id or text (the state then carries the message on both
    /// sides), or another session still running on this controller.
    #[instrument(skip_all, fields(model_a = %request.model_a(), model_b = %request.model_b()))]
    pub(crate) async fn start(
        &self,
        token: Option<&str>,
        request: &ComparisonRequest,
    ) -> Result<SessionOutcome, StreamError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            warn!("Ignoring start while a comparison is already streaming");
            return Err(StreamError::Busy);
        };

        if let Err(e) = validate(
            token,
            &[request.model_a(), request.model_b()],
            &request.translation.text,
        ) {
            warn!(error = %e, "Comparison rejected before connecting");
            let message = e.to_string();
            self.state_tx.send_replace(DualState {
                a: super::StreamState::failed(&message),
                b: super::StreamState::failed(&message),
            });
            return Err(e);
        }
        let token = token.unwrap_or_default();

        let cancel = CancellationToken::new();
        *lock_or_recover(&self.cancel) = cancel.clone();

        let mut run = DualRun {
            callbacks: &self.callbacks,
            publisher: Publisher::new(&self.state_tx, cancel.clone()),
            scheduler: UpdateScheduler::new(self.debounce),
            working: DualState::streaming(),
            model_a: request.model_a(),
            model_b: request.model_b(),
            both_fired: false,
        };
        run.publisher.commit(|state| *state = DualState::streaming());

        info!("Opening comparison stream");
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Comparison stopped before the stream opened");
                return Ok(SessionOutcome::Cancelled);
            }
            opened = self.transport.open_dual(token, request) => opened,
        };

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, "Failed to open comparison stream");
                let message = e.user_message();
                run.fail_streaming(&message);
                return Ok(SessionOutcome::Failed(message));
            }
        };

        let mut reader = EventReader::new();
        let outcome = loop {
            let due = run.scheduler.next_due();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Comparison stopped by user");
                    break SessionOutcome::Cancelled;
                }
                side = wait_for(due) => run.flush(side),
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
                        error!(error = %e, "Comparison stream failed while reading");
                        let message = e.user_message();
                        run.fail_streaming(&message);
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

        // Release the connection before the controller can be reused
        drop(stream);
        info!(?outcome, "Comparison session ended");
        Ok(outcome)
    }

    /// Abort the running session and force both sides into a terminal state.
    ///
    /// Safe to call repeatedly, with no session running, or after completion.
    pub(crate) fn stop(&self) {
        lock_or_recover(&self.cancel).cancel();
        self.state_tx.send_modify(DualState::mark_stopped);
        info!("Comparison stop requested");
    }

    /// Clear all state back to idle.
    pub(crate) fn reset(&self) {
        if self.in_flight.load(std::sync::atomic::Ordering::SeqCst) {
            warn!("Ignoring reset while a comparison is streaming; stop it first");
            return;
        }
        self.state_tx.send_replace(DualState::default());
    }
}

/// Per-session working state, owned by the read loop
struct DualRun<'a> {
    callbacks: &'a DualCallbacks,
    publisher: Publisher<'a, DualState>,
    scheduler: UpdateScheduler,
    working: DualState,
    model_a: &'a str,
    model_b: &'a str,
    both_fired: bool,
}

impl DualRun<'_> {
    fn handle_payload(&mut self, payload: &str) {
        trace!(payload, "Comparison record");
        let record = match StreamRecord::parse(payload) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Skipping malformed comparison record");
                return;
            }
        };

        let Some(side) = record.route(self.model_a, self.model_b) else {
            debug!(
                model = ?record.model,
                channel = ?record.channel,
                "Dropping record that matches neither model"
            );
            return;
        };

        let applied = self.working.side_mut(side).apply(&record);
        if applied.is_empty() {
            return;
        }
        if let Some(chunk) = applied.chunk {
            self.scheduler.arm(side);
            self.notify(|cb| {
                if let Some(on_chunk) = &cb.on_chunk {
                    on_chunk(side, chunk);
                }
            });
        }
        if applied.completed {
            self.flush(side);
            let output_id = self.working.side(side).output_id.clone();
            debug!(%side, ?output_id, "Model finished streaming");
            self.notify(|cb| {
                if let Some(on_complete) = &cb.on_complete {
                    on_complete(side, output_id.as_deref());
                }
            });
        }
        if let Some(message) = applied.error {
            warn!(%side, error = message, "Model reported an error");
            self.flush(side);
            self.notify(|cb| {
                if let Some(on_error) = &cb.on_error {
                    on_error(side, message);
                }
            });
        }

        self.check_both_complete();
    }

    /// Publish one side now, dropping its pending debounced commit
    fn flush(&mut self, side: Side) {
        self.scheduler.cancel(side);
        let snapshot = self.working.side(side).clone();
        self.publisher
            .commit(|state| *state.side_mut(side) = snapshot);
    }

    /// The byte stream ended: settle every side that never sent `complete`
    fn finish_stream(&mut self) {
        for side in Side::BOTH {
            if self.working.side(side).is_streaming {
                info!(%side, "Stream ended without a completion record");
                self.working.side_mut(side).mark_complete(None);
                self.flush(side);
                self.notify(|cb| {
                    if let Some(on_complete) = &cb.on_complete {
                        on_complete(side, None);
                    }
                });
            } else {
                self.flush(side);
            }
        }
        self.check_both_complete();
    }

    /// Transport failure: every side still streaming gets the message
    fn fail_streaming(&mut self, message: &str) {
        for side in Side::BOTH {
            if self.working.side(side).is_streaming && self.working.side_mut(side).mark_error(message) {
                self.flush(side);
                self.notify(|cb| {
                    if let Some(on_error) = &cb.on_error {
                        on_error(side, message);
                    }
                });
            } else {
                self.flush(side);
            }
        }
    }

    fn check_both_complete(&mut self) {
        if self.both_fired || !self.working.both_complete() {
            return;
        }
        self.both_fired = true;
        info!("Both models finished streaming");
        let snapshot = self.working.clone();
        self.notify(|cb| {
            if let Some(on_both_complete) = &cb.on_both_complete {
                on_both_complete(&snapshot);
            }
        });
    }

    /// Run a callback unless the session was stopped
    fn notify<F>(&self, f: F)
    where
        F: FnOnce(&DualCallbacks),
    {
        if !self.publisher.is_stopped() {
            f(self.callbacks);
        }
    }
}
