//! Update scheduling for stream state commits
//!
//! Chunks can arrive far faster than a display can refresh. Each model gets a
//! trailing-edge debounce: every chunk re-arms a short deadline, and state is
//! published once the stream has been quiet for that long. Completion and
//! errors bypass the debounce and publish immediately.

use super::record::Side;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Default quiet period before a commit (about one frame at 60 Hz)
pub(crate) const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(16);

/// A single re-armable deadline
#[derive(Debug)]
pub(crate) struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Schedule a commit `delay` from now, replacing any pending one.
    pub(crate) fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.delay);
    }

    /// Drop the pending commit; returns whether one was pending.
    pub(crate) fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// Independent debouncers for both sides of a comparison
#[derive(Debug)]
pub(crate) struct UpdateScheduler {
    a: Debouncer,
    b: Debouncer,
}

impl UpdateScheduler {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            a: Debouncer::new(delay),
            b: Debouncer::new(delay),
        }
    }

    pub(crate) fn side_mut(&mut self, side: Side) -> &mut Debouncer {
        match side {
            Side::A => &mut self.a,
            Side::B => &mut self.b,
        }
    }

    pub(crate) fn arm(&mut self, side: Side) {
        self.side_mut(side).arm();
    }

    pub(crate) fn cancel(&mut self, side: Side) -> bool {
        self.side_mut(side).cancel()
    }

    /// The side whose commit is due first, with its deadline
    pub(crate) fn next_due(&self) -> Option<(Side, Instant)> {
        match (self.a.deadline(), self.b.deadline()) {
            (Some(a), Some(b)) if b < a => Some((Side::B, b)),
            (Some(a), _) => Some((Side::A, a)),
            (None, Some(b)) => Some((Side::B, b)),
            (None, None) => None,
        }
    }
}

/// Sleep until the deadline, or forever when nothing is scheduled.
pub(crate) async fn wait_for<T>(due: Option<(T, Instant)>) -> T {
    match due {
        Some((value, deadline)) => {
            sleep_until(deadline).await;
            value
        }
        None => std::future::pending().await,
    }
}

/// Publishes state snapshots for one session.
///
/// Once the session's token is cancelled every commit becomes a no-op, so a
/// stopped session never changes again. The check runs while the channel's
/// write lock is held, which orders it against `stop()`.
pub(crate) struct Publisher<'a, S> {
    tx: &'a watch::Sender<S>,
    cancel: CancellationToken,
}

impl<'a, S> Publisher<'a, S> {
    pub(crate) fn new(tx: &'a watch::Sender<S>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    /// Apply `update` to the published state; returns false if the session was stopped.
    pub(crate) fn commit<F>(&self, update: F) -> bool
    where
        F: FnOnce(&mut S),
    {
        let cancel = &self.cancel;
        self.tx.send_if_modified(|state| {
            if cancel.is_cancelled() {
                return false;
            }
            update(state);
            true
        })
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_rearm_pushes_deadline_back() {
        let mut debouncer = Debouncer::new(DEFAULT_DEBOUNCE);
        debouncer.arm();
        let first = debouncer.deadline().expect("armed");

        tokio::time::advance(Duration::from_millis(10)).await;
        debouncer.arm();
        let second = debouncer.deadline().expect("armed");

        assert_eq!(second - first, Duration::from_millis(10));
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());
        assert_eq!(debouncer.deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sides_are_independent() {
        let mut scheduler = UpdateScheduler::new(DEFAULT_DEBOUNCE);
        scheduler.arm(Side::A);
        tokio::time::advance(Duration::from_millis(5)).await;
        scheduler.arm(Side::B);

        assert_eq!(scheduler.next_due().map(|(side, _)| side), Some(Side::A));

        // Re-arming A repeatedly never delays B
        tokio::time::advance(Duration::from_millis(5)).await;
        scheduler.arm(Side::A);
        assert_eq!(scheduler.next_due().map(|(side, _)| side), Some(Side::B));

        scheduler.cancel(Side::B);
        assert_eq!(scheduler.next_due().map(|(side, _)| side), Some(Side::A));
        scheduler.cancel(Side::A);
        assert!(scheduler.next_due().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_fires_at_deadline() {
        let start = Instant::now();
        let side = wait_for(Some((Side::B, start + DEFAULT_DEBOUNCE))).await;
        assert_eq!(side, Side::B);
        assert_eq!(Instant::now() - start, DEFAULT_DEBOUNCE);
    }

    #[test]
    fn test_publisher_is_inert_after_cancel() {
        let (tx, rx) = watch::channel(0u32);
        let token = CancellationToken::new();
        let publisher = Publisher::new(&tx, token.clone());

        assert!(publisher.commit(|v| *v = 1));
        token.cancel();
        assert!(!publisher.commit(|v| *v = 2));
        assert!(publisher.is_stopped());
        assert_eq!(*rx.borrow(), 1);
    }
}
