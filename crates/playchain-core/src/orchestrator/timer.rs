//! Cancellable one-shot and periodic timers
//!
//! A timer is a spawned task that posts [`Message::Timer`] into the
//! orchestrator inbox. Cancelling aborts the task and forgets its token, so a
//! firing that was already queued is recognised as stale and ignored.

use super::message::{Message, TimerKind};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant};

#[derive(Debug)]
pub(crate) struct TimerSlot {
    kind: TimerKind,
    armed: Option<(u64, JoinHandle<()>)>,
}

impl TimerSlot {
    pub(crate) fn new(kind: TimerKind) -> Self {
        Self { kind, armed: None }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.armed.is_some()
    }

    /// Fire once after `delay`, replacing any armed timer
    pub(crate) fn schedule(&mut self, token: u64, delay: Duration, tx: UnboundedSender<Message>) {
        self.cancel();
        let kind = self.kind;
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            let _ = tx.send(Message::Timer { kind, token });
        });
        self.armed = Some((token, handle));
    }

    /// Fire every `period`, first after one full period
    pub(crate) fn schedule_every(
        &mut self,
        token: u64,
        period: Duration,
        tx: UnboundedSender<Message>,
    ) {
        self.cancel();
        let kind = self.kind;
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if tx.send(Message::Timer { kind, token }).is_err() {
                    break;
                }
            }
        });
        self.armed = Some((token, handle));
    }

    pub(crate) fn cancel(&mut self) {
        if let Some((_, handle)) = self.armed.take() {
            handle.abort();
        }
    }

    /// True when `token` belongs to the armed timer
    pub(crate) fn is_current(&self, token: u64) -> bool {
        matches!(self.armed, Some((armed, _)) if armed == token)
    }

    /// Consume a one-shot firing. Returns false for stale tokens.
    pub(crate) fn fire(&mut self, token: u64) -> bool {
        if self.is_current(token) {
            self.armed = None;
            true
        } else {
            false
        }
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
