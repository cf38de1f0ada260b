//! Ack-bounded request/response exchange over the channel.
//!
//! Every client-initiated request is guarded by an [`AckTimeoutGuard`]:
//! the real server acknowledgement and the internal timeout race, and
//! whichever fires first wins. The loser is a no-op, so the waiting flow
//! observes exactly one outcome.

use crate::client::Client;
use crate::error::ChannelError;
use crate::wire::{EventKind, SignalFrame};
use log::warn;
use serde_json::Value;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Outcome of one guarded request.
#[derive(Debug)]
pub enum AckOutcome {
    /// The server answered within the budget.
    Response(Value),
    /// The budget elapsed with no acknowledgement.
    NoAck,
}

struct GuardInner {
    sender: Mutex<Option<oneshot::Sender<AckOutcome>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

/// Single-use guard around one in-flight request. At most one of the real
/// response and the timeout sentinel ever reaches the waiter.
#[derive(Clone)]
pub struct AckTimeoutGuard {
    inner: Arc<GuardInner>,
}

impl AckTimeoutGuard {
    /// Arm a guard with the given budget (> 0) and return the receiver the
    /// waiting flow awaits on.
    pub fn arm(budget: Duration) -> (Self, oneshot::Receiver<AckOutcome>) {
        debug_assert!(budget > Duration::ZERO, "ack budget must be positive");
        let (tx, rx) = oneshot::channel();
        let guard = Self {
            inner: Arc::new(GuardInner {
                sender: Mutex::new(Some(tx)),
                timer: Mutex::new(None),
            }),
        };

        let timer_guard = guard.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(budget).await;
            timer_guard.fire(AckOutcome::NoAck);
        });
        if let Ok(mut timer) = guard.inner.timer.lock() {
            *timer = Some(handle);
        }
        (guard, rx)
    }

    /// Deliver the real response. Returns false if the guard already fired
    /// (timeout won or the guard was cancelled); the response is dropped.
    pub fn resolve(&self, value: Value) -> bool {
        let won = self.fire(AckOutcome::Response(value));
        if won {
            self.stop_timer();
        }
        won
    }

    /// Idempotent; safe to call before or after the guard fired.
    pub fn cancel(&self) {
        self.stop_timer();
        if let Ok(mut sender) = self.inner.sender.lock() {
            sender.take();
        }
    }

    pub fn has_fired(&self) -> bool {
        match self.inner.sender.lock() {
            Ok(sender) => sender.is_none(),
            Err(_) => true,
        }
    }

    fn fire(&self, outcome: AckOutcome) -> bool {
        let Ok(mut slot) = self.inner.sender.lock() else {
            return false;
        };
        match slot.take() {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }

    fn stop_timer(&self) {
        if let Ok(mut timer) = self.inner.timer.lock()
            && let Some(handle) = timer.take()
        {
            handle.abort();
        }
    }
}

impl Client {
    /// Generates a new unique request ID string.
    pub fn generate_request_id(&self) -> String {
        let count = self.id_counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.unique_id, count)
    }

    /// Fire-and-forget emit of one frame.
    pub(crate) async fn emit(
        &self,
        event: EventKind,
        payload: Value,
    ) -> Result<(), ChannelError> {
        self.send_frame(&SignalFrame::new(event, payload)).await
    }

    /// Emit a request and wait for its acknowledgement, bounded by `budget`.
    ///
    /// Resolves with [`AckOutcome::NoAck`] when the peer stays silent; a
    /// late acknowledgement after that is discarded by the guard.
    pub(crate) async fn emit_with_ack(
        &self,
        event: EventKind,
        payload: Value,
        budget: Duration,
    ) -> Result<AckOutcome, ChannelError> {
        let req_id = self.generate_request_id();
        let (guard, rx) = AckTimeoutGuard::arm(budget);
        self.response_waiters
            .lock()
            .await
            .insert(req_id.clone(), guard.clone());

        let frame = SignalFrame::request(event, req_id.clone(), payload);
        if let Err(e) = self.send_frame(&frame).await {
            self.response_waiters.lock().await.remove(&req_id);
            guard.cancel();
            return Err(e);
        }

        let outcome = rx.await.map_err(|_| ChannelError::WaiterDropped);
        self.response_waiters.lock().await.remove(&req_id);
        outcome
    }

    /// Route an `ack` frame into the waiter it belongs to. Returns true when
    /// a waiter consumed it.
    pub(crate) async fn handle_ack_frame(&self, frame: &SignalFrame) -> bool {
        let Some(id) = frame.id.clone() else {
            warn!(target: "Client/Ack", "ack frame without an id, dropping");
            return false;
        };
        if let Some(guard) = self.response_waiters.lock().await.remove(&id) {
            if !guard.resolve(frame.payload.clone()) {
                warn!(target: "Client/Ack", "late ack for {id}, guard already fired");
            }
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn real_response_wins_before_budget() {
        let (guard, rx) = AckTimeoutGuard::arm(Duration::from_secs(10));
        assert!(guard.resolve(serde_json::json!({"ok": true})));
        match rx.await.unwrap() {
            AckOutcome::Response(v) => assert_eq!(v["ok"], true),
            AckOutcome::NoAck => panic!("timeout must not fire after a real response"),
        }
        // Advancing past the budget must not produce a second outcome.
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(guard.has_fired());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fires_exactly_once_and_late_response_is_noop() {
        let (guard, rx) = AckTimeoutGuard::arm(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(6)).await;
        match rx.await.unwrap() {
            AckOutcome::NoAck => {}
            AckOutcome::Response(_) => panic!("nothing responded"),
        }
        // The real response arriving after the sentinel is a no-op.
        assert!(!guard.resolve(serde_json::json!({"late": true})));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent_and_safe_after_firing() {
        let (guard, rx) = AckTimeoutGuard::arm(Duration::from_secs(5));
        guard.cancel();
        guard.cancel();
        assert!(rx.await.is_err());

        let (guard, rx) = AckTimeoutGuard::arm(Duration::from_secs(1));
        assert!(guard.resolve(Value::Null));
        guard.cancel();
        assert!(matches!(rx.await.unwrap(), AckOutcome::Response(Value::Null)));
    }
}
