//! Incoming-call admission and lifecycle.
//!
//! The pushed offer is acknowledged before any admission decision so the
//! caller's side stops retrying, then exactly one of three things happens:
//! an immediate decline (no microphone, or busy), or ringing starts with a
//! bounded ring timer.

use crate::client::Client;
use crate::consts::{INCOMING_RING_DURATION, USER_BUSY_DECLINE_DELAY};
use crate::platform::NotificationKind;
use crate::types::DeclineReasonCode;
use crate::types::events::{CallAnswered, CallCancelled, CallDeclined, CallMissed, EventBus, HoldChanged};
use crate::wire::{
    AckStatus, CancelPayload, DeclinePayload, EventKind, HoldPayload, IncomingCallPayload,
    MissPayload, SignalFrame,
};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::sleep;

/// A locally ringing incoming call and the handle that stops its ring timer.
pub(crate) struct RingingCall {
    pub payload: IncomingCallPayload,
    pub cancel: Arc<Notify>,
}

impl Client {
    pub(crate) async fn handle_incoming_call(
        self: &Arc<Self>,
        frame_id: Option<String>,
        payload: IncomingCallPayload,
    ) {
        // Receipt first; admission comes after.
        self.ack_receipt(frame_id, AckStatus::Success).await;

        let mic_denied = match &self.platform {
            Some(platform) => platform.permissions.microphone_permanently_denied(),
            // Without host collaborators there is no way to ring or answer.
            None => true,
        };
        if mic_denied {
            info!(
                target: "Call/Incoming",
                "declining {}: microphone permanently denied", payload.call_id
            );
            self.send_decline(&payload, DeclineReasonCode::MicrophonePermissionNotGranted)
                .await;
            return;
        }

        if self.session.is_busy().await {
            info!(target: "Call/Incoming", "declining {}: user busy", payload.call_id);
            self.send_decline(&payload, DeclineReasonCode::UserBusy).await;
            return;
        }

        self.session.begin_call(&payload.call_id, false).await;
        let cancel = Arc::new(Notify::new());
        *self.ringing_call.lock().await = Some(RingingCall {
            payload: payload.clone(),
            cancel: cancel.clone(),
        });

        if let Some(platform) = &self.platform {
            platform
                .notifications
                .show_call_notification(NotificationKind::IncomingCall, &payload)
                .await;
            platform.audio.start_ringing().await;
        }
        EventBus::publish(&self.event_bus.incoming_call, payload.clone());
        self.start_ring_timer(payload.call_id.clone(), cancel);
    }

    fn start_ring_timer(self: &Arc<Self>, call_id: String, cancel: Arc<Notify>) {
        let client = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.notified() => {}
                _ = sleep(INCOMING_RING_DURATION) => {
                    client.on_ring_timeout(&call_id).await;
                }
            }
        });
    }

    /// The ring window elapsed without an answer: report the miss upstream
    /// and surface a missed-call notification.
    async fn on_ring_timeout(self: &Arc<Self>, call_id: &str) {
        let ringing = {
            let mut guard = self.ringing_call.lock().await;
            match guard.as_ref() {
                Some(r) if r.payload.call_id == call_id => guard.take(),
                _ => return,
            }
        };
        let Some(ringing) = ringing else { return };
        let payload = ringing.payload;

        info!(target: "Call/Incoming", "{call_id} rang out");
        let miss = MissPayload {
            response_sid: payload.response_sid.clone(),
            call_id: payload.call_id.clone(),
            sid: payload.sid.clone(),
        };
        match serde_json::to_value(&miss) {
            Ok(value) => {
                if let Err(e) = self.emit(EventKind::Miss, value).await {
                    warn!(target: "Call/Incoming", "could not report miss: {e}");
                }
            }
            Err(e) => warn!(target: "Call/Incoming", "could not encode miss: {e}"),
        }

        if let Some(platform) = &self.platform {
            platform.audio.stop().await;
            platform
                .notifications
                .remove_notification(NotificationKind::IncomingCall)
                .await;
            platform
                .notifications
                .show_call_notification(NotificationKind::MissedCall, &payload)
                .await;
        }
        self.session.end_call().await;
        EventBus::publish(
            &self.event_bus.call_missed,
            CallMissed {
                call_id: call_id.to_string(),
            },
        );
    }

    async fn send_decline(&self, payload: &IncomingCallPayload, reason: DeclineReasonCode) {
        let decline = DeclinePayload {
            response_sid: payload.response_sid.clone(),
            call_id: payload.call_id.clone(),
            sid: payload.sid.clone(),
            decline_reason: None,
            decline_reason_code: Some(reason.as_str().to_string()),
        };
        match serde_json::to_value(&decline) {
            Ok(value) => {
                if let Err(e) = self.emit(EventKind::Decline, value).await {
                    warn!(target: "Call/Incoming", "could not send decline: {e}");
                }
            }
            Err(e) => warn!(target: "Call/Incoming", "could not encode decline: {e}"),
        }
    }

    /// The caller hung up while we were ringing. Identity is checked before
    /// any state is touched; a mismatched cancel mutates nothing and is
    /// acknowledged with a status describing why.
    pub(crate) async fn handle_cancel_event(
        self: &Arc<Self>,
        frame_id: Option<String>,
        payload: CancelPayload,
    ) {
        let ringing_matches = {
            let guard = self.ringing_call.lock().await;
            guard
                .as_ref()
                .is_some_and(|r| r.payload.call_id == payload.call_id)
        };
        if ringing_matches {
            self.clear_ringing(true).await;
            self.session.end_call().await;
            self.ack_receipt(frame_id, AckStatus::Success).await;
            EventBus::publish(
                &self.event_bus.call_cancelled,
                CallCancelled {
                    call_id: payload.call_id,
                },
            );
            return;
        }

        let active = self.session.snapshot().await.active_call_id;
        let status = if active.is_some() || self.ringing_call.lock().await.is_some() {
            AckStatus::OtherCall
        } else {
            AckStatus::NoActiveCall
        };
        debug!(
            target: "Call/Incoming",
            "cancel for {} does not match, acking {}", payload.call_id, status.as_str()
        );
        self.ack_receipt(frame_id, status).await;
    }

    /// The callee declined our outgoing call. A busy decline is surfaced
    /// after a short grace delay; every other reason resolves immediately.
    pub(crate) async fn handle_decline_event(self: &Arc<Self>, payload: DeclinePayload) {
        let active = self.session.snapshot().await.active_call_id;
        if active.as_deref() != Some(payload.call_id.as_str()) {
            debug!(target: "Call/Outgoing", "decline for inactive call {}", payload.call_id);
            return;
        }

        let reason =
            DeclineReasonCode::parse(payload.decline_reason_code.as_deref().unwrap_or(""));
        if reason == DeclineReasonCode::UserBusy {
            let client = self.clone();
            let call_id = payload.call_id.clone();
            tokio::spawn(async move {
                sleep(USER_BUSY_DECLINE_DELAY).await;
                client
                    .resolve_outgoing_declined(&call_id, DeclineReasonCode::UserBusy)
                    .await;
            });
        } else {
            self.resolve_outgoing_declined(&payload.call_id, reason).await;
        }
    }

    async fn resolve_outgoing_declined(self: &Arc<Self>, call_id: &str, reason: DeclineReasonCode) {
        // The call may have been superseded during the busy grace delay.
        let active = self.session.snapshot().await.active_call_id;
        if active.as_deref() != Some(call_id) {
            return;
        }
        self.finish_outgoing_call().await;
        EventBus::publish(
            &self.event_bus.call_declined,
            CallDeclined {
                call_id: call_id.to_string(),
                reason,
            },
        );
    }

    /// The callee's device reported our outgoing call as missed.
    pub(crate) async fn handle_miss_event(self: &Arc<Self>, payload: MissPayload) {
        let active = self.session.snapshot().await.active_call_id;
        if active.as_deref() != Some(payload.call_id.as_str()) {
            debug!(target: "Call/Outgoing", "miss for inactive call {}", payload.call_id);
            return;
        }
        self.finish_outgoing_call().await;
        EventBus::publish(
            &self.event_bus.call_missed,
            CallMissed {
                call_id: payload.call_id,
            },
        );
    }

    /// The peer answered: stop every pending timer for the call but keep the
    /// session busy, the call is now live.
    pub(crate) async fn handle_answer_event(self: &Arc<Self>, call_id: String) {
        let active = self.session.snapshot().await.active_call_id;
        if active.as_deref() != Some(call_id.as_str()) {
            debug!(target: "Call", "answer for inactive call {call_id}");
            return;
        }

        if let Some(watch) = self.outgoing_watch.lock().await.take() {
            watch.cancel.notify_one();
        }
        if let Some(ringing) = self.clear_ringing(false).await
            && let Some(platform) = &self.platform
        {
            platform.audio.stop().await;
            platform
                .notifications
                .remove_notification(NotificationKind::IncomingCall)
                .await;
            platform
                .notifications
                .show_call_notification(NotificationKind::OngoingCall, &ringing.payload)
                .await;
        }
        EventBus::publish(&self.event_bus.call_answered, CallAnswered { call_id });
    }

    pub(crate) async fn handle_hold_event(self: &Arc<Self>, payload: HoldPayload) {
        let active = self.session.snapshot().await.active_call_id;
        if active.as_deref() != Some(payload.call_id.as_str()) {
            debug!(target: "Call", "hold for inactive call {}", payload.call_id);
            return;
        }
        EventBus::publish(
            &self.event_bus.hold_changed,
            HoldChanged {
                call_id: payload.call_id,
                on_hold: payload.hold,
            },
        );
    }

    /// Tear down local ringing state. With `stop_ui` the audio and the
    /// incoming notification are stopped too.
    pub(crate) async fn clear_ringing(&self, stop_ui: bool) -> Option<RingingCall> {
        let ringing = self.ringing_call.lock().await.take()?;
        ringing.cancel.notify_one();
        if stop_ui && let Some(platform) = &self.platform {
            platform.audio.stop().await;
            platform
                .notifications
                .remove_notification(NotificationKind::IncomingCall)
                .await;
        }
        Some(ringing)
    }

    pub(crate) async fn ack_receipt(&self, frame_id: Option<String>, status: AckStatus) {
        let Some(id) = frame_id else { return };
        let frame = SignalFrame::request(
            EventKind::Ack,
            id,
            serde_json::json!({ "status": status.as_str() }),
        );
        if let Err(e) = self.send_frame(&frame).await {
            warn!(target: "Call", "could not ack receipt: {e}");
        }
    }
}
