//! Incoming-call admission: receipt acks, busy and permission declines,
//! the ring window, and caller-side cancellation.

mod common;

use callsignal::platform::{NullAudioSink, NullNotificationSink, PermissionProbe, Platform};
use callsignal::types::DeclineReasonCode;
use callsignal::wire::{EventKind, SignalFrame};
use common::{Harness, harness, harness_with, test_config};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn offer(call_id: &str, frame_id: &str) -> SignalFrame {
    SignalFrame::request(
        EventKind::IncomingCall,
        frame_id.to_string(),
        json!({
            "callId": call_id,
            "sid": "sid-1",
            "responseSid": "rsid-1",
            "cc": "44",
            "phone": "2079460000",
            "cuid": "",
            "context": "inbound sales",
        }),
    )
}

/// The receipt ack the client sends for a pushed frame with the given id.
async fn wait_for_receipt(h: &Harness, frame_id: &str) -> SignalFrame {
    for attempt in 1.. {
        let frame = h.factory.wait_for_frame(EventKind::Ack, attempt).await;
        if frame.id.as_deref() == Some(frame_id) {
            return frame;
        }
    }
    unreachable!()
}

#[tokio::test(start_paused = true)]
async fn offer_is_acked_then_rings_until_missed() {
    let h = harness();
    h.start_authenticated().await;
    let mut incoming = h.client.event_bus.incoming_call.subscribe();
    let mut missed = h.client.event_bus.call_missed.subscribe();

    h.factory.inject_frame(offer("in-1", "srv-1")).await;

    let receipt = wait_for_receipt(&h, "srv-1").await;
    assert_eq!(receipt.payload["status"], "success");

    let payload = incoming.recv().await.unwrap();
    assert_eq!(payload.call_id, "in-1");
    assert_eq!(payload.context, "inbound sales");
    assert!(h.client.session().is_busy().await);

    // The ring window elapses; the miss is reported upstream.
    sleep(Duration::from_secs(46)).await;
    let miss = h.factory.wait_for_frame(EventKind::Miss, 1).await;
    assert_eq!(miss.payload["callId"], "in-1");
    assert_eq!(miss.payload["responseSid"], "rsid-1");
    assert_eq!(missed.recv().await.unwrap().call_id, "in-1");
    assert!(!h.client.session().is_busy().await);
}

#[tokio::test(start_paused = true)]
async fn second_offer_while_ringing_is_declined_busy() {
    let h = harness();
    h.start_authenticated().await;
    let mut incoming = h.client.event_bus.incoming_call.subscribe();

    h.factory.inject_frame(offer("in-1", "srv-1")).await;
    incoming.recv().await.unwrap();

    h.factory.inject_frame(offer("in-2", "srv-2")).await;
    wait_for_receipt(&h, "srv-2").await;

    let decline = h.factory.wait_for_frame(EventKind::Decline, 1).await;
    assert_eq!(decline.payload["callId"], "in-2");
    assert_eq!(
        decline.payload["declineReasonCode"],
        DeclineReasonCode::UserBusy.as_str()
    );
    // The ringing call is untouched and no second event is surfaced.
    assert!(incoming.try_recv().is_err());
    let session = h.client.session().snapshot().await;
    assert_eq!(session.active_call_id.as_deref(), Some("in-1"));
}

struct MicDenied;

impl PermissionProbe for MicDenied {
    fn microphone_permanently_denied(&self) -> bool {
        true
    }
}

#[tokio::test(start_paused = true)]
async fn denied_microphone_declines_outright() {
    let platform = Platform {
        notifications: Arc::new(NullNotificationSink),
        audio: Arc::new(NullAudioSink),
        permissions: Arc::new(MicDenied),
    };
    let h = harness_with(test_config(), Some(platform));
    h.start_authenticated().await;
    let mut incoming = h.client.event_bus.incoming_call.subscribe();

    h.factory.inject_frame(offer("in-1", "srv-1")).await;

    let decline = h.factory.wait_for_frame(EventKind::Decline, 1).await;
    assert_eq!(
        decline.payload["declineReasonCode"],
        DeclineReasonCode::MicrophonePermissionNotGranted.as_str()
    );
    assert!(incoming.try_recv().is_err());
    assert!(!h.client.session().is_busy().await);
}

#[tokio::test(start_paused = true)]
async fn matching_cancel_stops_the_ring() {
    let h = harness();
    h.start_authenticated().await;
    let mut incoming = h.client.event_bus.incoming_call.subscribe();
    let mut cancelled = h.client.event_bus.call_cancelled.subscribe();

    h.factory.inject_frame(offer("in-1", "srv-1")).await;
    incoming.recv().await.unwrap();

    h.factory
        .inject_frame(SignalFrame::request(
            EventKind::Cancel,
            "srv-2".into(),
            json!({"callId": "in-1"}),
        ))
        .await;

    let receipt = wait_for_receipt(&h, "srv-2").await;
    assert_eq!(receipt.payload["status"], "success");
    assert_eq!(cancelled.recv().await.unwrap().call_id, "in-1");
    assert!(!h.client.session().is_busy().await);

    // The ring timer is gone; nothing is reported missed later.
    sleep(Duration::from_secs(60)).await;
    assert_eq!(h.factory.count_frames(EventKind::Miss).await, 0);
}

#[tokio::test(start_paused = true)]
async fn mismatched_cancel_mutates_nothing() {
    let h = harness();
    h.start_authenticated().await;
    let mut incoming = h.client.event_bus.incoming_call.subscribe();

    // No call at all: noActiveCall.
    h.factory
        .inject_frame(SignalFrame::request(
            EventKind::Cancel,
            "srv-1".into(),
            json!({"callId": "ghost"}),
        ))
        .await;
    let receipt = wait_for_receipt(&h, "srv-1").await;
    assert_eq!(receipt.payload["status"], "noActiveCall");

    // A different call is ringing: otherCall, and it keeps ringing.
    h.factory.inject_frame(offer("in-1", "srv-2")).await;
    incoming.recv().await.unwrap();
    h.factory
        .inject_frame(SignalFrame::request(
            EventKind::Cancel,
            "srv-3".into(),
            json!({"callId": "ghost"}),
        ))
        .await;
    let receipt = wait_for_receipt(&h, "srv-3").await;
    assert_eq!(receipt.payload["status"], "otherCall");

    let session = h.client.session().snapshot().await;
    assert!(session.is_busy());
    assert_eq!(session.active_call_id.as_deref(), Some("in-1"));
}

#[tokio::test(start_paused = true)]
async fn hold_event_is_surfaced_for_the_active_call() {
    let h = harness();
    h.start_authenticated().await;
    let mut incoming = h.client.event_bus.incoming_call.subscribe();
    let mut hold = h.client.event_bus.hold_changed.subscribe();

    h.factory.inject_frame(offer("in-1", "srv-1")).await;
    incoming.recv().await.unwrap();

    h.factory
        .inject_event(EventKind::HoldUnhold, json!({"callId": "in-1", "hold": true}))
        .await;
    let event = hold.recv().await.unwrap();
    assert_eq!(event.call_id, "in-1");
    assert!(event.on_hold);

    // Hold for an unknown call is ignored.
    h.factory
        .inject_event(EventKind::HoldUnhold, json!({"callId": "ghost", "hold": true}))
        .await;
    sleep(Duration::from_millis(10)).await;
    assert!(hold.try_recv().is_err());
}
