//! Handlers for peer-pushed call frames.
//!
//! Parse failures are downgraded at this boundary: the frame is logged and
//! dropped rather than propagated, so a malformed push can never wedge the
//! dispatcher.

use super::traits::FrameHandler;
use crate::client::Client;
use crate::wire::{
    CancelPayload, DeclinePayload, EventKind, HoldPayload, IncomingCallPayload, MissPayload,
    SignalFrame,
};
use async_trait::async_trait;
use log::warn;
use serde::de::DeserializeOwned;
use std::sync::Arc;

fn decode<T: DeserializeOwned>(frame: &SignalFrame) -> Option<T> {
    match serde_json::from_value(frame.payload.clone()) {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!(target: "Call/Handler", "malformed {} payload: {e}", frame.event);
            None
        }
    }
}

pub struct IncomingCallHandler;

#[async_trait]
impl FrameHandler for IncomingCallHandler {
    fn event(&self) -> EventKind {
        EventKind::IncomingCall
    }

    async fn handle(&self, client: Arc<Client>, frame: &SignalFrame) {
        if let Some(payload) = decode::<IncomingCallPayload>(frame) {
            client.handle_incoming_call(frame.id.clone(), payload).await;
        }
    }
}

pub struct CancelHandler;

#[async_trait]
impl FrameHandler for CancelHandler {
    fn event(&self) -> EventKind {
        EventKind::Cancel
    }

    async fn handle(&self, client: Arc<Client>, frame: &SignalFrame) {
        if let Some(payload) = decode::<CancelPayload>(frame) {
            client.handle_cancel_event(frame.id.clone(), payload).await;
        }
    }
}

pub struct DeclineHandler;

#[async_trait]
impl FrameHandler for DeclineHandler {
    fn event(&self) -> EventKind {
        EventKind::Decline
    }

    async fn handle(&self, client: Arc<Client>, frame: &SignalFrame) {
        if let Some(payload) = decode::<DeclinePayload>(frame) {
            client.handle_decline_event(payload).await;
        }
    }
}

pub struct MissHandler;

#[async_trait]
impl FrameHandler for MissHandler {
    fn event(&self) -> EventKind {
        EventKind::Miss
    }

    async fn handle(&self, client: Arc<Client>, frame: &SignalFrame) {
        if let Some(payload) = decode::<MissPayload>(frame) {
            client.handle_miss_event(payload).await;
        }
    }
}

pub struct AnswerHandler;

#[async_trait]
impl FrameHandler for AnswerHandler {
    fn event(&self) -> EventKind {
        EventKind::Answer
    }

    async fn handle(&self, client: Arc<Client>, frame: &SignalFrame) {
        let call_id = frame.payload["callId"].as_str().unwrap_or("").to_string();
        client.handle_answer_event(call_id).await;
    }
}

pub struct HoldHandler;

#[async_trait]
impl FrameHandler for HoldHandler {
    fn event(&self) -> EventKind {
        EventKind::HoldUnhold
    }

    async fn handle(&self, client: Arc<Client>, frame: &SignalFrame) {
        if let Some(payload) = decode::<HoldPayload>(frame) {
            client.handle_hold_event(payload).await;
        }
    }
}
