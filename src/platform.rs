//! Collaborator seams toward the host application's UI and audio layers.
//!
//! These traits are the integration point between the signaling core and
//! platform code, in the same spirit as an external media-callback object:
//! the core never renders anything itself.

use crate::wire::IncomingCallPayload;
use async_trait::async_trait;
use std::sync::Arc;

/// Which notification surface a call event targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    IncomingCall,
    OngoingCall,
    MissedCall,
}

/// Notification/UI sink.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn show_call_notification(&self, kind: NotificationKind, payload: &IncomingCallPayload);
    async fn remove_notification(&self, kind: NotificationKind);
}

/// Ringtone/speaker sink.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn start_ringing(&self);
    async fn stop(&self);
}

/// Probe for the local microphone permission state.
pub trait PermissionProbe: Send + Sync {
    /// True when the user has permanently denied microphone access
    /// ("never ask again"); incoming calls are declined outright.
    fn microphone_permanently_denied(&self) -> bool;
}

/// Bundle of host collaborators handed to the client at construction.
#[derive(Clone)]
pub struct Platform {
    pub notifications: Arc<dyn NotificationSink>,
    pub audio: Arc<dyn AudioSink>,
    pub permissions: Arc<dyn PermissionProbe>,
}

impl Platform {
    /// A platform whose sinks all do nothing. Useful in tests and for
    /// headless hosts.
    pub fn null() -> Self {
        Self {
            notifications: Arc::new(NullNotificationSink),
            audio: Arc::new(NullAudioSink),
            permissions: Arc::new(AlwaysGranted),
        }
    }
}

pub struct NullNotificationSink;

#[async_trait]
impl NotificationSink for NullNotificationSink {
    async fn show_call_notification(&self, _kind: NotificationKind, _payload: &IncomingCallPayload) {
    }
    async fn remove_notification(&self, _kind: NotificationKind) {}
}

pub struct NullAudioSink;

#[async_trait]
impl AudioSink for NullAudioSink {
    async fn start_ringing(&self) {}
    async fn stop(&self) {}
}

pub struct AlwaysGranted;

impl PermissionProbe for AlwaysGranted {
    fn microphone_permanently_denied(&self) -> bool {
        false
    }
}
