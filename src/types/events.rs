//! Typed event bus surfaced to the embedding application.

use crate::types::DeclineReasonCode;
use crate::wire::IncomingCallPayload;
use std::sync::Arc;
use tokio::sync::broadcast;

// The size of the broadcast channel buffer.
const CHANNEL_CAPACITY: usize = 100;

/// The channel finished its authentication exchange.
#[derive(Debug, Clone)]
pub struct Authenticated;

/// The server rejected the session credentials.
#[derive(Debug, Clone)]
pub struct Unauthorized;

/// The transport dropped.
#[derive(Debug, Clone)]
pub struct Disconnected {
    pub transport_error: bool,
}

/// The session was fully reset and the client stopped.
#[derive(Debug, Clone)]
pub struct SessionReset;

/// The remote peer answered an outgoing call.
#[derive(Debug, Clone)]
pub struct CallAnswered {
    pub call_id: String,
}

/// The remote peer declined an outgoing call.
#[derive(Debug, Clone)]
pub struct CallDeclined {
    pub call_id: String,
    pub reason: DeclineReasonCode,
}

/// The caller cancelled a call that was ringing locally.
#[derive(Debug, Clone)]
pub struct CallCancelled {
    pub call_id: String,
}

/// A call rang out without being answered, in either direction.
#[derive(Debug, Clone)]
pub struct CallMissed {
    pub call_id: String,
}

/// The outgoing countdown expired with no fallback available.
#[derive(Debug, Clone)]
pub struct CallTimedOut {
    pub call_id: String,
}

/// Hold state of the active call changed.
#[derive(Debug, Clone)]
pub struct HoldChanged {
    pub call_id: String,
    pub on_hold: bool,
}

/// An automatic PSTN/push fallback retry was started for a call.
#[derive(Debug, Clone)]
pub struct PstnFallback {
    pub call_id: String,
    pub via_apf: bool,
}

// Macro to generate EventBus fields and constructor
macro_rules! define_event_bus {
    ($(($field:ident, $type:ty)),* $(,)?) => {
        /// Typed event bus with one broadcast channel per event type.
        #[derive(Debug)]
        pub struct EventBus {
            $(
                pub $field: broadcast::Sender<$type>,
            )*
        }

        impl EventBus {
            pub fn new() -> Self {
                Self {
                    $(
                        $field: broadcast::channel(CHANNEL_CAPACITY).0,
                    )*
                }
            }
        }
    };
}

define_event_bus! {
    // Channel lifecycle
    (authenticated, Arc<Authenticated>),
    (unauthorized, Arc<Unauthorized>),
    (disconnected, Arc<Disconnected>),
    (session_reset, Arc<SessionReset>),

    // Call lifecycle
    (incoming_call, Arc<IncomingCallPayload>),
    (call_answered, Arc<CallAnswered>),
    (call_declined, Arc<CallDeclined>),
    (call_cancelled, Arc<CallCancelled>),
    (call_missed, Arc<CallMissed>),
    (call_timed_out, Arc<CallTimedOut>),
    (hold_changed, Arc<HoldChanged>),
    (pstn_fallback, Arc<PstnFallback>),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Send on a channel, ignoring the error when nobody is subscribed.
    pub(crate) fn publish<T>(sender: &broadcast::Sender<Arc<T>>, value: T) {
        let _ = sender.send(Arc::new(value));
    }
}
