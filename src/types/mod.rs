//! Core value types for call attempts and caller identity.

pub mod events;

use serde::{Deserialize, Serialize};

/// Callee identity: a cc+phone pair or a contact unique id, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    Phone { cc: String, phone: String },
    Cuid(String),
}

/// A caller-line identity presented as the outbound caller id for a PSTN
/// call. Drawn from the locally cached verified-numbers list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cli {
    pub cc: String,
    pub phone: String,
}

/// Options attached to one outgoing call attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Route the call over the PSTN fallback path instead of VoIP.
    pub pstn: bool,
    pub recording: bool,
    pub webhook: Option<String>,
    /// Custom variables, transmitted as var1..var5. At most five are ever
    /// sent; each is limited to 128 characters.
    pub vars: Vec<String>,
    /// At most ten tags of up to 32 characters each.
    pub tags: Vec<String>,
    pub call_token: Option<String>,
    /// Explicit caller-line identity; must be a verified number.
    pub cli: Option<Cli>,
    /// Fall back to PSTN automatically when the callee is unreachable
    /// over the data channel.
    pub auto_fallback: bool,
    /// Set on the automatic push-fallback retry only.
    pub ios_apf: bool,
}

/// One outgoing-call request. Created per `call()` invocation and destroyed
/// when the flow resolves or is superseded by its own fallback retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallAttempt {
    pub callee: Callee,
    /// Free-form context string shown to the callee, at most 64 characters.
    pub context: String,
    pub options: Option<CallOptions>,
    /// Fallback bookkeeping. Zero for a fresh attempt; any retry path
    /// increments it, which is what bounds fallback to a single hop.
    pub retry_count: u8,
}

impl CallAttempt {
    pub fn to_phone(cc: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            callee: Callee::Phone {
                cc: cc.into(),
                phone: phone.into(),
            },
            context: String::new(),
            options: Some(CallOptions::default()),
            retry_count: 0,
        }
    }

    pub fn to_cuid(cuid: impl Into<String>) -> Self {
        Self {
            callee: Callee::Cuid(cuid.into()),
            context: String::new(),
            options: Some(CallOptions::default()),
            retry_count: 0,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// Reason codes carried on decline frames in both directions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclineReasonCode {
    MicrophonePermissionNotGranted,
    InvalidCuid,
    UserBusy,
    Other(String),
}

impl DeclineReasonCode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::MicrophonePermissionNotGranted => "MICROPHONE_PERMISSION_NOT_GRANTED",
            Self::InvalidCuid => "INVALID_CUID",
            Self::UserBusy => "USER_BUSY",
            Self::Other(s) => s.as_str(),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "MICROPHONE_PERMISSION_NOT_GRANTED" => Self::MicrophonePermissionNotGranted,
            "INVALID_CUID" => Self::InvalidCuid,
            "USER_BUSY" => Self::UserBusy,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Handle returned to the caller once the server has acknowledged a
/// `make_call`. Later outcomes (answer, decline, cancel, miss, timeout)
/// arrive on the event bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingCall {
    pub call_id: String,
    /// Media host assigned by the server, when present in the ack.
    pub host: Option<String>,
    pub context: String,
    /// Whether this call was placed over the PSTN path.
    pub pstn: bool,
}
