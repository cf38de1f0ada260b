//! JSON wire protocol for the signaling channel.
//!
//! Every message is one JSON text frame: `{"event", "id"?, "payload"}`.
//! Client-initiated requests carry an `id` and the server answers with an
//! `ack` frame echoing it; peer-initiated pushes either carry no `id` or
//! expect an event-specific receipt ack.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Channel event names, both emitted and consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Authentication,
    Authenticated,
    Unauthorized,
    Disconnect,
    MakeCall,
    Cancel,
    Decline,
    Miss,
    IncomingCall,
    Answer,
    HoldUnhold,
    IosApf,
    Ack,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Authenticated => "authenticated",
            Self::Unauthorized => "unauthorized",
            Self::Disconnect => "disconnect",
            Self::MakeCall => "make_call",
            Self::Cancel => "cancel",
            Self::Decline => "decline",
            Self::Miss => "miss",
            Self::IncomingCall => "incoming_call",
            Self::Answer => "answer",
            Self::HoldUnhold => "hold_unhold",
            Self::IosApf => "ios_apf",
            Self::Ack => "ack",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "authentication" => Self::Authentication,
            "authenticated" => Self::Authenticated,
            "unauthorized" => Self::Unauthorized,
            "disconnect" => Self::Disconnect,
            "make_call" => Self::MakeCall,
            "cancel" => Self::Cancel,
            "decline" => Self::Decline,
            "miss" => Self::Miss,
            "incoming_call" => Self::IncomingCall,
            "answer" => Self::Answer,
            "hold_unhold" => Self::HoldUnhold,
            "ios_apf" => Self::IosApf,
            "ack" => Self::Ack,
            _ => return None,
        })
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One frame on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalFrame {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

impl SignalFrame {
    pub fn new(event: EventKind, payload: Value) -> Self {
        Self {
            event: event.as_str().to_string(),
            id: None,
            payload,
        }
    }

    pub fn request(event: EventKind, id: String, payload: Value) -> Self {
        Self {
            event: event.as_str().to_string(),
            id: Some(id),
            payload,
        }
    }

    pub fn kind(&self) -> Option<EventKind> {
        EventKind::parse(&self.event)
    }
}

/// Emitted right after the transport connects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub platform: String,
    pub account_id: String,
    pub api_key: String,
    pub cc: String,
    pub phone: String,
    pub cuid: String,
}

/// `make_call` request body. All options are normalized to explicit
/// defaults before transmission; absent booleans become `false` and absent
/// strings become `""`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MakeCallPayload {
    pub cc: String,
    pub phone: String,
    pub cuid: String,
    pub context: String,
    pub pstn: bool,
    pub recording: bool,
    pub webhook: String,
    pub var1: String,
    pub var2: String,
    pub var3: String,
    pub var4: String,
    pub var5: String,
    pub tags: Vec<String>,
    pub apf: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub call_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cli_cc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cli_phone: Option<String>,
}

/// Server acknowledgement of a `make_call`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MakeCallAck {
    pub success: bool,
    #[serde(default)]
    pub call_id: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub to_cc: String,
    #[serde(default)]
    pub to_phone: String,
    #[serde(default)]
    pub to_cuid: String,
    /// Set when the callee can be woken by an automatic push fallback.
    #[serde(default)]
    pub apf: bool,
    #[serde(default)]
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CancelPayload {
    pub call_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeclinePayload {
    #[serde(default)]
    pub response_sid: String,
    #[serde(default)]
    pub call_id: String,
    #[serde(default)]
    pub sid: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub decline_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub decline_reason_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MissPayload {
    pub response_sid: String,
    pub call_id: String,
    pub sid: String,
}

/// A pushed incoming-call offer.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IncomingCallPayload {
    #[serde(default)]
    pub call_id: String,
    #[serde(default)]
    pub sid: String,
    #[serde(default)]
    pub response_sid: String,
    #[serde(default)]
    pub cc: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub cuid: String,
    #[serde(default)]
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HoldPayload {
    #[serde(default)]
    pub call_id: String,
    #[serde(default)]
    pub hold: bool,
}

/// Receipt status returned for pushed cancel/decline frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    Success,
    OtherCall,
    NoActiveCall,
}

impl AckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::OtherCall => "otherCall",
            Self::NoActiveCall => "noActiveCall",
        }
    }
}

/// Structured error codes reported by the signaling server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerErrorCode {
    ReceiverNotReachable,
    InvalidCallToken,
    MissingCcPhoneForPstn,
    MalformedJwt,
    Other(String),
}

impl ServerErrorCode {
    pub fn parse(s: &str) -> Self {
        match s {
            "receiver-not-reachable" => Self::ReceiverNotReachable,
            "invalid-call-token" => Self::InvalidCallToken,
            "missing-cc-phone-for-pstn" => Self::MissingCcPhoneForPstn,
            "malformed-jwt" => Self::MalformedJwt,
            other => Self::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trip_preserves_id_and_payload() {
        let frame = SignalFrame::request(
            EventKind::MakeCall,
            "1.2-7".to_string(),
            serde_json::json!({"cc": "1"}),
        );
        let text = serde_json::to_string(&frame).unwrap();
        let back: SignalFrame = serde_json::from_str(&text).unwrap();
        assert_eq!(back.kind(), Some(EventKind::MakeCall));
        assert_eq!(back.id.as_deref(), Some("1.2-7"));
        assert_eq!(back.payload["cc"], "1");
    }

    #[test]
    fn push_frames_omit_id() {
        let frame = SignalFrame::new(EventKind::Cancel, serde_json::json!({"callId": "c1"}));
        let text = serde_json::to_string(&frame).unwrap();
        assert!(!text.contains("\"id\""));
    }

    #[test]
    fn make_call_payload_serializes_camel_case() {
        let payload = MakeCallPayload {
            call_token: Some("tok".into()),
            ..Default::default()
        };
        let v = serde_json::to_value(&payload).unwrap();
        assert!(v.get("callToken").is_some());
        assert!(v.get("var1").is_some());
        assert!(v.get("cliCc").is_none());
    }

    #[test]
    fn server_error_codes_parse() {
        assert_eq!(
            ServerErrorCode::parse("receiver-not-reachable"),
            ServerErrorCode::ReceiverNotReachable
        );
        assert_eq!(
            ServerErrorCode::parse("weird"),
            ServerErrorCode::Other("weird".into())
        );
    }

    #[test]
    fn event_kind_round_trips() {
        for kind in [
            EventKind::Authentication,
            EventKind::MakeCall,
            EventKind::IncomingCall,
            EventKind::HoldUnhold,
            EventKind::Ack,
        ] {
            assert_eq!(EventKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::parse("nope"), None);
    }
}
