//! Typed error set surfaced to the embedding application.

use thiserror::Error;

/// Every way an outgoing call attempt can fail.
///
/// Pre-flight validation errors are deterministic and never touch the
/// network; channel errors come from the socket or the ack timeout; peer
/// errors are mapped one-to-one from server error codes; state-conflict
/// errors are resolved locally. A flow never leaves the caller without
/// either a call handle or one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    // Pre-flight validation.
    #[error("no host UI context is attached to the client")]
    InvalidActivityContext,
    #[error("call options are required")]
    CallOptionsRequired,
    #[error("network is too poor to place a call")]
    BadNetwork,
    #[error("microphone permission was not granted")]
    MicrophonePermissionNotGranted,
    #[error("no internet connection")]
    NoInternet,
    #[error("this cuid is connected on another device")]
    CuidConnectedElsewhere,
    #[error("client is disconnected due to a network problem")]
    ClientDisconnectedDueToNetworkProblem,
    #[error("call context is required")]
    CallContextRequired,
    #[error("call context exceeds 64 characters")]
    CallContextExceededBy64,
    #[error("callee cuid is invalid")]
    InvalidCalleeCuid,
    #[error("both country code and phone number are required")]
    BothCcPhoneRequired,
    #[error("country code must be 1 to 4 digits")]
    InvalidCcLength,
    #[error("phone number must be 6 to 20 digits")]
    InvalidPhoneNumberLength,
    #[error("tag count exceeds 10")]
    TagCountExceededBy10,
    #[error("tag length exceeds 32 characters")]
    TagLengthExceededBy32,
    #[error("webhook is not a valid absolute URL")]
    InvalidWebhook,
    #[error("custom variable exceeds 128 characters")]
    VarLengthExceededBy128,
    #[error("a call token is expected for this account")]
    CallTokenExpected,

    // CLI resolution.
    #[error("no verified caller-line identities are available")]
    EmptyVerifiedCliList,
    #[error("caller-line identity is missing a country code or phone number")]
    MissingCcPhoneInCli,
    #[error("supplied caller-line identity is not a verified number")]
    UnauthorizedCli,
    #[error("caller-line identity has an invalid country code or phone length")]
    InvalidLengthOfCcOrPhoneInCli,

    // State conflicts.
    #[error("cannot place a call to yourself")]
    CanNotCallSelf,
    #[error("another call is already in progress")]
    AnotherCallInProgress,

    // Channel / peer-reported.
    #[error("internet was lost at the receiver end")]
    InternetLostAtReceiverEnd,
    #[error("call token was rejected by the server")]
    InvalidCallToken,
    #[error("a country code and phone number are required to make a PSTN call")]
    MissingCcPhoneToMakePstnCall,
    #[error("contact is not reachable")]
    ContactNotReachable,
    #[error("session JWT is malformed")]
    MalformedJwt,
    #[error("voip call failed: {0}")]
    VoIPCallException(String),
}

/// Low-level channel failures, kept separate from the caller-facing set.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel is not connected")]
    NotConnected,
    #[error("transport send failed: {0}")]
    Transport(String),
    #[error("frame could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("ack waiter dropped before resolving")]
    WaiterDropped,
}
