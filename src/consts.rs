//! Protocol timeouts and retry budgets.

use std::time::Duration;

/// How long a `make_call` request may wait for its acknowledgement before
/// the no-ack sentinel fires.
pub const MAKE_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// How long an outgoing call is allowed to ring before it is cancelled
/// (or handed to the APF fallback path).
pub const OUTGOING_CALL_TIME_DURATION: Duration = Duration::from_secs(30);

/// How long an incoming call rings locally before it is reported missed.
pub const INCOMING_RING_DURATION: Duration = Duration::from_secs(45);

/// Hold-off after a transport-error disconnect before reconnection is
/// re-enabled. A network-restored signal can shorten the remaining wait.
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Fixed interval between reconnect attempts after an `unauthorized` event.
pub const UNAUTHORIZED_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Reconnect attempts allowed after `unauthorized` before the session is
/// fully reset.
pub const MAX_RETRIES_AFTER_UNAUTHORIZED: u32 = 3;

/// UX smoothing delay before a user-busy decline is surfaced to the caller.
pub const USER_BUSY_DECLINE_DELAY: Duration = Duration::from_secs(2);

/// Linear backoff step between ordinary reconnect attempts.
pub const RECONNECT_DELAY_STEP: Duration = Duration::from_secs(2);

/// Ceiling for the linear reconnect backoff.
pub const RECONNECT_DELAY_MAX: Duration = Duration::from_secs(30);

/// Ordinary reconnect attempts before the run loop gives up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

pub const MAX_CALL_CONTEXT_LEN: usize = 64;
pub const MAX_TAG_COUNT: usize = 10;
pub const MAX_TAG_LEN: usize = 32;
pub const MAX_CUSTOM_VAR_LEN: usize = 128;
pub const MAX_CUSTOM_VARS: usize = 5;

pub const CC_DIGITS_MIN: usize = 1;
pub const CC_DIGITS_MAX: usize = 4;
pub const PHONE_DIGITS_MIN: usize = 6;
pub const PHONE_DIGITS_MAX: usize = 20;
