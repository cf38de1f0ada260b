//! Reconnection cadence after transport errors and unauthorized events.

use crate::consts::{
    MAX_RECONNECT_ATTEMPTS, PING_TIMEOUT, RECONNECT_DELAY_MAX, RECONNECT_DELAY_STEP,
};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Book-keeping for the current disconnect/retry cycle. Reset on every
/// successful authentication.
#[derive(Debug, Clone, Default)]
pub struct ReconnectState {
    pub is_transport_error: bool,
    pub disconnected_at: Option<DateTime<Utc>>,
}

impl ReconnectState {
    pub fn mark_transport_error(&mut self) {
        self.is_transport_error = true;
        self.disconnected_at = Some(Utc::now());
    }

    /// Seconds spent disconnected so far, saturating at zero.
    pub fn elapsed_disconnect(&self) -> Duration {
        match self.disconnected_at {
            Some(at) => (Utc::now() - at).to_std().unwrap_or(Duration::ZERO),
            None => Duration::ZERO,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Delay before reconnect attempt `attempt` (0-based): linear steps with a
/// fixed ceiling.
pub fn delay_for_attempt(attempt: u32) -> Duration {
    let delay = RECONNECT_DELAY_STEP * attempt;
    delay.min(RECONNECT_DELAY_MAX)
}

pub fn attempts_exhausted(attempt: u32) -> bool {
    attempt >= MAX_RECONNECT_ATTEMPTS
}

/// Remaining hold-off after a transport-error disconnect. A network-restored
/// callback re-evaluates this with the elapsed time so the wait resumes with
/// whatever is left of the ping-timeout budget, floored at zero.
pub fn remaining_holdoff(elapsed: Duration) -> Duration {
    PING_TIMEOUT.saturating_sub(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_linear_and_capped() {
        assert_eq!(delay_for_attempt(0), Duration::ZERO);
        assert_eq!(delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(delay_for_attempt(5), Duration::from_secs(10));
        assert_eq!(delay_for_attempt(100), RECONNECT_DELAY_MAX);
    }

    #[test]
    fn holdoff_shrinks_with_elapsed_time_and_floors_at_zero() {
        assert_eq!(remaining_holdoff(Duration::ZERO), PING_TIMEOUT);
        assert_eq!(
            remaining_holdoff(Duration::from_secs(2)),
            PING_TIMEOUT - Duration::from_secs(2)
        );
        assert_eq!(remaining_holdoff(Duration::from_secs(3600)), Duration::ZERO);
    }

    #[test]
    fn attempts_cap() {
        assert!(!attempts_exhausted(0));
        assert!(!attempts_exhausted(9));
        assert!(attempts_exhausted(10));
    }

    #[test]
    fn transport_error_marks_epoch() {
        let mut state = ReconnectState::default();
        assert_eq!(state.elapsed_disconnect(), Duration::ZERO);
        state.mark_transport_error();
        assert!(state.is_transport_error);
        assert!(state.disconnected_at.is_some());
        state.clear();
        assert!(!state.is_transport_error);
        assert!(state.disconnected_at.is_none());
    }
}
