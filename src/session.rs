//! Process-wide session state, funneled through a single authority.
//!
//! The channel dispatcher and outgoing-call workers race on the same busy
//! flags and call id, so every read and mutation goes through one mutex.
//! Readers get a cloned snapshot; nothing observes a torn write.

use crate::config::ClientConfig;
use log::debug;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Mutable per-session record. Created at client init, mutated on every
/// call-state transition, cleared on logout/reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub account_id: String,
    pub api_key: String,
    pub contact_cc: String,
    pub contact_phone: String,
    pub contact_cuid: String,
    pub auth_token: String,
    pub jwt: String,
    pub active_call_id: Option<String>,
    pub busy_on_voip: bool,
    pub busy_on_pstn: bool,
    pub unauthorized: bool,
}

impl Session {
    pub fn is_busy(&self) -> bool {
        self.busy_on_voip || self.busy_on_pstn
    }
}

/// Cloneable handle to the single session authority.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<Session>>,
}

impl SessionHandle {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Session {
                account_id: config.account_id.clone(),
                api_key: config.api_key.clone(),
                contact_cc: config.contact_cc.clone(),
                contact_phone: config.contact_phone.clone(),
                contact_cuid: config.contact_cuid.clone(),
                auth_token: config.auth_token.clone(),
                jwt: config.jwt.clone(),
                ..Default::default()
            })),
        }
    }

    /// Consistent point-in-time copy of the session.
    pub async fn snapshot(&self) -> Session {
        self.inner.lock().await.clone()
    }

    /// Run one mutation under the session lock.
    pub async fn update<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut guard = self.inner.lock().await;
        f(&mut guard)
    }

    pub async fn is_busy(&self) -> bool {
        self.inner.lock().await.is_busy()
    }

    /// Record a confirmed call: busy flags and the active id in one step,
    /// only ever applied after the channel acknowledged the call.
    pub async fn begin_call(&self, call_id: &str, pstn: bool) {
        let mut guard = self.inner.lock().await;
        guard.active_call_id = Some(call_id.to_string());
        guard.busy_on_voip = true;
        guard.busy_on_pstn = pstn;
        debug!(target: "Session", "call {call_id} active (pstn: {pstn})");
    }

    /// Clear busy flags and the active call id once a flow fully resolved.
    pub async fn end_call(&self) {
        let mut guard = self.inner.lock().await;
        guard.active_call_id = None;
        guard.busy_on_voip = false;
        guard.busy_on_pstn = false;
    }

    /// Full reset: call state and authorization flags are dropped while the
    /// login identity is kept for the host to decide what happens next.
    pub async fn reset(&self) {
        let mut guard = self.inner.lock().await;
        guard.active_call_id = None;
        guard.busy_on_voip = false;
        guard.busy_on_pstn = false;
        guard.unauthorized = false;
        debug!(target: "Session", "session reset");
    }
}
