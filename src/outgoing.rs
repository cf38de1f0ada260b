//! Outgoing-call placement: validation, CLI resolution, the ack-bounded
//! `make_call` exchange, and the bounded fallback paths.
//!
//! Fallback never recurses: a retry carries `retry_count > 0` and a retry
//! attempt is never allowed to spawn another one.

use crate::client::Client;
use crate::consts::{MAKE_CALL_TIMEOUT, MAX_CUSTOM_VARS, OUTGOING_CALL_TIME_DURATION};
use crate::error::{CallError, ChannelError};
use crate::request::AckOutcome;
use crate::store::ACTIVE_CALL_ID_KEY;
use crate::types::events::{CallTimedOut, EventBus, PstnFallback};
use crate::types::{CallAttempt, Callee, OutgoingCall};
use crate::validate::{self, ValidationContext};
use crate::wire::{EventKind, MakeCallAck, MakeCallPayload, ServerErrorCode};
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::sleep;

/// The active outgoing attempt and its ring-countdown handle.
pub(crate) struct OutgoingWatch {
    pub call_id: String,
    pub cancel: Arc<Notify>,
    /// Whether the ack advertised an automatic push fallback for the callee.
    pub apf_available: bool,
    /// Kept so an APF retry re-dials the same attempt.
    pub attempt: CallAttempt,
}

impl Client {
    /// Place an outgoing call.
    ///
    /// Validates the attempt, resolves the caller line when a PSTN path is
    /// in play, and performs the ack-bounded `make_call` exchange. The
    /// returned handle means the server accepted the call; its final outcome
    /// arrives on the event bus.
    pub async fn call(self: &Arc<Self>, attempt: CallAttempt) -> Result<OutgoingCall, CallError> {
        self.place_call(attempt).await
    }

    pub(crate) async fn place_call(
        self: &Arc<Self>,
        mut attempt: CallAttempt,
    ) -> Result<OutgoingCall, CallError> {
        let snapshot = self.session.snapshot().await;
        let ctx = ValidationContext {
            authenticated: self.is_authenticated(),
            unauthorized: snapshot.unauthorized,
            has_platform: self.platform.is_some(),
            mic_denied: self
                .platform
                .as_ref()
                .is_some_and(|p| p.permissions.microphone_permanently_denied()),
            self_cuid: snapshot.contact_cuid,
            ecta_enabled: self.config.ecta_enabled,
        };
        validate::validate(&attempt, &ctx)?;

        // One call at a time: a fresh attempt is rejected locally while any
        // flow (ringing or active, either direction) is unresolved. Fallback
        // retries continue the flow that already holds the busy state.
        if attempt.retry_count == 0 && self.session.is_busy().await {
            return Err(CallError::AnotherCallInProgress);
        }

        {
            let Some(options) = attempt.options.as_mut() else {
                return Err(CallError::CallOptionsRequired);
            };
            // Any attempt that can end up on the PSTN path needs a resolved
            // caller line before the first dial, whichever form the callee
            // identity takes.
            if options.pstn || options.auto_fallback {
                let resolved = self.cli_resolver.resolve(options.cli.as_ref()).await?;
                options.cli = Some(resolved);
            }
        }

        loop {
            let payload = build_make_call_payload(&attempt);
            let value = serde_json::to_value(&payload)
                .map_err(|e| CallError::VoIPCallException(e.to_string()))?;

            info!(
                target: "Call/Outgoing",
                "dialing (pstn: {}, retry: {})", payload.pstn, attempt.retry_count
            );
            let outcome = self
                .emit_with_ack(EventKind::MakeCall, value, MAKE_CALL_TIMEOUT)
                .await
                .map_err(|e| match e {
                    ChannelError::NotConnected => CallError::NoInternet,
                    _ => CallError::BadNetwork,
                })?;

            let ack = match outcome {
                AckOutcome::NoAck => return Err(CallError::InternetLostAtReceiverEnd),
                AckOutcome::Response(value) => serde_json::from_value::<MakeCallAck>(value)
                    .map_err(|e| CallError::VoIPCallException(format!("malformed ack: {e}")))?,
            };

            if ack.success {
                return Ok(self.finalize_outgoing(&attempt, ack).await);
            }

            let code = ServerErrorCode::parse(ack.error_code.as_deref().unwrap_or(""));
            let auto_fallback = attempt.options.as_ref().is_some_and(|o| o.auto_fallback);
            match code {
                ServerErrorCode::ReceiverNotReachable
                    if auto_fallback && attempt.retry_count == 0 =>
                {
                    info!(target: "Call/Outgoing", "callee unreachable over data, retrying via PSTN");
                    attempt.retry_count = 1;
                    if let Some(options) = attempt.options.as_mut() {
                        options.pstn = true;
                        options.auto_fallback = false;
                    }
                    EventBus::publish(
                        &self.event_bus.pstn_fallback,
                        PstnFallback {
                            call_id: ack.call_id,
                            via_apf: false,
                        },
                    );
                    continue;
                }
                ServerErrorCode::ReceiverNotReachable => {
                    return Err(CallError::ContactNotReachable);
                }
                ServerErrorCode::InvalidCallToken => return Err(CallError::InvalidCallToken),
                ServerErrorCode::MissingCcPhoneForPstn => {
                    return Err(CallError::MissingCcPhoneToMakePstnCall);
                }
                ServerErrorCode::MalformedJwt => return Err(CallError::MalformedJwt),
                ServerErrorCode::Other(other) => return Err(CallError::VoIPCallException(other)),
            }
        }
    }

    /// Server accepted the call: record it, persist the id, and arm the
    /// outgoing countdown. Only the APF redial skips the countdown, since
    /// the ring window of its original attempt has already elapsed.
    async fn finalize_outgoing(
        self: &Arc<Self>,
        attempt: &CallAttempt,
        ack: MakeCallAck,
    ) -> OutgoingCall {
        let pstn = attempt.options.as_ref().is_some_and(|o| o.pstn);
        self.session.begin_call(&ack.call_id, pstn).await;
        self.store.put_string(ACTIVE_CALL_ID_KEY, &ack.call_id).await;

        let apf_redial = attempt.options.as_ref().is_some_and(|o| o.ios_apf);
        if !apf_redial {
            let cancel = Arc::new(Notify::new());
            *self.outgoing_watch.lock().await = Some(OutgoingWatch {
                call_id: ack.call_id.clone(),
                cancel: cancel.clone(),
                apf_available: ack.apf,
                attempt: attempt.clone(),
            });
            self.start_outgoing_countdown(ack.call_id.clone(), cancel);
        }

        OutgoingCall {
            call_id: ack.call_id,
            host: if ack.host.is_empty() {
                None
            } else {
                Some(ack.host)
            },
            context: ack.context,
            pstn,
        }
    }

    fn start_outgoing_countdown(self: &Arc<Self>, call_id: String, cancel: Arc<Notify>) {
        let client = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.notified() => {}
                _ = sleep(OUTGOING_CALL_TIME_DURATION) => {
                    client.on_outgoing_timeout(&call_id).await;
                }
            }
        });
    }

    /// The callee did not answer within the ring window. With an APF hint,
    /// one push-woken PSTN retry is attempted; otherwise the call is
    /// cancelled upstream and the timeout surfaced exactly once.
    async fn on_outgoing_timeout(self: &Arc<Self>, call_id: &str) {
        let watch = {
            let mut guard = self.outgoing_watch.lock().await;
            match guard.as_ref() {
                Some(w) if w.call_id == call_id => guard.take(),
                _ => return,
            }
        };
        let Some(watch) = watch else { return };

        if watch.apf_available {
            info!(target: "Call/Outgoing", "{call_id} rang out, retrying via push fallback");
            if let Err(e) = self
                .emit(EventKind::IosApf, serde_json::json!({ "callId": call_id }))
                .await
            {
                warn!(target: "Call/Outgoing", "could not signal push fallback: {e}");
            }

            let mut attempt = watch.attempt;
            attempt.retry_count += 1;
            if let Some(options) = attempt.options.as_mut() {
                options.pstn = true;
                options.ios_apf = true;
                options.auto_fallback = false;
            }
            match self.place_call(attempt).await {
                Ok(call) => {
                    EventBus::publish(
                        &self.event_bus.pstn_fallback,
                        PstnFallback {
                            call_id: call.call_id,
                            via_apf: true,
                        },
                    );
                }
                Err(e) => {
                    warn!(target: "Call/Outgoing", "push fallback failed: {e}");
                    self.finish_outgoing_call().await;
                    EventBus::publish(
                        &self.event_bus.call_timed_out,
                        CallTimedOut {
                            call_id: call_id.to_string(),
                        },
                    );
                }
            }
            return;
        }

        info!(target: "Call/Outgoing", "{call_id} rang out, cancelling");
        if let Err(e) = self
            .emit(EventKind::Cancel, serde_json::json!({ "callId": call_id }))
            .await
        {
            warn!(target: "Call/Outgoing", "could not send cancel: {e}");
        }
        self.finish_outgoing_call().await;
        EventBus::publish(
            &self.event_bus.call_timed_out,
            CallTimedOut {
                call_id: call_id.to_string(),
            },
        );
    }

    /// Hang up the active outgoing call before it is answered.
    pub async fn hang_up(self: &Arc<Self>) -> Result<(), ChannelError> {
        let Some(call_id) = self.session.snapshot().await.active_call_id else {
            return Ok(());
        };
        self.emit(EventKind::Cancel, serde_json::json!({ "callId": call_id }))
            .await?;
        self.finish_outgoing_call().await;
        Ok(())
    }

    /// Resolve the active outgoing flow: stop the countdown, clear busy
    /// state, and forget the persisted call id.
    pub(crate) async fn finish_outgoing_call(&self) {
        if let Some(watch) = self.outgoing_watch.lock().await.take() {
            watch.cancel.notify_one();
        }
        self.session.end_call().await;
        self.store.remove(ACTIVE_CALL_ID_KEY).await;
    }
}

/// Normalize one attempt into the wire payload: absent options become
/// explicit defaults and at most five custom variables are transmitted.
fn build_make_call_payload(attempt: &CallAttempt) -> MakeCallPayload {
    let options = attempt.options.clone().unwrap_or_default();
    let (cc, phone, cuid) = match &attempt.callee {
        Callee::Phone { cc, phone } => (cc.clone(), phone.clone(), String::new()),
        Callee::Cuid(cuid) => (String::new(), String::new(), cuid.clone()),
    };

    let mut vars = options.vars.iter().take(MAX_CUSTOM_VARS).cloned();
    let (cli_cc, cli_phone) = match options.cli {
        Some(cli) => (Some(cli.cc), Some(cli.phone)),
        None => (None, None),
    };

    MakeCallPayload {
        cc,
        phone,
        cuid,
        context: attempt.context.clone(),
        pstn: options.pstn,
        recording: options.recording,
        webhook: options.webhook.unwrap_or_default(),
        var1: vars.next().unwrap_or_default(),
        var2: vars.next().unwrap_or_default(),
        var3: vars.next().unwrap_or_default(),
        var4: vars.next().unwrap_or_default(),
        var5: vars.next().unwrap_or_default(),
        tags: options.tags,
        apf: options.ios_apf,
        call_token: options.call_token,
        cli_cc,
        cli_phone,
    }
}
