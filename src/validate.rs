//! Pre-flight validation of outgoing call attempts.
//!
//! An ordered list of pure rules over an immutable [`CallAttempt`]; the
//! first violated rule wins and later rules are not evaluated. Validation
//! is deterministic and never touches the network.

use crate::consts::{
    CC_DIGITS_MAX, CC_DIGITS_MIN, MAX_CALL_CONTEXT_LEN, MAX_CUSTOM_VAR_LEN, MAX_TAG_COUNT,
    MAX_TAG_LEN, PHONE_DIGITS_MAX, PHONE_DIGITS_MIN,
};
use crate::error::CallError;
use crate::types::{CallAttempt, Callee};
use url::Url;

/// Channel and host state sampled at the moment of validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    pub authenticated: bool,
    pub unauthorized: bool,
    /// Whether host UI collaborators are attached to the client.
    pub has_platform: bool,
    /// Whether the host reports microphone access as permanently denied.
    pub mic_denied: bool,
    /// The logged-in contact's own cuid, for the self-call check.
    pub self_cuid: String,
    /// Account-level flag requiring a call token on every attempt.
    pub ecta_enabled: bool,
}

pub fn is_digits(s: &str, min: usize, max: usize) -> bool {
    s.len() >= min && s.len() <= max && s.bytes().all(|b| b.is_ascii_digit())
}

pub fn validate(attempt: &CallAttempt, ctx: &ValidationContext) -> Result<(), CallError> {
    if !ctx.has_platform {
        return Err(CallError::InvalidActivityContext);
    }
    let Some(options) = attempt.options.as_ref() else {
        return Err(CallError::CallOptionsRequired);
    };
    if ctx.mic_denied {
        return Err(CallError::MicrophonePermissionNotGranted);
    }
    if ctx.unauthorized {
        return Err(CallError::CuidConnectedElsewhere);
    }
    if !ctx.authenticated {
        return Err(CallError::ClientDisconnectedDueToNetworkProblem);
    }
    if attempt.context.is_empty() {
        return Err(CallError::CallContextRequired);
    }
    // Limits are in characters, not bytes.
    if attempt.context.chars().count() > MAX_CALL_CONTEXT_LEN {
        return Err(CallError::CallContextExceededBy64);
    }

    match &attempt.callee {
        Callee::Phone { cc, phone } => {
            if cc.is_empty() || phone.is_empty() {
                return Err(CallError::BothCcPhoneRequired);
            }
            if !is_digits(cc, CC_DIGITS_MIN, CC_DIGITS_MAX) {
                return Err(CallError::InvalidCcLength);
            }
            if !is_digits(phone, PHONE_DIGITS_MIN, PHONE_DIGITS_MAX) {
                return Err(CallError::InvalidPhoneNumberLength);
            }
        }
        Callee::Cuid(cuid) => {
            if cuid.trim().is_empty() {
                return Err(CallError::InvalidCalleeCuid);
            }
            if cuid == &ctx.self_cuid {
                return Err(CallError::CanNotCallSelf);
            }
        }
    }

    if options.tags.len() > MAX_TAG_COUNT {
        return Err(CallError::TagCountExceededBy10);
    }
    if options.tags.iter().any(|t| t.chars().count() > MAX_TAG_LEN) {
        return Err(CallError::TagLengthExceededBy32);
    }

    if let Some(webhook) = options.webhook.as_deref()
        && !webhook.is_empty()
        && Url::parse(webhook).is_err()
    {
        return Err(CallError::InvalidWebhook);
    }

    if options
        .vars
        .iter()
        .any(|v| v.chars().count() > MAX_CUSTOM_VAR_LEN)
    {
        return Err(CallError::VarLengthExceededBy128);
    }

    if ctx.ecta_enabled
        && options
            .call_token
            .as_deref()
            .is_none_or(|t| t.trim().is_empty())
    {
        return Err(CallError::CallTokenExpected);
    }

    Ok(())
}
