//! Caller-line-identity resolution for PSTN fallback calls.

use crate::consts::{CC_DIGITS_MAX, CC_DIGITS_MIN, PHONE_DIGITS_MAX, PHONE_DIGITS_MIN};
use crate::error::CallError;
use crate::store::{Persistence, VERIFIED_CLI_KEY};
use crate::types::Cli;
use crate::validate::is_digits;
use log::{debug, warn};
use rand::Rng;
use std::sync::Arc;

/// Chooses or authorizes the caller-line identity presented on a PSTN call,
/// drawing from the locally cached list of previously verified numbers.
pub struct CliResolver {
    store: Arc<dyn Persistence>,
}

impl CliResolver {
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self { store }
    }

    /// Load the verified-numbers cache. A missing or unparsable entry is
    /// treated the same as an empty list.
    pub async fn verified_numbers(&self) -> Vec<Cli> {
        let Some(raw) = self.store.get_string(VERIFIED_CLI_KEY).await else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<Cli>>(&raw) {
            Ok(list) => list,
            Err(e) => {
                warn!(target: "Call/Cli", "verified list is unreadable: {e}");
                Vec::new()
            }
        }
    }

    /// Resolve the CLI for one attempt. An explicit CLI must be a member of
    /// the verified set by exact `{cc, phone}` string match; with none
    /// supplied, a verified number is picked uniformly at random.
    pub async fn resolve(&self, requested: Option<&Cli>) -> Result<Cli, CallError> {
        let verified = self.verified_numbers().await;
        if verified.is_empty() {
            return Err(CallError::EmptyVerifiedCliList);
        }

        match requested {
            Some(cli) => {
                if cli.cc.is_empty() || cli.phone.is_empty() {
                    return Err(CallError::MissingCcPhoneInCli);
                }
                if !is_digits(&cli.cc, CC_DIGITS_MIN, CC_DIGITS_MAX)
                    || !is_digits(&cli.phone, PHONE_DIGITS_MIN, PHONE_DIGITS_MAX)
                {
                    return Err(CallError::InvalidLengthOfCcOrPhoneInCli);
                }
                if verified
                    .iter()
                    .any(|v| v.cc == cli.cc && v.phone == cli.phone)
                {
                    debug!(target: "Call/Cli", "explicit cli authorized");
                    Ok(cli.clone())
                } else {
                    Err(CallError::UnauthorizedCli)
                }
            }
            None => {
                let index = rand::rng().random_range(0..verified.len());
                debug!(target: "Call/Cli", "picked default cli {index} of {}", verified.len());
                Ok(verified[index].clone())
            }
        }
    }
}
