//! Handlers for channel lifecycle frames.

use super::traits::FrameHandler;
use crate::client::Client;
use crate::wire::{EventKind, SignalFrame};
use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;

/// `authenticated`: the channel is now usable.
pub struct AuthenticatedHandler;

#[async_trait]
impl FrameHandler for AuthenticatedHandler {
    fn event(&self) -> EventKind {
        EventKind::Authenticated
    }

    async fn handle(&self, client: Arc<Client>, _frame: &SignalFrame) {
        info!(target: "Client/Channel", "authenticated");
        client.on_authenticated().await;
    }
}

/// `unauthorized`: the server rejected this session's credentials.
pub struct UnauthorizedHandler;

#[async_trait]
impl FrameHandler for UnauthorizedHandler {
    fn event(&self) -> EventKind {
        EventKind::Unauthorized
    }

    async fn handle(&self, client: Arc<Client>, _frame: &SignalFrame) {
        warn!(target: "Client/Channel", "unauthorized");
        client.on_unauthorized().await;
    }
}

/// `disconnect`: the server announces it is about to close the channel.
pub struct DisconnectHandler;

#[async_trait]
impl FrameHandler for DisconnectHandler {
    fn event(&self) -> EventKind {
        EventKind::Disconnect
    }

    async fn handle(&self, client: Arc<Client>, frame: &SignalFrame) {
        let reason = frame.payload["reason"].as_str().unwrap_or("");
        warn!(target: "Client/Channel", "server disconnect notice: {reason}");
        client.on_server_disconnect_notice().await;
    }
}
