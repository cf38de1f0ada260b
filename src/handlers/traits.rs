use crate::client::Client;
use crate::wire::{EventKind, SignalFrame};
use async_trait::async_trait;
use std::sync::Arc;

/// A handler for one channel event kind.
///
/// Handlers run on the single dispatcher task, so peer-pushed events are
/// processed serially; anything long-running (delays, nested acks) must be
/// spawned off.
#[async_trait]
pub trait FrameHandler: Send + Sync {
    /// The event this handler consumes.
    fn event(&self) -> EventKind;

    async fn handle(&self, client: Arc<Client>, frame: &SignalFrame);
}
