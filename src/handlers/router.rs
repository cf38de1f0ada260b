use super::traits::FrameHandler;
use crate::client::Client;
use crate::wire::SignalFrame;
use std::collections::HashMap;
use std::sync::Arc;

/// Central router dispatching decoded frames to their handlers.
///
/// Keyed by event name for fast lookups; exactly one handler per event.
pub struct EventRouter {
    handlers: HashMap<&'static str, Arc<dyn FrameHandler>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for its event.
    ///
    /// # Panics
    /// Panics if a handler is already registered for the same event to
    /// prevent accidental overwrites during initialization.
    pub fn register(&mut self, handler: Arc<dyn FrameHandler>) {
        let event = handler.event().as_str();
        if self.handlers.insert(event, handler).is_some() {
            panic!("Handler for event '{}' already registered", event);
        }
    }

    /// Dispatch a frame to its handler. Returns `true` when a handler was
    /// found for the frame's event.
    pub async fn dispatch(&self, client: Arc<Client>, frame: &SignalFrame) -> bool {
        if let Some(handler) = self.handlers.get(frame.event.as_str()) {
            handler.handle(client, frame).await;
            true
        } else {
            false
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::EventKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MarkerHandler {
        event: EventKind,
        hit: Arc<AtomicBool>,
    }

    #[async_trait]
    impl FrameHandler for MarkerHandler {
        fn event(&self) -> EventKind {
            self.event
        }

        async fn handle(&self, _client: Arc<Client>, _frame: &SignalFrame) {
            self.hit.store(true, Ordering::SeqCst);
        }
    }

    fn test_client() -> Arc<Client> {
        use crate::config::ClientConfig;
        use crate::platform::Platform;
        use crate::store::MemoryStore;
        use crate::transport::mock::MockTransportFactory;

        Client::new(
            ClientConfig::default(),
            Arc::new(MockTransportFactory::new()),
            Arc::new(MemoryStore::new()),
            Some(Platform::null()),
        )
    }

    #[tokio::test]
    async fn dispatches_to_registered_handler() {
        let hit = Arc::new(AtomicBool::new(false));
        let mut router = EventRouter::new();
        router.register(Arc::new(MarkerHandler {
            event: EventKind::Answer,
            hit: hit.clone(),
        }));
        assert_eq!(router.handler_count(), 1);

        let client = test_client();
        let frame = SignalFrame::new(EventKind::Answer, serde_json::Value::Null);
        assert!(router.dispatch(client.clone(), &frame).await);
        assert!(hit.load(Ordering::SeqCst));

        let frame = SignalFrame::new(EventKind::Miss, serde_json::Value::Null);
        assert!(!router.dispatch(client, &frame).await);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_registration_panics() {
        let mut router = EventRouter::new();
        let hit = Arc::new(AtomicBool::new(false));
        router.register(Arc::new(MarkerHandler {
            event: EventKind::Answer,
            hit: hit.clone(),
        }));
        router.register(Arc::new(MarkerHandler {
            event: EventKind::Answer,
            hit,
        }));
    }
}
