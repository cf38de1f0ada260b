//! Shared harness: a scripted transport standing in for the signaling
//! server, plus helpers to drive the channel through its lifecycle.

#![allow(dead_code)]

use callsignal::client::Client;
use callsignal::config::ClientConfig;
use callsignal::platform::Platform;
use callsignal::store::MemoryStore;
use callsignal::transport::{Transport, TransportEvent, TransportFactory};
use callsignal::wire::{EventKind, SignalFrame};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::time::sleep;

/// Records every frame the client sends; the test plays the server.
#[derive(Default)]
pub struct ScriptedTransport {
    pub sent: Mutex<Vec<String>>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send_text(&self, frame: &str) -> Result<(), anyhow::Error> {
        self.sent.lock().await.push(frame.to_string());
        Ok(())
    }

    async fn disconnect(&self) {}
}

pub struct ScriptedFactory {
    pub transport: Arc<ScriptedTransport>,
    injector: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    pub connects: AtomicUsize,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self {
            transport: Arc::new(ScriptedTransport::default()),
            injector: Mutex::new(None),
            connects: AtomicUsize::new(0),
        }
    }

    /// Push a raw transport event into the client's dispatcher.
    pub async fn inject(&self, event: TransportEvent) {
        let injector = self.injector.lock().await.clone();
        let tx = injector.expect("transport was never created");
        tx.send(event).await.expect("dispatcher stopped reading");
    }

    /// Push a server frame into the client's dispatcher.
    pub async fn inject_frame(&self, frame: SignalFrame) {
        let text = serde_json::to_string(&frame).unwrap();
        self.inject(TransportEvent::FrameReceived(text)).await;
    }

    pub async fn inject_event(&self, event: EventKind, payload: Value) {
        self.inject_frame(SignalFrame::new(event, payload)).await;
    }

    /// Everything sent so far, parsed.
    pub async fn sent_frames(&self) -> Vec<SignalFrame> {
        self.transport
            .sent
            .lock()
            .await
            .iter()
            .map(|text| serde_json::from_str(text).expect("client sent invalid JSON"))
            .collect()
    }

    /// Wait until at least `count` frames of `event` have been sent and
    /// return the last of them.
    pub async fn wait_for_frame(&self, event: EventKind, count: usize) -> SignalFrame {
        for _ in 0..20_000 {
            let matching: Vec<SignalFrame> = self
                .sent_frames()
                .await
                .into_iter()
                .filter(|f| f.kind() == Some(event))
                .collect();
            if matching.len() >= count {
                return matching.into_iter().nth(count - 1).unwrap();
            }
            sleep(Duration::from_millis(1)).await;
        }
        panic!("frame '{event}' (#{count}) was never sent");
    }

    pub async fn count_frames(&self, event: EventKind) -> usize {
        self.sent_frames()
            .await
            .into_iter()
            .filter(|f| f.kind() == Some(event))
            .count()
    }
}

#[async_trait]
impl TransportFactory for ScriptedFactory {
    async fn create_transport(
        &self,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(16);
        let _ = tx.send(TransportEvent::Connected).await;
        *self.injector.lock().await = Some(tx);
        Ok((self.transport.clone(), rx))
    }
}

pub struct Harness {
    pub client: Arc<Client>,
    pub factory: Arc<ScriptedFactory>,
    pub store: Arc<MemoryStore>,
}

pub fn test_config() -> ClientConfig {
    ClientConfig {
        server_url: "wss://signal.test/ws".into(),
        account_id: "acc-1".into(),
        api_key: "key-1".into(),
        contact_cc: "1".into(),
        contact_phone: "5550001".into(),
        contact_cuid: "alice".into(),
        ..Default::default()
    }
}

pub fn harness() -> Harness {
    harness_with(test_config(), Some(Platform::null()))
}

pub fn harness_with(config: ClientConfig, platform: Option<Platform>) -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();
    let factory = Arc::new(ScriptedFactory::new());
    let store = Arc::new(MemoryStore::new());
    let client = Client::new(config, factory.clone(), store.clone(), platform);
    Harness {
        client,
        factory,
        store,
    }
}

impl Harness {
    /// Spawn the run loop and walk the channel through authentication.
    pub async fn start_authenticated(&self) {
        let runner = self.client.clone();
        tokio::spawn(async move { runner.run().await });

        self.factory
            .wait_for_frame(EventKind::Authentication, 1)
            .await;
        self.factory
            .inject_event(EventKind::Authenticated, Value::Null)
            .await;
        self.wait_until_authenticated().await;
    }

    pub async fn wait_until_authenticated(&self) {
        for _ in 0..20_000 {
            if self.client.is_authenticated() {
                return;
            }
            sleep(Duration::from_millis(1)).await;
        }
        panic!("client never authenticated");
    }
}
