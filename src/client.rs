//! The signaling client: owns the channel, the session authority, and the
//! frame dispatcher.
//!
//! All peer-pushed events are delivered serially by one dispatcher task;
//! outgoing-call workers and timers run concurrently with it and meet it
//! only at the [`SessionHandle`] authority.

use crate::cli::CliResolver;
use crate::config::ClientConfig;
use crate::consts::{MAX_RETRIES_AFTER_UNAUTHORIZED, UNAUTHORIZED_RETRY_INTERVAL};
use crate::error::ChannelError;
use crate::incoming::RingingCall;
use crate::outgoing::OutgoingWatch;
use crate::platform::Platform;
use crate::reconnect::{self, ReconnectState};
use crate::request::AckTimeoutGuard;
use crate::session::SessionHandle;
use crate::store::Persistence;
use crate::transport::{DisconnectKind, Transport, TransportEvent, TransportFactory};
use crate::types::events::{Authenticated, Disconnected, EventBus, SessionReset, Unauthorized};
use crate::wire::{AuthPayload, EventKind, SignalFrame};
use log::{debug, error, info, warn};
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::time::sleep;

pub struct Client {
    pub(crate) config: ClientConfig,
    pub(crate) session: SessionHandle,
    pub(crate) store: Arc<dyn Persistence>,
    pub(crate) platform: Option<Platform>,
    pub(crate) cli_resolver: CliResolver,
    pub event_bus: EventBus,

    transport_factory: Arc<dyn TransportFactory>,
    pub(crate) transport: Mutex<Option<Arc<dyn Transport>>>,
    transport_events: Mutex<Option<mpsc::Receiver<TransportEvent>>>,

    pub(crate) response_waiters: Mutex<HashMap<String, AckTimeoutGuard>>,
    pub(crate) unique_id: String,
    pub(crate) id_counter: AtomicU64,

    is_authenticated: AtomicBool,
    is_connecting: AtomicBool,
    is_running: AtomicBool,
    pub enable_auto_reconnect: AtomicBool,
    auto_reconnect_errors: AtomicU32,
    unauthorized_retries: AtomicU32,
    /// Set when the server announced the close with a `disconnect` frame;
    /// turns an abrupt drop into a server-initiated classification.
    server_disconnect_notice: AtomicBool,

    pub(crate) shutdown_notifier: Notify,
    network_restored: Notify,
    reconnect_state: Mutex<ReconnectState>,

    router: crate::handlers::EventRouter,
    pub(crate) outgoing_watch: Mutex<Option<OutgoingWatch>>,
    pub(crate) ringing_call: Mutex<Option<RingingCall>>,
}

impl Client {
    pub fn new(
        config: ClientConfig,
        transport_factory: Arc<dyn TransportFactory>,
        store: Arc<dyn Persistence>,
        platform: Option<Platform>,
    ) -> Arc<Self> {
        let mut unique_id_bytes = [0u8; 2];
        rand::rng().fill_bytes(&mut unique_id_bytes);

        Arc::new(Self {
            session: SessionHandle::new(&config),
            cli_resolver: CliResolver::new(store.clone()),
            store,
            platform,
            config,
            event_bus: EventBus::new(),

            transport_factory,
            transport: Mutex::new(None),
            transport_events: Mutex::new(None),

            response_waiters: Mutex::new(HashMap::new()),
            unique_id: format!("{}.{}", unique_id_bytes[0], unique_id_bytes[1]),
            id_counter: AtomicU64::new(0),

            is_authenticated: AtomicBool::new(false),
            is_connecting: AtomicBool::new(false),
            is_running: AtomicBool::new(false),
            enable_auto_reconnect: AtomicBool::new(true),
            auto_reconnect_errors: AtomicU32::new(0),
            unauthorized_retries: AtomicU32::new(0),
            server_disconnect_notice: AtomicBool::new(false),

            shutdown_notifier: Notify::new(),
            network_restored: Notify::new(),
            reconnect_state: Mutex::new(ReconnectState::default()),

            router: Self::create_router(),
            outgoing_watch: Mutex::new(None),
            ringing_call: Mutex::new(None),
        })
    }

    /// Create and configure the frame router with all the handlers.
    fn create_router() -> crate::handlers::EventRouter {
        use crate::handlers::call::{
            AnswerHandler, CancelHandler, DeclineHandler, HoldHandler, IncomingCallHandler,
            MissHandler,
        };
        use crate::handlers::connection::{
            AuthenticatedHandler, DisconnectHandler, UnauthorizedHandler,
        };
        use crate::handlers::EventRouter;

        let mut router = EventRouter::new();
        router.register(Arc::new(AuthenticatedHandler));
        router.register(Arc::new(UnauthorizedHandler));
        router.register(Arc::new(DisconnectHandler));
        router.register(Arc::new(IncomingCallHandler));
        router.register(Arc::new(CancelHandler));
        router.register(Arc::new(DeclineHandler));
        router.register(Arc::new(MissHandler));
        router.register(Arc::new(AnswerHandler));
        router.register(Arc::new(HoldHandler));
        router
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated.load(Ordering::Relaxed)
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Drive the channel: connect, dispatch, and reconnect per policy until
    /// shut down or fatally disconnected. Spawn this once.
    pub async fn run(self: &Arc<Self>) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            warn!(target: "Client/Channel", "`run` called while already running");
            return;
        }

        while self.is_running.load(Ordering::Relaxed) {
            self.server_disconnect_notice.store(false, Ordering::Relaxed);

            match self.connect().await {
                Err(e) => {
                    error!(target: "Client/Channel", "connect failed: {e}");
                }
                Ok(()) => {
                    let kind = self.dispatch_loop().await;
                    self.cleanup_connection_state().await;

                    let Some(mut kind) = kind else {
                        debug!(target: "Client/Channel", "dispatcher exited on shutdown");
                        break;
                    };
                    if self.server_disconnect_notice.load(Ordering::Relaxed) {
                        kind = DisconnectKind::ServerInitiated;
                    }
                    EventBus::publish(
                        &self.event_bus.disconnected,
                        Disconnected {
                            transport_error: kind == DisconnectKind::TransportError,
                        },
                    );

                    if self.session.snapshot().await.unauthorized {
                        // Unauthorized retry loop: fixed interval, capped.
                        let count = self.unauthorized_retries.fetch_add(1, Ordering::SeqCst) + 1;
                        if count >= MAX_RETRIES_AFTER_UNAUTHORIZED {
                            warn!(
                                target: "Client/Channel",
                                "still unauthorized after {count} attempts, resetting session"
                            );
                            self.full_session_reset().await;
                            break;
                        }
                        info!(
                            target: "Client/Channel",
                            "unauthorized, retrying authentication (attempt {count})"
                        );
                        tokio::select! {
                            _ = sleep(UNAUTHORIZED_RETRY_INTERVAL) => {}
                            _ = self.shutdown_notifier.notified() => break,
                        }
                        continue;
                    }

                    match kind {
                        DisconnectKind::ServerInitiated => {
                            // Fatal for this session; no reconnection.
                            warn!(target: "Client/Channel", "server closed the channel, resetting session");
                            self.full_session_reset().await;
                            break;
                        }
                        DisconnectKind::TransportError => {
                            if !self.hold_off_after_transport_error().await {
                                break;
                            }
                        }
                    }
                }
            }

            if !self.enable_auto_reconnect.load(Ordering::Relaxed)
                || !self.is_running.load(Ordering::Relaxed)
            {
                break;
            }

            let attempt = self.auto_reconnect_errors.fetch_add(1, Ordering::SeqCst);
            if reconnect::attempts_exhausted(attempt) {
                warn!(target: "Client/Channel", "reconnect attempts exhausted, giving up");
                break;
            }
            let delay = reconnect::delay_for_attempt(attempt);
            info!(
                target: "Client/Channel",
                "reconnecting in {delay:?} (attempt {})",
                attempt + 1
            );
            tokio::select! {
                _ = sleep(delay) => {}
                _ = self.shutdown_notifier.notified() => break,
            }
        }

        self.is_running.store(false, Ordering::Relaxed);
        info!(target: "Client/Channel", "run loop has shut down");
    }

    /// Open the transport and send the authentication message. The channel
    /// only becomes usable once the `authenticated` frame arrives.
    pub async fn connect(self: &Arc<Self>) -> Result<(), anyhow::Error> {
        if self.is_connecting.swap(true, Ordering::SeqCst) {
            return Err(anyhow::anyhow!("already connecting"));
        }
        let _guard = scopeguard::guard((), |_| {
            self.is_connecting.store(false, Ordering::Relaxed);
        });

        if self.transport.lock().await.is_some() {
            return Err(anyhow::anyhow!("already connected"));
        }
        self.is_authenticated.store(false, Ordering::Relaxed);

        let (transport, mut events) = self.transport_factory.create_transport().await?;
        match events.recv().await {
            Some(TransportEvent::Connected) => {}
            other => return Err(anyhow::anyhow!("transport did not connect: {other:?}")),
        }

        *self.transport.lock().await = Some(transport);
        *self.transport_events.lock().await = Some(events);

        self.authenticate().await?;
        Ok(())
    }

    async fn authenticate(&self) -> Result<(), ChannelError> {
        let snapshot = self.session.snapshot().await;
        let payload = AuthPayload {
            platform: self.config.platform.clone(),
            account_id: snapshot.account_id,
            api_key: snapshot.api_key,
            cc: snapshot.contact_cc,
            phone: snapshot.contact_phone,
            cuid: snapshot.contact_cuid,
        };
        info!(target: "Client/Channel", "authenticating");
        self.emit(EventKind::Authentication, serde_json::to_value(payload)?)
            .await
    }

    /// Consume transport events until the connection drops or shutdown is
    /// requested. Returns the disconnect classification, `None` on shutdown.
    async fn dispatch_loop(self: &Arc<Self>) -> Option<DisconnectKind> {
        let events = self.transport_events.lock().await.take();
        let Some(mut events) = events else {
            return Some(DisconnectKind::TransportError);
        };

        loop {
            tokio::select! {
                _ = self.shutdown_notifier.notified() => return None,
                event = events.recv() => match event {
                    None => return Some(DisconnectKind::TransportError),
                    Some(TransportEvent::Connected) => {}
                    Some(TransportEvent::FrameReceived(text)) => {
                        self.handle_frame_text(&text).await;
                    }
                    Some(TransportEvent::Disconnected(kind)) => return Some(kind),
                },
            }
        }
    }

    async fn handle_frame_text(self: &Arc<Self>, text: &str) {
        let frame: SignalFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(target: "Client/Channel", "dropping unparsable frame: {e}");
                return;
            }
        };

        if frame.kind() == Some(EventKind::Ack) {
            if !self.handle_ack_frame(&frame).await {
                debug!(target: "Client/Ack", "ack with no waiter: {:?}", frame.id);
            }
            return;
        }

        if !self.router.dispatch(self.clone(), &frame).await {
            debug!(target: "Client/Channel", "unhandled event '{}'", frame.event);
        }
    }

    pub(crate) async fn send_frame(&self, frame: &SignalFrame) -> Result<(), ChannelError> {
        let text = serde_json::to_string(frame)?;
        let transport = { self.transport.lock().await.clone() };
        let Some(transport) = transport else {
            return Err(ChannelError::NotConnected);
        };
        transport
            .send_text(&text)
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))
    }

    /// Hold off reconnection for the remainder of the ping-timeout budget.
    /// A network-restored signal re-evaluates the remaining wait from the
    /// elapsed disconnect time. Returns false when shutdown was requested.
    async fn hold_off_after_transport_error(&self) -> bool {
        self.reconnect_state.lock().await.mark_transport_error();
        loop {
            let remaining = {
                let state = self.reconnect_state.lock().await;
                reconnect::remaining_holdoff(state.elapsed_disconnect())
            };
            if remaining.is_zero() {
                return true;
            }
            tokio::select! {
                _ = sleep(remaining) => return true,
                _ = self.network_restored.notified() => {
                    info!(target: "Client/Channel", "network restored, re-evaluating reconnect hold-off");
                }
                _ = self.shutdown_notifier.notified() => return false,
            }
        }
    }

    /// Signal from the host's reachability monitor that connectivity came
    /// back; shortens any reconnect hold-off currently in progress.
    pub fn notify_network_restored(&self) {
        self.network_restored.notify_waiters();
    }

    async fn cleanup_connection_state(&self) {
        self.is_authenticated.store(false, Ordering::Relaxed);
        *self.transport.lock().await = None;
        *self.transport_events.lock().await = None;
        // Nothing will answer the in-flight requests on this connection.
        for (_, guard) in self.response_waiters.lock().await.drain() {
            guard.cancel();
        }
    }

    pub(crate) async fn on_authenticated(&self) {
        self.is_authenticated.store(true, Ordering::Relaxed);
        self.auto_reconnect_errors.store(0, Ordering::Relaxed);
        // A fresh authentication re-arms the unauthorized budget.
        self.unauthorized_retries.store(0, Ordering::Relaxed);
        self.reconnect_state.lock().await.clear();
        self.session.update(|s| s.unauthorized = false).await;
        EventBus::publish(&self.event_bus.authenticated, Authenticated);
    }

    pub(crate) async fn on_unauthorized(&self) {
        self.is_authenticated.store(false, Ordering::Relaxed);
        self.session.update(|s| s.unauthorized = true).await;
        EventBus::publish(&self.event_bus.unauthorized, Unauthorized);
        // Drop the channel; the run loop drives the capped retry cadence.
        if let Some(transport) = self.transport.lock().await.take() {
            transport.disconnect().await;
        }
    }

    pub(crate) async fn on_server_disconnect_notice(&self) {
        self.server_disconnect_notice.store(true, Ordering::Relaxed);
    }

    /// Drop everything tied to this session: timers, busy state, stored
    /// call id, and the run loop itself.
    pub(crate) async fn full_session_reset(&self) {
        if let Some(watch) = self.outgoing_watch.lock().await.take() {
            watch.cancel.notify_one();
        }
        self.clear_ringing(true).await;
        self.session.reset().await;
        self.store.remove(crate::store::ACTIVE_CALL_ID_KEY).await;
        self.enable_auto_reconnect.store(false, Ordering::Relaxed);
        self.is_running.store(false, Ordering::Relaxed);
        EventBus::publish(&self.event_bus.session_reset, SessionReset);
    }

    /// Graceful shutdown: stops the run loop and closes the transport.
    pub async fn disconnect(&self) {
        self.enable_auto_reconnect.store(false, Ordering::Relaxed);
        self.is_running.store(false, Ordering::Relaxed);
        self.shutdown_notifier.notify_waiters();
        if let Some(transport) = self.transport.lock().await.take() {
            transport.disconnect().await;
        }
    }
}
