//! Peer-to-peer voice-call signaling client.
//!
//! `callsignal` keeps one persistent channel to the signaling server and
//! drives the full call lifecycle over it: authentication and reconnection,
//! outgoing-call placement with PSTN and push fallback, and incoming-call
//! admission. Host integration happens through the [`platform`] traits and
//! the typed [`types::events::EventBus`].
//!
//! ```no_run
//! use callsignal::client::Client;
//! use callsignal::config::ClientConfig;
//! use callsignal::platform::Platform;
//! use callsignal::store::MemoryStore;
//! use callsignal::transport::WebSocketTransportFactory;
//! use callsignal::types::CallAttempt;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ClientConfig {
//!     server_url: "wss://signal.example.com/ws".into(),
//!     account_id: "acc".into(),
//!     api_key: "key".into(),
//!     contact_cuid: "alice".into(),
//!     ..Default::default()
//! };
//! let factory = Arc::new(WebSocketTransportFactory::new(config.server_url.clone()));
//! let client = Client::new(config, factory, Arc::new(MemoryStore::new()), Some(Platform::null()));
//!
//! let runner = client.clone();
//! tokio::spawn(async move { runner.run().await });
//!
//! let call = client
//!     .call(CallAttempt::to_cuid("bob").with_context("support line"))
//!     .await?;
//! println!("ringing {}", call.call_id);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod consts;
pub mod error;
pub mod handlers;
mod incoming;
mod outgoing;
pub mod platform;
pub mod reconnect;
mod request;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;
pub mod validate;
pub mod wire;

pub use client::Client;
pub use config::ClientConfig;
pub use error::{CallError, ChannelError};
pub use types::{CallAttempt, CallOptions, Callee, Cli, DeclineReasonCode, OutgoingCall};
