//! # linkkit
//!
//! The session and connection-establishment engine behind an embeddable
//! "connect an integration" widget: link-session lifecycle, a tool catalog
//! with connectability matching, credential-form submission, and an OAuth
//! popup-and-poll protocol, all reported back to the embedding host as typed
//! events.
//!
//! ## Overview
//!
//! An embedder boots a [`LinkMachine`] from the payload its host passed in.
//! The machine mints a link session, exposes the platforms that session
//! authorizes, and drives each connection attempt through a small state
//! machine until the host hears `LINK_SUCCESS` or `LINK_ERROR`. Backend
//! access sits behind the [`LinkApi`] and [`CatalogApi`] traits so the whole
//! engine runs against fakes in tests.
//!
//! ## Features
//!
//! - **Cache-first sessions**: tokens are minted once and reused until they
//!   go stale, never re-issued call by call
//! - **Two connection paths**: plain credential forms and OAuth with popup
//!   plus session polling
//! - **Typed host events**: success, failure and exit cross the embed
//!   boundary as one serializable enum
//! - **Async-first**: built on Tokio, with cancellation-safe attempts
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use linkkit::{
//!     schema::EmbedPayload, ChannelHost, HttpLinkApi, LinkApi, LinkConfig, LinkMachine,
//!     LoggingPopup,
//! };
//!
//! #[tokio::main]
//! async fn main() -> linkkit::Result<()> {
//!     let api: Arc<dyn LinkApi> = Arc::new(HttpLinkApi::new(LinkConfig::default())?);
//!     let (host, mut events) = ChannelHost::new();
//!
//!     let payload = EmbedPayload {
//!         link_token_endpoint: "https://your-backend.example/link-tokens".to_string(),
//!         ..Default::default()
//!     };
//!     let mut machine =
//!         LinkMachine::boot(payload, api, Arc::new(host), Arc::new(LoggingPopup)).await;
//!
//!     if let Some(platform) = machine.platforms().first().cloned() {
//!         machine.select_platform(platform).await;
//!         // Collect credentials per machine.definition(), then submit.
//!     }
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```

mod api;
mod catalog;
mod config;
mod error;
mod host;
mod http;
mod machine;
mod oauth;
mod retry;
mod session;

pub mod matcher;
pub mod schema;
pub mod template;
pub mod testutils;

pub use api::{CatalogApi, CreateConnectionRequest, LinkApi};
pub use catalog::{ToolCatalog, LOOKUP_FAILED_MESSAGE, MISSING_SECRET_MESSAGE, TOOLS_TIMEOUT};
pub use config::{Endpoints, Environment, LinkConfig};
pub use error::{Error, Result};
pub use host::{ChannelHost, HostChannel, HostEvent};
pub use http::{HttpLinkApi, SECRET_HEADER};
pub use machine::{LinkMachine, LinkState};
pub use oauth::{
    LoggingPopup, OAuthAttempt, OAuthProtocol, OAuthResolution, PopupOpener, PopupRequest,
    NO_SCOPES_SENTINEL, POLL_INTERVAL, POPUP_HEIGHT, POPUP_NAME, POPUP_WIDTH,
};
pub use retry::{with_retry, RetryConfig};
pub use session::SessionStore;
