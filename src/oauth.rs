//! Drives one OAuth authorization attempt end to end: resolve the provider
//! URL, request the popup, then poll the link session until the backend
//! records an outcome.
//!
//! The caller supplies a [`CancellationToken`]; cancelling it stops the
//! attempt at the next await point without emitting anything.

use std::sync::Arc;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::LinkApi;
use crate::error::{Error, Result};
use crate::host::{HostChannel, HostEvent};
use crate::schema::{Connection, FormValues, OAuthDefinition, OAuthFrontend, PlatformEnvironment};
use crate::session::SessionStore;
use crate::template;

/// How often the session is polled while the popup is open.
pub const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);
/// Window name shared by all authorization popups, so a second attempt
/// reuses the window instead of stacking new ones.
pub const POPUP_NAME: &str = "connect";
pub const POPUP_WIDTH: u32 = 500;
pub const POPUP_HEIGHT: u32 = 800;
/// Scope override meaning "send no scopes at all", as opposed to deferring
/// to the definition's defaults.
pub const NO_SCOPES_SENTINEL: &str = "link::no-scopes";

/// A window the embedder should open for the user.
#[derive(Debug, Clone, PartialEq)]
pub struct PopupRequest {
    pub url: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
}

/// How the engine asks the embedder to open the provider window.
pub trait PopupOpener: Send + Sync {
    fn open(&self, popup: &PopupRequest);
}

/// [`PopupOpener`] for headless embedders: logs the request and does
/// nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPopup;

impl PopupOpener for LoggingPopup {
    fn open(&self, popup: &PopupRequest) {
        info!(
            name = %popup.name,
            width = popup.width,
            height = popup.height,
            "authorization popup requested"
        );
        debug!(url = %popup.url, "authorization url");
    }
}

/// Inputs for one authorization attempt, assembled by the state machine
/// from the matched platform and its definitions.
#[derive(Debug, Clone)]
pub struct OAuthAttempt {
    pub definition: OAuthDefinition,
    pub client_id: String,
    /// Platform-level scope override. `None` defers to the definition.
    pub scopes: Option<String>,
    pub environment: PlatformEnvironment,
    pub form_values: FormValues,
}

/// Terminal outcome of [`OAuthProtocol::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum OAuthResolution {
    Connected(Connection),
    /// The provider or backend rejected the attempt with this message. The
    /// corresponding host event has already been emitted.
    Failed(String),
    /// The backend forgot the session mid-poll.
    SessionExpired,
    Cancelled,
}

/// Resolve the effective scope string for an attempt.
pub fn resolve_scopes(override_scopes: Option<&str>, definition: &OAuthDefinition) -> String {
    match override_scopes {
        None => definition.frontend.scopes.clone().unwrap_or_default(),
        Some(NO_SCOPES_SENTINEL) => String::new(),
        Some(scopes) => scopes.to_string(),
    }
}

/// Pick the URL template to render. Test-environment platforms prefer the
/// sandbox template when one is configured.
fn select_template(frontend: &OAuthFrontend, environment: PlatformEnvironment) -> &str {
    if environment == PlatformEnvironment::Test {
        if let Some(sandbox) = frontend.sandbox_redirect_uri.as_deref() {
            if !sandbox.trim().is_empty() {
                return sandbox;
            }
        }
    }
    &frontend.redirect_uri
}

/// Runs authorization attempts against one session store.
pub struct OAuthProtocol {
    store: Arc<SessionStore>,
    api: Arc<dyn LinkApi>,
    host: Arc<dyn HostChannel>,
    popup: Arc<dyn PopupOpener>,
}

impl OAuthProtocol {
    pub fn new(
        store: Arc<SessionStore>,
        api: Arc<dyn LinkApi>,
        host: Arc<dyn HostChannel>,
        popup: Arc<dyn PopupOpener>,
    ) -> Self {
        OAuthProtocol {
            store,
            api,
            host,
            popup,
        }
    }

    /// Run one attempt to completion.
    ///
    /// Success and provider-rejection outcomes are reported to the host from
    /// here, after the session flush, so embedders always observe persist
    /// before the terminal event. Expiry, cancellation and transport errors
    /// are returned unreported for the caller to translate.
    pub async fn run(
        &self,
        attempt: OAuthAttempt,
        cancel: CancellationToken,
    ) -> Result<OAuthResolution> {
        let session = tokio::select! {
            _ = cancel.cancelled() => return Ok(OAuthResolution::Cancelled),
            session = self.store.ensure() => session?,
        };

        if !attempt.form_values.is_empty() {
            self.store.persist(Some(&attempt.form_values)).await;
        }

        let scopes = resolve_scopes(attempt.scopes.as_deref(), &attempt.definition);
        let template = select_template(&attempt.definition.frontend, attempt.environment);
        let rendered = template::render(template, &attempt.form_values);
        let state = format!(
            "{}::{}",
            attempt.definition.connection_platform, session.session_id
        );
        let url = format!(
            "{rendered}&scope={}&client_id={}&redirect_uri={}&state={}",
            urlencoding::encode(&scopes),
            urlencoding::encode(&attempt.client_id),
            urlencoding::encode(&attempt.definition.frontend.callback_uri),
            urlencoding::encode(&state),
        );

        self.popup.open(&PopupRequest {
            url,
            name: POPUP_NAME.to_string(),
            width: POPUP_WIDTH,
            height: POPUP_HEIGHT,
        });
        info!(
            platform = %attempt.definition.connection_platform,
            session_id = %session.session_id,
            "authorization window requested, polling session"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(OAuthResolution::Cancelled),
                _ = sleep(POLL_INTERVAL) => {}
            }

            let rows = tokio::select! {
                _ = cancel.cancelled() => return Ok(OAuthResolution::Cancelled),
                rows = self.api.get_link_session(&session.session_id) => rows,
            };
            let rows = match rows {
                Ok(rows) => rows,
                Err(Error::SessionUnavailable(msg)) => {
                    return Err(Error::SessionUnavailable(msg))
                }
                Err(other) => return Err(Error::SessionUnavailable(other.to_string())),
            };

            let Some(row) = rows.into_iter().next() else {
                self.store.invalidate().await;
                return Ok(OAuthResolution::SessionExpired);
            };

            if let Some(response) = row.response {
                if response.is_connected == Some(true) {
                    let connection = response.connection.unwrap_or_default();
                    self.store.persist(None).await;
                    self.host.emit(HostEvent::LinkSuccess {
                        message: connection.clone(),
                    });
                    self.store.invalidate().await;
                    return Ok(OAuthResolution::Connected(connection));
                }
                if let Some(message) = response.message {
                    self.store.persist(None).await;
                    self.host.emit(HostEvent::LinkError {
                        message: message.clone(),
                    });
                    self.store.invalidate().await;
                    return Ok(OAuthResolution::Failed(message));
                }
            }
            debug!(session_id = %session.session_id, "authorization still pending");
        }
    }
}
