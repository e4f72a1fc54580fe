//! The connection-attempt state machine, one per widget embedding.
//!
//! The machine is sequential: each method call advances it to a stable
//! state before returning. Long-running calls (`submit` on an OAuth
//! platform polls until the backend records an outcome) can be interrupted
//! from another task through [`LinkMachine::cancel_handle`]; a cancelled
//! attempt returns the machine to its entry state without emitting host
//! events.
//!
//! Failure reporting is uniform. Every terminal failure emits exactly one
//! `LINK_ERROR` with a display-ready message, whichever collaborator it
//! came from. Rejected form submissions are the one recoverable failure:
//! they emit and return to the form with the message attached.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{CreateConnectionRequest, LinkApi};
use crate::error::Error;
use crate::host::{HostChannel, HostEvent};
use crate::matcher::{self, MatchOutcome};
use crate::oauth::{OAuthAttempt, OAuthProtocol, OAuthResolution, PopupOpener};
use crate::schema::{
    Connection, ConnectionDefinition, EmbedPayload, FormValues, OAuthDefinition,
    PlatformAuthorization, ToolDescriptor,
};
use crate::session::SessionStore;

/// Where the machine currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkState {
    /// Showing the catalog, no attempt in progress.
    Idle,
    /// A platform was chosen; its definition is being fetched.
    DefinitionLoading,
    /// Collecting credentials for a non-OAuth platform. `error` carries the
    /// message of a rejected submission, shown above the form.
    FormEntry { error: Option<String> },
    /// The platform uses OAuth; its OAuth definition is being fetched.
    OAuthAwaitingDefinition,
    /// Collecting the pre-authorization form values of an OAuth platform.
    OAuthFormEntry,
    /// A submission or authorization is in flight.
    Submitting,
    Success { connection: Connection },
    Failed { error: Error },
}

/// Everything gathered for the platform currently being connected.
#[derive(Debug, Clone)]
struct AttemptContext {
    authorization: PlatformAuthorization,
    definition: ConnectionDefinition,
    oauth: Option<OAuthDefinition>,
    values: FormValues,
}

/// Drives one embedding from catalog to connected.
pub struct LinkMachine {
    api: Arc<dyn LinkApi>,
    store: Arc<SessionStore>,
    host: Arc<dyn HostChannel>,
    popup: Arc<dyn PopupOpener>,
    link_headers: HashMap<String, String>,
    state: LinkState,
    context: Option<AttemptContext>,
    platforms: Vec<PlatformAuthorization>,
    white_label: bool,
    show_name_input: bool,
    preselected: bool,
    attempt_cancel: CancellationToken,
}

impl LinkMachine {
    /// Boot an embedding: mint the initial session, adopt its platform list,
    /// and honor a host preselection. A boot that cannot mint lands in
    /// [`LinkState::Failed`] with the error already reported.
    pub async fn boot(
        payload: EmbedPayload,
        api: Arc<dyn LinkApi>,
        host: Arc<dyn HostChannel>,
        popup: Arc<dyn PopupOpener>,
    ) -> Self {
        let link_headers = payload.link_headers.clone().unwrap_or_default();
        let store = Arc::new(SessionStore::new(
            api.clone(),
            payload.link_token_endpoint.clone(),
            link_headers.clone(),
        ));
        let mut machine = LinkMachine {
            api,
            store,
            host,
            popup,
            link_headers,
            state: LinkState::Idle,
            context: None,
            platforms: Vec::new(),
            white_label: false,
            show_name_input: payload.show_name_input.unwrap_or(false),
            preselected: false,
            attempt_cancel: CancellationToken::new(),
        };

        match machine.store.mint().await {
            Ok(record) => {
                machine.platforms = record.link_settings.connected_platforms.clone();
                machine.white_label = record.white_label();
                info!(
                    platforms = machine.platforms.len(),
                    white_label = machine.white_label,
                    "embedding booted"
                );
            }
            Err(e) => {
                machine.fail(e);
                return machine;
            }
        }

        if let Some(key) = payload.selected_connection.as_deref() {
            match matcher::find_platform(key, &machine.platforms).cloned() {
                Some(platform) => {
                    machine.preselected = true;
                    machine.select_platform(platform).await;
                }
                None => {
                    machine.preselected = true;
                    machine.fail(Error::DefinitionNotFound(key.to_string()));
                }
            }
        }
        machine
    }

    /// Start an attempt against one platform: mint a fresh session, fetch
    /// the definition, and land in the matching entry state.
    pub async fn select_platform(&mut self, authorization: PlatformAuthorization) {
        self.reset_attempt();
        self.context = None;
        self.state = LinkState::DefinitionLoading;

        if let Err(e) = self.store.mint().await {
            self.fail(e);
            return;
        }

        let Some(target) = matcher::connect_target(&authorization) else {
            self.fail(Error::DefinitionNotFound(authorization.platform.clone()));
            return;
        };

        let definition = match self.api.get_connection_definition(&target.definition_id).await {
            Ok(definition) => definition,
            Err(e) => {
                self.fail(e);
                return;
            }
        };

        if !definition.uses_oauth() {
            self.context = Some(AttemptContext {
                authorization,
                definition,
                oauth: None,
                values: FormValues::new(),
            });
            self.state = LinkState::FormEntry { error: None };
            return;
        }

        if target.client_id.is_none() {
            self.fail(Error::OAuthNotConfigured(authorization.platform.clone()));
            return;
        }

        self.state = LinkState::OAuthAwaitingDefinition;
        match self.api.get_oauth_definition(&definition.platform).await {
            Ok(oauth) => {
                self.context = Some(AttemptContext {
                    authorization,
                    definition,
                    oauth: Some(oauth),
                    values: FormValues::new(),
                });
                self.state = LinkState::OAuthFormEntry;
            }
            Err(e) => self.fail(e),
        }
    }

    /// Submit the entry form. For plain platforms this creates the
    /// connection; for OAuth platforms it runs the popup-and-poll protocol
    /// to completion.
    pub async fn submit(&mut self, values: FormValues) {
        match self.state {
            LinkState::FormEntry { .. } => self.submit_form(values).await,
            LinkState::OAuthFormEntry => self.submit_oauth(values).await,
            _ => warn!(state = ?self.state, "submit ignored outside an entry state"),
        }
    }

    async fn submit_form(&mut self, values: FormValues) {
        let Some(context) = self.context.as_mut() else {
            self.fail(Error::InternalError("form submit without context".to_string()));
            return;
        };
        context.values = values.clone();
        let definition_id = context.definition.id.clone();
        let platform = context.definition.platform.clone();
        self.state = LinkState::Submitting;

        let session = match self.store.ensure().await {
            Ok(session) => session,
            Err(e) => {
                self.fail(e);
                return;
            }
        };

        let request = CreateConnectionRequest {
            connect_token: session.link_settings.connect_token.clone(),
            form_data: values,
            definition_id,
            platform,
            headers: self.link_headers.clone(),
        };

        match self.api.create_connection(&request).await {
            Ok(connection) => {
                // Success reaches the host before the session flush so a
                // flush hiccup cannot delay or mask the outcome.
                self.host.emit(HostEvent::LinkSuccess {
                    message: connection.clone(),
                });
                self.store.persist(None).await;
                self.store.invalidate().await;
                info!(platform = %request.platform, "connection created");
                self.state = LinkState::Success { connection };
            }
            Err(Error::SubmissionRejected(message)) => {
                self.host.emit(HostEvent::LinkError {
                    message: message.clone(),
                });
                debug!(platform = %request.platform, "submission rejected, form retained");
                self.state = LinkState::FormEntry {
                    error: Some(message),
                };
            }
            Err(other) => self.fail(other),
        }
    }

    async fn submit_oauth(&mut self, values: FormValues) {
        let Some(context) = self.context.as_mut() else {
            self.fail(Error::InternalError("oauth submit without context".to_string()));
            return;
        };
        context.values = values;
        let Some(oauth) = context.oauth.clone() else {
            self.fail(Error::InternalError("oauth submit without definition".to_string()));
            return;
        };
        let Some(client_id) = context.authorization.client_id().map(str::to_string) else {
            let platform = context.authorization.platform.clone();
            self.fail(Error::OAuthNotConfigured(platform));
            return;
        };

        let attempt = OAuthAttempt {
            definition: oauth,
            client_id,
            scopes: context.authorization.scopes.clone(),
            environment: context.authorization.environment.unwrap_or_default(),
            form_values: context.values.clone(),
        };
        self.state = LinkState::Submitting;

        let protocol = OAuthProtocol::new(
            self.store.clone(),
            self.api.clone(),
            self.host.clone(),
            self.popup.clone(),
        );
        match protocol.run(attempt, self.attempt_cancel.clone()).await {
            Ok(OAuthResolution::Connected(connection)) => {
                self.state = LinkState::Success { connection };
            }
            Ok(OAuthResolution::Failed(message)) => {
                // The protocol already reported this to the host.
                self.state = LinkState::Failed {
                    error: Error::OAuthFailed(message),
                };
            }
            Ok(OAuthResolution::SessionExpired) => self.fail(Error::SessionExpired),
            Ok(OAuthResolution::Cancelled) => {
                debug!("authorization attempt cancelled");
                self.state = LinkState::OAuthFormEntry;
            }
            Err(e) => self.fail(e),
        }
    }

    /// Return from a failed attempt to its entry form, values retained.
    /// Unavailable for host-preselected embeddings, which only close.
    pub fn retry(&mut self) {
        if !matches!(self.state, LinkState::Failed { .. }) {
            warn!(state = ?self.state, "retry ignored outside failed state");
            return;
        }
        if self.preselected {
            debug!("retry unavailable for preselected embedding");
            return;
        }
        let Some(context) = &self.context else {
            debug!("retry unavailable before an entry state was reached");
            return;
        };
        let oauth = context.oauth.is_some();
        self.reset_attempt();
        self.state = if oauth {
            LinkState::OAuthFormEntry
        } else {
            LinkState::FormEntry { error: None }
        };
    }

    /// Abandon the current attempt and return to the catalog. The session
    /// is flushed but stays open; no host event is emitted.
    pub async fn back(&mut self) {
        if self.preselected {
            self.close().await;
            return;
        }
        self.reset_attempt();
        self.store.persist(None).await;
        self.context = None;
        self.state = LinkState::Idle;
    }

    /// Close the widget: cancel any in-flight attempt, flush and release
    /// the session, and tell the host via `EXIT_EVENT_LINK`.
    pub async fn close(&mut self) {
        self.attempt_cancel.cancel();
        self.store.release(self.host.as_ref()).await;
        self.context = None;
        self.state = LinkState::Idle;
    }

    /// Token that interrupts the in-flight attempt from another task.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.attempt_cancel.clone()
    }

    fn reset_attempt(&mut self) {
        self.attempt_cancel.cancel();
        self.attempt_cancel = CancellationToken::new();
    }

    fn fail(&mut self, error: Error) {
        warn!(%error, "attempt failed");
        self.host.emit(HostEvent::LinkError {
            message: error.user_message(),
        });
        self.state = LinkState::Failed { error };
    }

    pub fn state(&self) -> &LinkState {
        &self.state
    }

    pub fn platforms(&self) -> &[PlatformAuthorization] {
        &self.platforms
    }

    pub fn white_label(&self) -> bool {
        self.white_label
    }

    pub fn show_name_input(&self) -> bool {
        self.show_name_input
    }

    pub fn preselected(&self) -> bool {
        self.preselected
    }

    /// Definition backing the current attempt, once loaded.
    pub fn definition(&self) -> Option<&ConnectionDefinition> {
        self.context.as_ref().map(|c| &c.definition)
    }

    pub fn oauth_definition(&self) -> Option<&OAuthDefinition> {
        self.context.as_ref().and_then(|c| c.oauth.as_ref())
    }

    /// Values the user entered for the current attempt, retained across
    /// rejection and retry.
    pub fn form_values(&self) -> Option<&FormValues> {
        self.context.as_ref().map(|c| &c.values)
    }

    /// Whether a catalog tool can be connected through this session.
    pub fn connectability<'a>(&'a self, tool: &ToolDescriptor) -> MatchOutcome<'a> {
        matcher::evaluate(tool, &self.platforms)
    }

    pub async fn session_id(&self) -> Option<String> {
        self.store.session_id().await
    }
}

impl Drop for LinkMachine {
    fn drop(&mut self) {
        self.attempt_cancel.cancel();
    }
}
