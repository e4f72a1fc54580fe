//! Test utilities for `linkkit`.
//!
//! This module aggregates the helper types and functions that are useful when
//! writing unit and integration tests against this crate. Everything is kept
//! behind the `testutils` module so that the public API surface of the crate
//! remains clean while still making the helpers available to *external* test
//! crates via `use linkkit::testutils::*`.
//!
//! The fakes here are deliberately simple queue-driven stand-ins for the two
//! backend traits: a test enqueues the responses it wants, runs the code
//! under test, then asserts on the recorded calls. Centralising them keeps
//! the tests short, avoids subtle divergences between suites, and gives
//! downstream users example doubles they can re-use when testing their own
//! embedder glue.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::{CatalogApi, CreateConnectionRequest, LinkApi};
use crate::error::{Error, Result};
use crate::host::{HostChannel, HostEvent};
use crate::oauth::{PopupOpener, PopupRequest};
use crate::schema::{
    Connection, ConnectionDefinition, ConnectionForm, DefinitionFrontend, DefinitionSettings,
    DefinitionSpec, FormField, FormValues, LinkSession, LinkSettings, OAuthDefinition,
    OAuthFrontend, PlatformAuthorization, PlatformSecret, SessionResponse, ToolAction,
    ToolDescriptor,
};

/// Queue-driven [`LinkApi`] double.
///
/// Each endpoint consumes from its own queue; when a queue runs dry the fake
/// falls back to a benign default (a fresh fixture session, empty rows, a
/// default connection) so tests only have to script the calls they care
/// about. Call counts and argument logs are kept for assertions.
#[derive(Default)]
pub struct FakeLinkApi {
    created: AtomicU32,
    fetched: AtomicU32,
    updated: AtomicU32,
    definition_fetches: AtomicU32,
    oauth_fetches: AtomicU32,
    connection_attempts: AtomicU32,
    create_queue: Mutex<VecDeque<Result<LinkSession>>>,
    poll_queue: Mutex<VecDeque<Result<Vec<LinkSession>>>>,
    update_queue: Mutex<VecDeque<Result<()>>>,
    connection_queue: Mutex<VecDeque<Result<Connection>>>,
    definitions: Mutex<HashMap<String, Result<ConnectionDefinition>>>,
    oauth_definitions: Mutex<HashMap<String, Result<OAuthDefinition>>>,
    create_log: Mutex<Vec<(String, HashMap<String, String>)>>,
    update_log: Mutex<Vec<(String, Option<FormValues>)>>,
    connection_log: Mutex<Vec<CreateConnectionRequest>>,
}

impl FakeLinkApi {
    pub fn queue_create(&self, result: Result<LinkSession>) {
        self.create_queue.lock().unwrap().push_back(result);
    }

    pub fn queue_poll(&self, result: Result<Vec<LinkSession>>) {
        self.poll_queue.lock().unwrap().push_back(result);
    }

    pub fn queue_update(&self, result: Result<()>) {
        self.update_queue.lock().unwrap().push_back(result);
    }

    pub fn queue_connection(&self, result: Result<Connection>) {
        self.connection_queue.lock().unwrap().push_back(result);
    }

    pub fn set_definition(&self, definition: ConnectionDefinition) {
        self.definitions
            .lock()
            .unwrap()
            .insert(definition.id.clone(), Ok(definition));
    }

    pub fn fail_definition(&self, definition_id: &str, error: Error) {
        self.definitions
            .lock()
            .unwrap()
            .insert(definition_id.to_string(), Err(error));
    }

    pub fn set_oauth_definition(&self, definition: OAuthDefinition) {
        self.oauth_definitions
            .lock()
            .unwrap()
            .insert(definition.connection_platform.clone(), Ok(definition));
    }

    pub fn fail_oauth_definition(&self, platform: &str, error: Error) {
        self.oauth_definitions
            .lock()
            .unwrap()
            .insert(platform.to_string(), Err(error));
    }

    pub fn sessions_created(&self) -> u32 {
        self.created.load(Ordering::SeqCst)
    }

    pub fn sessions_fetched(&self) -> u32 {
        self.fetched.load(Ordering::SeqCst)
    }

    pub fn sessions_updated(&self) -> u32 {
        self.updated.load(Ordering::SeqCst)
    }

    pub fn definitions_fetched(&self) -> u32 {
        self.definition_fetches.load(Ordering::SeqCst)
    }

    pub fn oauth_definitions_fetched(&self) -> u32 {
        self.oauth_fetches.load(Ordering::SeqCst)
    }

    pub fn connections_attempted(&self) -> u32 {
        self.connection_attempts.load(Ordering::SeqCst)
    }

    /// Endpoint and headers of each session-create call, in order.
    pub fn create_log(&self) -> Vec<(String, HashMap<String, String>)> {
        self.create_log.lock().unwrap().clone()
    }

    /// Session id and form payload of each session-update call, in order.
    pub fn update_log(&self) -> Vec<(String, Option<FormValues>)> {
        self.update_log.lock().unwrap().clone()
    }

    pub fn connection_log(&self) -> Vec<CreateConnectionRequest> {
        self.connection_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl LinkApi for FakeLinkApi {
    async fn create_link_session(
        &self,
        endpoint: &str,
        headers: &HashMap<String, String>,
    ) -> Result<LinkSession> {
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        self.create_log
            .lock()
            .unwrap()
            .push((endpoint.to_string(), headers.clone()));
        self.create_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(session_fixture(&format!("sess-auto-{n}"))))
    }

    async fn get_link_session(&self, _session_id: &str) -> Result<Vec<LinkSession>> {
        self.fetched.fetch_add(1, Ordering::SeqCst);
        self.poll_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Vec::new()))
    }

    async fn update_link_session(
        &self,
        session_id: &str,
        form_data: Option<&FormValues>,
    ) -> Result<()> {
        self.updated.fetch_add(1, Ordering::SeqCst);
        self.update_log
            .lock()
            .unwrap()
            .push((session_id.to_string(), form_data.cloned()));
        self.update_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn get_connection_definition(
        &self,
        definition_id: &str,
    ) -> Result<ConnectionDefinition> {
        self.definition_fetches.fetch_add(1, Ordering::SeqCst);
        self.definitions
            .lock()
            .unwrap()
            .get(definition_id)
            .cloned()
            .unwrap_or_else(|| Err(Error::DefinitionNotFound(definition_id.to_string())))
    }

    async fn get_oauth_definition(&self, platform: &str) -> Result<OAuthDefinition> {
        self.oauth_fetches.fetch_add(1, Ordering::SeqCst);
        self.oauth_definitions
            .lock()
            .unwrap()
            .get(platform)
            .cloned()
            .unwrap_or_else(|| Err(Error::OAuthNotConfigured(platform.to_string())))
    }

    async fn create_connection(&self, request: &CreateConnectionRequest) -> Result<Connection> {
        self.connection_attempts.fetch_add(1, Ordering::SeqCst);
        self.connection_log.lock().unwrap().push(request.clone());
        self.connection_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(connection_fixture("conn-auto")))
    }
}

/// Queue-driven [`CatalogApi`] double.
#[derive(Default)]
pub struct FakeCatalogApi {
    lookups: AtomicU32,
    lookup_queue: Mutex<VecDeque<Result<String>>>,
    tools: Mutex<Option<Result<Vec<ToolDescriptor>>>>,
    actions: Mutex<Option<Result<Vec<ToolAction>>>>,
}

impl FakeCatalogApi {
    pub fn queue_lookup(&self, result: Result<String>) {
        self.lookup_queue.lock().unwrap().push_back(result);
    }

    pub fn set_tools(&self, result: Result<Vec<ToolDescriptor>>) {
        *self.tools.lock().unwrap() = Some(result);
    }

    pub fn set_actions(&self, result: Result<Vec<ToolAction>>) {
        *self.actions.lock().unwrap() = Some(result);
    }

    pub fn lookup_calls(&self) -> u32 {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogApi for FakeCatalogApi {
    async fn lookup_assistant(&self, _secret: &str) -> Result<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.lookup_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Transport("no lookup result queued".to_string())))
    }

    async fn list_tools(&self, _assistant_id: Option<&str>) -> Result<Vec<ToolDescriptor>> {
        self.tools
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(Ok(Vec::new()))
    }

    async fn tool_actions(&self, _platform: &str) -> Result<Vec<ToolAction>> {
        self.actions
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(Ok(Vec::new()))
    }
}

/// [`HostChannel`] that records every event for later assertion.
#[derive(Default)]
pub struct CollectingHost {
    events: Mutex<Vec<HostEvent>>,
}

impl CollectingHost {
    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Drain the recorded events, leaving the collector empty.
    pub fn take(&self) -> Vec<HostEvent> {
        std::mem::take(&mut self.events.lock().unwrap())
    }
}

impl HostChannel for CollectingHost {
    fn emit(&self, event: HostEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// [`PopupOpener`] that records every request instead of opening anything.
#[derive(Default)]
pub struct RecordingPopup {
    opened: Mutex<Vec<PopupRequest>>,
}

impl RecordingPopup {
    pub fn opened(&self) -> Vec<PopupRequest> {
        self.opened.lock().unwrap().clone()
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }
}

impl PopupOpener for RecordingPopup {
    fn open(&self, popup: &PopupRequest) {
        self.opened.lock().unwrap().push(popup.clone());
    }
}

/// A usable session expiring an hour from now.
pub fn session_fixture(session_id: &str) -> LinkSession {
    LinkSession {
        session_id: session_id.to_string(),
        expires_at: Some(chrono::Utc::now().timestamp_millis() + 3_600_000),
        link_settings: LinkSettings {
            connected_platforms: Vec::new(),
            connect_token: Some(format!("tok-{session_id}")),
        },
        features: Vec::new(),
        response: None,
    }
}

/// A connectable platform authorization with a client id.
pub fn platform_fixture(platform: &str, definition_id: &str) -> PlatformAuthorization {
    PlatformAuthorization {
        name: platform.to_string(),
        platform: platform.to_string(),
        connection_definition_id: Some(definition_id.to_string()),
        secret: Some(PlatformSecret {
            client_id: Some(format!("client-{platform}")),
        }),
        ..Default::default()
    }
}

pub fn definition_fixture(id: &str, platform: &str, oauth: bool) -> ConnectionDefinition {
    ConnectionDefinition {
        id: id.to_string(),
        platform: platform.to_string(),
        settings: DefinitionSettings { oauth },
        frontend: DefinitionFrontend {
            spec: DefinitionSpec {
                title: platform.to_string(),
                ..Default::default()
            },
            connection_form: ConnectionForm {
                form_data: vec![FormField {
                    name: "apiKey".to_string(),
                    label: "API Key".to_string(),
                    field_type: "text".to_string(),
                    required: Some(true),
                    ..Default::default()
                }],
            },
        },
    }
}

pub fn oauth_definition_fixture(platform: &str) -> OAuthDefinition {
    OAuthDefinition {
        id: Some(format!("oauth-{platform}")),
        connection_platform: platform.to_string(),
        frontend: OAuthFrontend {
            callback_uri: "https://link.example/oauth/callback".to_string(),
            redirect_uri: format!("https://{platform}.example/oauth/authorize?response_type=code"),
            sandbox_redirect_uri: None,
            scopes: Some("read".to_string()),
        },
    }
}

pub fn connection_fixture(id: &str) -> Connection {
    Connection {
        id: Some(id.to_string()),
        key: Some(format!("live::{id}")),
        platform: Some("stripe".to_string()),
        ..Default::default()
    }
}

pub fn tool_fixture(name: &str) -> ToolDescriptor {
    ToolDescriptor {
        id: name.to_string(),
        name: name.to_string(),
        title: name.to_string(),
        ..Default::default()
    }
}

/// A session row still waiting for the provider callback.
pub fn pending_row(session_id: &str) -> Vec<LinkSession> {
    vec![session_fixture(session_id)]
}

/// A session row recording a successful connection.
pub fn connected_row(session_id: &str, connection_id: &str) -> Vec<LinkSession> {
    let mut session = session_fixture(session_id);
    session.response = Some(SessionResponse {
        is_connected: Some(true),
        message: None,
        connection: Some(connection_fixture(connection_id)),
    });
    vec![session]
}

/// A session row recording a provider rejection.
pub fn failed_row(session_id: &str, message: &str) -> Vec<LinkSession> {
    let mut session = session_fixture(session_id);
    session.response = Some(SessionResponse {
        is_connected: None,
        message: Some(message.to_string()),
        connection: None,
    });
    vec![session]
}
