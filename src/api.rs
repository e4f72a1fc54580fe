//! Backend seams the engine drives.
//!
//! Production code talks to [`crate::HttpLinkApi`]; tests substitute the
//! fakes in [`crate::testutils`].

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::schema::{
    Connection, ConnectionDefinition, FormValues, LinkSession, OAuthDefinition, ToolAction,
    ToolDescriptor,
};

/// Parameters for creating a connection from submitted form credentials.
#[derive(Debug, Clone, Default)]
pub struct CreateConnectionRequest {
    /// One-time token from the session's link settings.
    pub connect_token: Option<String>,
    pub form_data: FormValues,
    pub definition_id: String,
    pub platform: String,
    /// Host-supplied headers forwarded verbatim.
    pub headers: HashMap<String, String>,
}

/// Session and connection endpoints.
#[async_trait]
pub trait LinkApi: Send + Sync {
    /// Mint a fresh link session at the host's token endpoint.
    async fn create_link_session(
        &self,
        endpoint: &str,
        headers: &HashMap<String, String>,
    ) -> Result<LinkSession>;

    /// Fetch the current rows for a session id. An empty vec means the
    /// backend no longer knows the session.
    async fn get_link_session(&self, session_id: &str) -> Result<Vec<LinkSession>>;

    /// Push collected form values onto a session, or just touch it when
    /// `form_data` is `None`.
    async fn update_link_session(
        &self,
        session_id: &str,
        form_data: Option<&FormValues>,
    ) -> Result<()>;

    async fn get_connection_definition(&self, definition_id: &str)
        -> Result<ConnectionDefinition>;

    /// Fetch the OAuth companion definition for a platform key.
    async fn get_oauth_definition(&self, platform: &str) -> Result<OAuthDefinition>;

    async fn create_connection(&self, request: &CreateConnectionRequest) -> Result<Connection>;
}

/// Tool catalog endpoints.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Resolve the assistant id behind a secret.
    async fn lookup_assistant(&self, secret: &str) -> Result<String>;

    async fn list_tools(&self, assistant_id: Option<&str>) -> Result<Vec<ToolDescriptor>>;

    async fn tool_actions(&self, platform: &str) -> Result<Vec<ToolAction>>;
}
