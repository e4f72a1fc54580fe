//! Wire-level data model shared by the engine and its backend collaborators.
//!
//! Everything here mirrors the JSON the collaborator endpoints speak: objects
//! use camelCase member names, optional members are omitted when absent, and
//! unknown members are ignored on input.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Feature flag key that switches the widget to white-label presentation.
pub const WHITE_LABEL_FEATURE: &str = "linkkit::white-label";

/// Flat key/value map collected from a credential or consent form.
pub type FormValues = serde_json::Map<String, Value>;

/// The embedding payload the host passes to the widget, base64-encoded JSON
/// on the widget URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmbedPayload {
    /// Host-side endpoint that issues link sessions.
    pub link_token_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_headers: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
    /// When set, the host wants exactly this platform connected and the
    /// catalog is skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_connection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_name_input: Option<bool>,
}

impl EmbedPayload {
    /// Decode the `data` query parameter of the widget URL.
    pub fn from_base64(data: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(data.trim())
            .map_err(|e| Error::InvalidPayload(format!("base64 decode failed: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::InvalidPayload(format!("payload is not valid JSON: {e}")))
    }
}

/// One link-session record as returned by the session endpoints.
///
/// The get endpoint returns an array of zero or one of these; an empty array
/// means the session is gone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinkSession {
    pub session_id: String,
    /// Epoch milliseconds. Absent means the backend did not bound the
    /// session's lifetime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub link_settings: LinkSettings,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<FeatureFlag>,
    /// Written by the backend once the provider callback lands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<SessionResponse>,
}

impl LinkSession {
    /// A session is stale when it carries an expiry and that expiry has
    /// passed. A missing expiry never goes stale.
    pub fn is_stale(&self, now_ms: i64) -> bool {
        self.expires_at.map(|at| at < now_ms).unwrap_or(false)
    }

    pub fn white_label(&self) -> bool {
        self.features
            .iter()
            .any(|f| f.key == WHITE_LABEL_FEATURE && f.value == "enabled")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinkSettings {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connected_platforms: Vec<PlatformAuthorization>,
    /// One-time token the form path submits as the connection-creation
    /// credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeatureFlag {
    pub key: String,
    pub value: String,
}

/// Connection outcome the backend records against a session once the OAuth
/// callback has been processed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_connected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<Connection>,
}

/// One platform the host has pre-authorized for connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformAuthorization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub platform: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub platform_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// A platform without this is visible but not connectable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_definition_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<PlatformSecret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<PlatformEnvironment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_guide: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl PlatformAuthorization {
    pub fn client_id(&self) -> Option<&str> {
        self.secret
            .as_ref()
            .and_then(|s| s.client_id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSecret {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlatformEnvironment {
    #[default]
    Test,
    Live,
}

/// A catalog entry the user may want to connect.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub id: String,
    pub name: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learn_more: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_platform: Option<String>,
}

/// Describes a platform's credential form and whether it requires OAuth.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDefinition {
    #[serde(rename = "_id")]
    pub id: String,
    pub platform: String,
    #[serde(default)]
    pub settings: DefinitionSettings,
    #[serde(default)]
    pub frontend: DefinitionFrontend,
}

impl ConnectionDefinition {
    pub fn uses_oauth(&self) -> bool {
        self.settings.oauth
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DefinitionSettings {
    #[serde(default)]
    pub oauth: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionFrontend {
    #[serde(default)]
    pub spec: DefinitionSpec,
    #[serde(default)]
    pub connection_form: ConnectionForm,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionSpec {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionForm {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub form_data: Vec<FormField>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

/// OAuth-specific companion to a [`ConnectionDefinition`], keyed by
/// `connectionPlatform`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OAuthDefinition {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub connection_platform: String,
    #[serde(default)]
    pub frontend: OAuthFrontend,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OAuthFrontend {
    /// Widget-side callback the provider redirects back to. Passed through
    /// as the `redirect_uri` query parameter, never rendered.
    #[serde(default)]
    pub callback_uri: String,
    /// Provider authorization URL, possibly a template over form values.
    #[serde(default)]
    pub redirect_uri: String,
    /// Preferred over `redirect_uri` when the platform environment is test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_redirect_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<String>,
}

/// The established connection, reported back to the host on success.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_definition_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<PlatformEnvironment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership: Option<Ownership>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ownership {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}
