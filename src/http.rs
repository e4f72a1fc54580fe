//! HTTP implementations of [`LinkApi`] and [`CatalogApi`] over reqwest.
//!
//! Failures are mapped per concern: session endpoints always surface
//! [`Error::SessionUnavailable`], connection creation always surfaces
//! [`Error::SubmissionRejected`] with a display-ready message, and the
//! definition endpoints distinguish missing records from transport faults.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::api::{CatalogApi, CreateConnectionRequest, LinkApi};
use crate::config::LinkConfig;
use crate::error::{Error, Result};
use crate::schema::{
    Connection, ConnectionDefinition, FormValues, LinkSession, OAuthDefinition, ToolAction,
    ToolDescriptor,
};

/// Header carrying the embedder's secret on catalog and platform calls.
pub const SECRET_HEADER: &str = "x-link-secret";

/// Connection definitions change rarely; refetch at most daily.
const DEFINITION_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// The OAuth definition list is shared across platforms; refetch after this.
const OAUTH_LIST_TTL: Duration = Duration::from_secs(5 * 60);

const REJECTION_FALLBACK: &str = "Something went wrong. Please try again later.";

#[derive(Debug, Deserialize)]
struct RowsEnvelope<T> {
    #[serde(default)]
    rows: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StatusEnvelope<T> {
    #[serde(default)]
    status_code: i64,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ActionArgs {
    #[serde(default)]
    rows: Vec<ToolAction>,
}

#[derive(Debug, Deserialize)]
struct ActionData {
    args: Option<ActionArgs>,
}

#[derive(Debug, Deserialize)]
struct AssistantLookup {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    assistant_id: Option<String>,
}

/// Tool row as the catalog endpoint serves it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTool {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    logo_url: Option<String>,
}

impl WireTool {
    fn into_descriptor(self) -> ToolDescriptor {
        let id = match self.id {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => String::new(),
        };
        let title = self
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.name.clone());
        let mut categories: Vec<String> =
            self.category.into_iter().filter(|c| !c.is_empty()).collect();
        categories.extend(self.tags);
        ToolDescriptor {
            id,
            name: self.name,
            title,
            provider: self.provider,
            short_description: self.description.clone(),
            long_description: self.description.map(|d| format!("<p>{d}</p>")),
            categories,
            logo: self.logo_url,
            learn_more: None,
        }
    }
}

fn session_error(e: impl std::fmt::Display) -> Error {
    Error::SessionUnavailable(e.to_string())
}

/// Pull the display message out of a connection-creation error body. The
/// backend nests it as `message.message` with a plain `message` fallback.
fn extract_rejection(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let message = value.get("message")?;
    if let Some(inner) = message.get("message").and_then(Value::as_str) {
        return Some(inner.to_string());
    }
    message.as_str().map(str::to_string)
}

/// Shared HTTP client for all backend traffic of one embedding.
pub struct HttpLinkApi {
    client: reqwest::Client,
    config: LinkConfig,
    definitions: DashMap<String, (ConnectionDefinition, Instant)>,
    oauth_definitions: Mutex<Option<(Vec<OAuthDefinition>, Instant)>>,
}

impl HttpLinkApi {
    pub fn new(config: LinkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(HttpLinkApi {
            client,
            config,
            definitions: DashMap::new(),
            oauth_definitions: Mutex::new(None),
        })
    }

    fn with_secret(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.secret {
            Some(secret) => request.header(SECRET_HEADER, secret),
            None => request,
        }
    }
}

#[async_trait]
impl LinkApi for HttpLinkApi {
    async fn create_link_session(
        &self,
        endpoint: &str,
        headers: &HashMap<String, String>,
    ) -> Result<LinkSession> {
        let mut request = self.client.post(endpoint);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(session_error)?;
        response.json().await.map_err(session_error)
    }

    async fn get_link_session(&self, session_id: &str) -> Result<Vec<LinkSession>> {
        let response = self
            .client
            .post(self.config.endpoints.session_get())
            .json(&json!({ "sessionId": session_id }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(session_error)?;
        response.json().await.map_err(session_error)
    }

    async fn update_link_session(
        &self,
        session_id: &str,
        form_data: Option<&FormValues>,
    ) -> Result<()> {
        let mut body = json!({ "sessionId": session_id });
        if let Some(form) = form_data {
            body["formData"] = Value::Object(form.clone());
        }
        self.client
            .post(self.config.endpoints.session_update())
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(session_error)?;
        Ok(())
    }

    async fn get_connection_definition(
        &self,
        definition_id: &str,
    ) -> Result<ConnectionDefinition> {
        if let Some(entry) = self.definitions.get(definition_id) {
            let (definition, fetched_at) = entry.value();
            if fetched_at.elapsed() < DEFINITION_TTL {
                debug!(definition_id, "connection definition served from cache");
                return Ok(definition.clone());
            }
        }

        let url = self.config.endpoints.connection_definitions(definition_id);
        let response = self
            .with_secret(self.client.get(&url))
            .send()
            .await?
            .error_for_status()?;
        let envelope: RowsEnvelope<ConnectionDefinition> = response.json().await?;
        let definition = envelope
            .rows
            .into_iter()
            .next()
            .ok_or_else(|| Error::DefinitionNotFound(definition_id.to_string()))?;
        self.definitions.insert(
            definition_id.to_string(),
            (definition.clone(), Instant::now()),
        );
        Ok(definition)
    }

    async fn get_oauth_definition(&self, platform: &str) -> Result<OAuthDefinition> {
        let mut cache = self.oauth_definitions.lock().await;
        let fresh = matches!(&*cache, Some((_, at)) if at.elapsed() < OAUTH_LIST_TTL);
        if !fresh {
            let url = self.config.endpoints.oauth_definitions();
            let response = self
                .with_secret(self.client.get(&url))
                .send()
                .await?
                .error_for_status()?;
            let envelope: RowsEnvelope<OAuthDefinition> = response.json().await?;
            *cache = Some((envelope.rows, Instant::now()));
        }

        cache
            .as_ref()
            .and_then(|(rows, _)| rows.iter().find(|d| d.connection_platform == platform))
            .cloned()
            .ok_or_else(|| Error::OAuthNotConfigured(platform.to_string()))
    }

    async fn create_connection(&self, request: &CreateConnectionRequest) -> Result<Connection> {
        let mut body = request.form_data.clone();
        body.insert(
            "connectionDefinitionId".to_string(),
            json!(request.definition_id),
        );
        body.insert("platform".to_string(), json!(request.platform));
        if let Some(token) = &request.connect_token {
            body.insert("connectToken".to_string(), json!(token));
        }

        let mut builder = self
            .with_secret(self.client.post(self.config.endpoints.connection_create()))
            .json(&Value::Object(body));
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, "connection creation transport failure");
            Error::SubmissionRejected(REJECTION_FALLBACK.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message =
                extract_rejection(&body).unwrap_or_else(|| REJECTION_FALLBACK.to_string());
            warn!(%status, platform = %request.platform, "connection creation rejected");
            return Err(Error::SubmissionRejected(message));
        }

        response
            .json()
            .await
            .map_err(|_| Error::SubmissionRejected(REJECTION_FALLBACK.to_string()))
    }
}

#[async_trait]
impl CatalogApi for HttpLinkApi {
    async fn lookup_assistant(&self, secret: &str) -> Result<String> {
        let response = self
            .client
            .post(self.config.endpoints.assistant_lookup())
            .json(&json!({
                "secret": secret,
                "options": {
                    "retryAlternative": true,
                    "includeMetadata": false,
                    "skipToolsFetch": true,
                },
            }))
            .send()
            .await?
            .error_for_status()?;
        let lookup: AssistantLookup = response.json().await?;
        match lookup.assistant_id {
            Some(id) if lookup.success && !id.is_empty() => Ok(id),
            _ => Err(Error::Transport(
                "assistant lookup returned no assistant".to_string(),
            )),
        }
    }

    async fn list_tools(&self, assistant_id: Option<&str>) -> Result<Vec<ToolDescriptor>> {
        let url = self.config.endpoints.tools(assistant_id);
        let response = self
            .with_secret(self.client.get(&url))
            .send()
            .await?
            .error_for_status()?;
        let envelope: StatusEnvelope<Vec<WireTool>> = response.json().await?;
        match (envelope.status_code, envelope.data) {
            (0, Some(rows)) => Ok(rows.into_iter().map(WireTool::into_descriptor).collect()),
            (code, _) => Err(Error::Transport(format!(
                "tool listing returned status {code}"
            ))),
        }
    }

    async fn tool_actions(&self, platform: &str) -> Result<Vec<ToolAction>> {
        let url = self.config.endpoints.tool_actions(platform);
        let response = self
            .with_secret(self.client.get(&url))
            .send()
            .await?
            .error_for_status()?;
        let envelope: StatusEnvelope<ActionData> = response.json().await?;
        match (envelope.status_code, envelope.data) {
            (0, Some(data)) => Ok(data.args.map(|a| a.rows).unwrap_or_default()),
            (code, _) => Err(Error::Transport(format!(
                "action listing returned status {code}"
            ))),
        }
    }
}
