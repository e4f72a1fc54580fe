//! Tool catalog: assistant lookup, tool listing, and per-platform actions.
//!
//! The catalog degrades instead of failing. A lookup that cannot complete
//! leaves a display-ready message in `lookup_error`; a tool listing that
//! cannot complete falls back to a placeholder entry so the widget still
//! renders.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use crate::api::CatalogApi;
use crate::retry::{with_retry, RetryConfig};
use crate::schema::{ToolAction, ToolDescriptor};

/// Ceiling on the tool-listing fetch before the fallback kicks in.
pub const TOOLS_TIMEOUT: Duration = Duration::from_secs(8);

pub const MISSING_SECRET_MESSAGE: &str = "Couldn't identify the assistant. Missing secret.";
pub const LOOKUP_FAILED_MESSAGE: &str =
    "Couldn't identify the assistant. Please refresh and try again.";

fn fallback_tools() -> Vec<ToolDescriptor> {
    vec![ToolDescriptor {
        id: "sample".to_string(),
        name: "sample-tool".to_string(),
        title: "Sample Tool".to_string(),
        short_description: Some(
            "Example catalog entry shown while the catalog is unreachable.".to_string(),
        ),
        ..Default::default()
    }]
}

/// Catalog state for one widget embedding.
pub struct ToolCatalog {
    api: Arc<dyn CatalogApi>,
    lookup_config: RetryConfig,
    assistant_id: Option<String>,
    tools: Vec<ToolDescriptor>,
    lookup_error: Option<String>,
}

impl ToolCatalog {
    pub fn new(api: Arc<dyn CatalogApi>) -> Self {
        ToolCatalog {
            api,
            lookup_config: RetryConfig::default(),
            assistant_id: None,
            tools: Vec::new(),
            lookup_error: None,
        }
    }

    /// Override the lookup retry schedule. Tests use short delays here.
    pub fn with_lookup_config(mut self, config: RetryConfig) -> Self {
        self.lookup_config = config;
        self
    }

    /// Resolve the assistant behind the embedder's secret. Failures never
    /// propagate; they land in [`ToolCatalog::lookup_error`] as the string
    /// the widget shows.
    pub async fn resolve_assistant(&mut self, secret: Option<&str>) {
        self.lookup_error = None;
        let Some(secret) = secret.filter(|s| !s.trim().is_empty()) else {
            self.lookup_error = Some(MISSING_SECRET_MESSAGE.to_string());
            return;
        };

        let api = self.api.clone();
        match with_retry(&self.lookup_config, || {
            let api = api.clone();
            async move { api.lookup_assistant(secret).await }
        })
        .await
        {
            Ok(assistant_id) => self.assistant_id = Some(assistant_id),
            Err(e) => {
                warn!(error = %e, "assistant lookup failed");
                self.lookup_error = Some(LOOKUP_FAILED_MESSAGE.to_string());
            }
        }
    }

    /// Fetch the tool listing, bounded by [`TOOLS_TIMEOUT`]. On any failure
    /// the placeholder listing is installed instead.
    pub async fn load_tools(&mut self) {
        let fetched = timeout(
            TOOLS_TIMEOUT,
            self.api.list_tools(self.assistant_id.as_deref()),
        )
        .await;
        self.tools = match fetched {
            Ok(Ok(tools)) if !tools.is_empty() => tools,
            Ok(Ok(_)) => {
                warn!("catalog returned no tools, using fallback listing");
                fallback_tools()
            }
            Ok(Err(e)) => {
                warn!(error = %e, "tool listing failed, using fallback listing");
                fallback_tools()
            }
            Err(_) => {
                warn!(timeout = ?TOOLS_TIMEOUT, "tool listing timed out, using fallback listing");
                fallback_tools()
            }
        };
    }

    /// Actions advertised for one platform. Missing or failing action data
    /// degrades to an empty list.
    pub async fn actions(&self, platform: &str) -> Vec<ToolAction> {
        match self.api.tool_actions(platform).await {
            Ok(actions) => actions,
            Err(e) => {
                warn!(platform = %platform, error = %e, "action listing failed");
                Vec::new()
            }
        }
    }

    /// Case-insensitive substring search over the loaded listing.
    pub fn search(&self, query: &str) -> Vec<&ToolDescriptor> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.tools.iter().collect();
        }
        self.tools
            .iter()
            .filter(|tool| {
                let mut haystacks = vec![
                    tool.name.as_str(),
                    tool.title.as_str(),
                ];
                haystacks.extend(tool.provider.as_deref());
                haystacks.extend(tool.short_description.as_deref());
                haystacks.extend(tool.long_description.as_deref());
                haystacks.extend(tool.categories.iter().map(String::as_str));
                haystacks
                    .iter()
                    .any(|h| h.to_lowercase().contains(&query))
            })
            .collect()
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn assistant_id(&self) -> Option<&str> {
        self.assistant_id.as_deref()
    }

    pub fn lookup_error(&self) -> Option<&str> {
        self.lookup_error.as_deref()
    }
}
