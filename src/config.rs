//! Deployment environments and the endpoint table for each.

use std::time::Duration;

use url::Url;

/// Which backend deployment the widget talks to, derived from the host name
/// it was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Localhost,
    #[default]
    Development,
    Sandbox,
    Production,
}

impl Environment {
    /// Map a widget host name to its deployment. Unknown hosts resolve to
    /// development so a misdeployed widget never touches production data.
    pub fn from_host(host: &str) -> Self {
        let host = host.trim().to_lowercase();
        if host == "localhost" || host == "127.0.0.1" || host.starts_with("localhost:") {
            return Environment::Localhost;
        }
        match host.split('.').next() {
            Some("link") => Environment::Production,
            Some("sandbox-link") => Environment::Sandbox,
            Some("development-link") => Environment::Development,
            _ => Environment::Development,
        }
    }
}

/// Base URLs for the backend services one deployment exposes.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Platform API. Serves connection definitions and connection creation.
    pub platform_api: Url,
    /// Session API. Issues and polls link sessions.
    pub link_api: Url,
    /// Catalog API. Serves the tool listing.
    pub tools_api: Url,
    /// Assistant lookup API.
    pub lookup_api: Url,
}

impl Endpoints {
    pub fn for_environment(env: Environment) -> Self {
        let (platform, link, tools, lookup) = match env {
            Environment::Localhost => (
                "http://localhost:3005",
                "http://localhost:3005",
                "http://localhost:3005",
                "http://localhost:3005/api",
            ),
            Environment::Development => (
                "https://development-api.linkkit.dev",
                "https://development-api.linkkit.dev",
                "https://development-api.linkkit.dev",
                "https://development.linkkit.dev/api",
            ),
            Environment::Sandbox => (
                "https://sandbox-api.linkkit.dev",
                "https://sandbox-api.linkkit.dev",
                "https://sandbox-api.linkkit.dev",
                "https://sandbox.linkkit.dev/api",
            ),
            Environment::Production => (
                "https://api.linkkit.dev",
                "https://api.linkkit.dev",
                "https://api.linkkit.dev",
                "https://app.linkkit.dev/api",
            ),
        };
        Endpoints {
            platform_api: Url::parse(platform).expect("static URL"),
            link_api: Url::parse(link).expect("static URL"),
            tools_api: Url::parse(tools).expect("static URL"),
            lookup_api: Url::parse(lookup).expect("static URL"),
        }
    }

    pub fn connection_definitions(&self, definition_id: &str) -> String {
        format!(
            "{}/v1/public/connection-definitions?_id={}",
            trim_base(&self.platform_api),
            urlencoding::encode(definition_id)
        )
    }

    pub fn oauth_definitions(&self) -> String {
        format!(
            "{}/v1/public/connection-oauth-definition-schema?limit=100",
            trim_base(&self.platform_api)
        )
    }

    pub fn session_get(&self) -> String {
        format!("{}/public/v1/link-sessions/get", trim_base(&self.link_api))
    }

    pub fn session_update(&self) -> String {
        format!(
            "{}/public/v1/link-sessions/update",
            trim_base(&self.link_api)
        )
    }

    pub fn connection_create(&self) -> String {
        format!(
            "{}/public/v1/connections/create-embedded",
            trim_base(&self.platform_api)
        )
    }

    pub fn assistant_lookup(&self) -> String {
        format!("{}/assistant/lookup", trim_base(&self.lookup_api))
    }

    pub fn tools(&self, assistant_id: Option<&str>) -> String {
        let base = format!("{}/v1/tools", trim_base(&self.tools_api));
        match assistant_id {
            Some(id) => format!("{base}?assistant_id={}", urlencoding::encode(id)),
            None => base,
        }
    }

    pub fn tool_actions(&self, platform: &str) -> String {
        format!(
            "{}/v1/connection-model-actions?limit=255&connectionPlatform={}&include=title",
            trim_base(&self.tools_api),
            urlencoding::encode(platform)
        )
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints::for_environment(Environment::default())
    }
}

fn trim_base(url: &Url) -> &str {
    url.as_str().trim_end_matches('/')
}

/// Top-level engine configuration.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub endpoints: Endpoints,
    /// Secret forwarded as the `x-link-secret` header when present.
    pub secret: Option<String>,
    /// Per-request timeout applied to the HTTP client.
    pub timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            endpoints: Endpoints::default(),
            secret: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl LinkConfig {
    pub fn for_environment(env: Environment) -> Self {
        LinkConfig {
            endpoints: Endpoints::for_environment(env),
            ..Default::default()
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }
}
