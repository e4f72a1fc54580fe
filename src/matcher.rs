//! Decides whether a catalog tool can be connected through the current
//! session's authorized platforms.
//!
//! Matching is tolerant on purpose: catalog rows and platform authorizations
//! come from different backends whose casing and spacing drift, so every
//! identifier is trimmed and lowercased before comparison. A tool matches a
//! platform when any of its identifiers equals any of the platform's
//! identifiers, and the first matching platform in session order wins.

use tracing::{debug, info};

use crate::schema::{PlatformAuthorization, PlatformEnvironment, ToolDescriptor};

/// Verdict for one tool against the session's platform list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOutcome<'a> {
    /// True when a platform matched and it carries a connection definition.
    pub connectable: bool,
    /// The first matching platform, connectable or not.
    pub platform: Option<&'a PlatformAuthorization>,
}

/// Everything a connection attempt needs from the matched platform.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectTarget {
    pub definition_id: String,
    pub client_id: Option<String>,
    pub scopes: Option<String>,
    pub environment: PlatformEnvironment,
    pub connection_guide: Option<String>,
    pub platform: String,
}

fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn tool_candidates(tool: &ToolDescriptor) -> Vec<String> {
    [Some(tool.name.as_str()), Some(tool.title.as_str())]
        .into_iter()
        .flatten()
        .map(normalize)
        .filter(|c| !c.is_empty())
        .collect()
}

fn platform_candidates(platform: &PlatformAuthorization) -> Vec<String> {
    [
        Some(platform.platform.as_str()),
        platform.title.as_deref(),
        Some(platform.name.as_str()),
        platform.platform_type.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(normalize)
    .filter(|c| !c.is_empty())
    .collect()
}

/// Find the first platform whose identifiers overlap the tool's.
pub fn match_tool<'a>(
    tool: &ToolDescriptor,
    platforms: &'a [PlatformAuthorization],
) -> MatchOutcome<'a> {
    let wanted = tool_candidates(tool);
    for platform in platforms {
        let offered = platform_candidates(platform);
        if wanted.iter().any(|w| offered.contains(w)) {
            let connectable = platform
                .connection_definition_id
                .as_deref()
                .map(|id| !id.is_empty())
                .unwrap_or(false);
            return MatchOutcome {
                connectable,
                platform: Some(platform),
            };
        }
    }
    MatchOutcome {
        connectable: false,
        platform: None,
    }
}

/// [`match_tool`] with trace output for interactive debugging of catalogs
/// that "should" match but don't.
pub fn evaluate<'a>(
    tool: &ToolDescriptor,
    platforms: &'a [PlatformAuthorization],
) -> MatchOutcome<'a> {
    let outcome = match_tool(tool, platforms);
    match outcome.platform {
        Some(platform) => info!(
            tool = %tool.name,
            platform = %platform.platform,
            connectable = outcome.connectable,
            "matched tool to platform"
        ),
        None => debug!(
            tool = %tool.name,
            candidates = ?tool_candidates(tool),
            platforms = platforms.len(),
            "no platform matched tool"
        ),
    }
    outcome
}

/// Look a platform up by its key, used when the host preselects one.
pub fn find_platform<'a>(
    key: &str,
    platforms: &'a [PlatformAuthorization],
) -> Option<&'a PlatformAuthorization> {
    let wanted = normalize(key);
    if wanted.is_empty() {
        return None;
    }
    platforms
        .iter()
        .find(|p| platform_candidates(p).contains(&wanted))
}

/// Extract the connection parameters from a matched platform. `None` when
/// the platform has no connection definition and so cannot be connected.
pub fn connect_target(platform: &PlatformAuthorization) -> Option<ConnectTarget> {
    let definition_id = platform
        .connection_definition_id
        .as_deref()
        .filter(|id| !id.is_empty())?
        .to_string();
    Some(ConnectTarget {
        definition_id,
        client_id: platform.client_id().map(str::to_string),
        scopes: platform.scopes.clone(),
        environment: platform.environment.unwrap_or_default(),
        connection_guide: platform.connection_guide.clone(),
        platform: platform.platform.clone(),
    })
}
