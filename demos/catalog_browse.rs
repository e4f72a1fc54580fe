//! Browses the tool catalog offline: assistant lookup, tool listing, search,
//! and per-platform actions against the in-crate fake backend.
//!
//! Pass a search query as the first argument.

use std::env;
use std::sync::Arc;

use tracing::info;

use linkkit::schema::{ToolAction, ToolDescriptor};
use linkkit::testutils::FakeCatalogApi;
use linkkit::ToolCatalog;

fn tool(name: &str, title: &str, category: &str, description: &str) -> ToolDescriptor {
    ToolDescriptor {
        id: name.to_string(),
        name: name.to_string(),
        title: title.to_string(),
        short_description: Some(description.to_string()),
        categories: vec![category.to_string()],
        ..Default::default()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let query = env::args().nth(1).unwrap_or_else(|| "drive".to_string());

    let api = Arc::new(FakeCatalogApi::default());
    api.queue_lookup(Ok("asst_demo".to_string()));
    api.set_tools(Ok(vec![
        tool("stripe", "Stripe", "payments", "Accept payments"),
        tool("gdrive", "Google Drive", "storage", "Files and folders"),
        tool("notion", "Notion", "docs", "Pages and databases"),
    ]));
    api.set_actions(Ok(vec![ToolAction {
        title: "Create Invoice".to_string(),
        connection_platform: Some("stripe".to_string()),
        ..Default::default()
    }]));

    let mut catalog = ToolCatalog::new(api);
    catalog.resolve_assistant(Some("sk_demo_secret")).await;
    info!(assistant = ?catalog.assistant_id(), "assistant resolved");

    catalog.load_tools().await;
    info!("loaded {} tools", catalog.tools().len());

    info!("search '{query}':");
    for tool in catalog.search(&query) {
        info!("  - {} [{}]", tool.title, tool.categories.join(", "));
    }

    let actions = catalog.actions("stripe").await;
    info!("stripe advertises {} actions", actions.len());
    for action in &actions {
        info!("  - {}", action.title);
    }

    Ok(())
}
