//! Drives one embedding through the credential-form flow with no UI attached.
//!
//! The backend is the in-crate queue-driven fake, so this runs offline and
//! prints the exact JSON messages a host page would receive.

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use linkkit::schema::{EmbedPayload, FormValues};
use linkkit::testutils::{definition_fixture, platform_fixture, session_fixture, FakeLinkApi};
use linkkit::{ChannelHost, LinkMachine, LinkState, LoggingPopup};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // Script a backend: one session offering a single connectable platform.
    let api = Arc::new(FakeLinkApi::default());
    let mut boot = session_fixture("sess_demo");
    boot.link_settings.connected_platforms = vec![platform_fixture("stripe", "cd_stripe")];
    api.queue_create(Ok(boot));
    api.set_definition(definition_fixture("cd_stripe", "stripe", false));

    let (host, mut events) = ChannelHost::new();
    let payload = EmbedPayload {
        link_token_endpoint: "https://host.example/link-tokens".to_string(),
        ..Default::default()
    };

    let mut machine = LinkMachine::boot(
        payload,
        api.clone(),
        Arc::new(host),
        Arc::new(LoggingPopup),
    )
    .await;
    info!(
        platforms = machine.platforms().len(),
        white_label = machine.white_label(),
        "embedding booted"
    );

    let platform = machine.platforms()[0].clone();
    machine.select_platform(platform).await;

    if let Some(definition) = machine.definition() {
        info!("form for {}:", definition.frontend.spec.title);
        for field in &definition.frontend.connection_form.form_data {
            info!("  - {} ({})", field.label, field.field_type);
        }
    }

    let mut values = FormValues::new();
    values.insert("apiKey".to_string(), json!("sk_live_demo"));
    machine.submit(values).await;

    match machine.state() {
        LinkState::Success { connection } => {
            info!(id = ?connection.id, "connection established");
        }
        other => info!(state = ?other, "unexpected outcome"),
    }

    machine.close().await;

    info!("messages the host page received:");
    while let Ok(event) = events.try_recv() {
        info!("  {}", serde_json::to_string(&event)?);
    }

    Ok(())
}
