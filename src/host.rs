//! Events the engine reports to the embedding host.
//!
//! In a deployed widget these cross an origin boundary as JSON messages, so
//! the serialized form is part of the contract: a `messageType` tag plus a
//! `message` payload.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::schema::Connection;

/// One message posted to the embedding host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "messageType")]
pub enum HostEvent {
    /// The user closed the widget without completing a connection.
    #[serde(rename = "EXIT_EVENT_LINK")]
    ExitEventLink,
    /// A connection was established.
    #[serde(rename = "LINK_SUCCESS")]
    LinkSuccess { message: Connection },
    /// A connection attempt failed. The message is display-ready.
    #[serde(rename = "LINK_ERROR")]
    LinkError { message: String },
}

/// Where the engine posts its events. Implementations must not block.
pub trait HostChannel: Send + Sync {
    fn emit(&self, event: HostEvent);
}

/// [`HostChannel`] backed by an unbounded channel, for embedders that drain
/// events from an async task.
#[derive(Debug, Clone)]
pub struct ChannelHost {
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl ChannelHost {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelHost { tx }, rx)
    }
}

impl HostChannel for ChannelHost {
    fn emit(&self, event: HostEvent) {
        // A dropped receiver means the host went away; nothing to report to.
        let _ = self.tx.send(event);
    }
}
