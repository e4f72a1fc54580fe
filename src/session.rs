//! Link-session lifecycle: mint, reuse, persist, release.
//!
//! The store holds at most one session at a time. `ensure` is cache-first so
//! callers can invoke it before every network-bound step without re-issuing
//! tokens; a fresh network call happens only when the cached record is stale
//! or gone. Writes race as last-write-wins, which matches how the backend
//! treats session ids.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::api::LinkApi;
use crate::error::{Error, Result};
use crate::host::{HostChannel, HostEvent};
use crate::schema::{FormValues, LinkSession};

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Default)]
struct SessionState {
    session_id: Option<String>,
    record: Option<LinkSession>,
}

/// Owns the current link session for one widget embedding.
pub struct SessionStore {
    api: Arc<dyn LinkApi>,
    endpoint: String,
    headers: HashMap<String, String>,
    state: RwLock<SessionState>,
}

impl SessionStore {
    pub fn new(
        api: Arc<dyn LinkApi>,
        endpoint: impl Into<String>,
        headers: HashMap<String, String>,
    ) -> Self {
        SessionStore {
            api,
            endpoint: endpoint.into(),
            headers,
            state: RwLock::new(SessionState::default()),
        }
    }

    /// Mint a brand-new session and adopt it, discarding any cached one.
    pub async fn mint(&self) -> Result<LinkSession> {
        let record = self
            .api
            .create_link_session(&self.endpoint, &self.headers)
            .await
            .map_err(|e| match e {
                Error::SessionUnavailable(_) => e,
                other => Error::SessionUnavailable(other.to_string()),
            })?;
        debug!(session_id = %record.session_id, "minted link session");
        self.adopt(record.clone()).await;
        Ok(record)
    }

    /// Return a non-stale session, touching the network only when the cached
    /// one is unusable.
    ///
    /// Resolution order: cached record if not stale, then a refetch by the
    /// cached id, then a fresh mint. A refetch that errors or comes back
    /// empty falls through to minting.
    pub async fn ensure(&self) -> Result<LinkSession> {
        let now = now_ms();
        let cached_id = {
            let state = self.state.read().await;
            if let Some(record) = &state.record {
                if !record.is_stale(now) {
                    return Ok(record.clone());
                }
            }
            state.session_id.clone()
        };

        if let Some(id) = cached_id {
            match self.api.get_link_session(&id).await {
                Ok(rows) => {
                    if let Some(record) = rows.into_iter().find(|r| !r.is_stale(now)) {
                        self.adopt(record.clone()).await;
                        return Ok(record);
                    }
                    debug!(session_id = %id, "session no longer usable, minting a new one");
                }
                Err(e) => {
                    warn!(session_id = %id, error = %e, "session refetch failed, minting a new one");
                }
            }
        }

        self.mint().await
    }

    /// Push form values onto the current session, or just touch it when
    /// `form_data` is `None`. Best-effort: failures are logged, never
    /// surfaced, and a store without a session does nothing.
    pub async fn persist(&self, form_data: Option<&FormValues>) {
        let session_id = self.state.read().await.session_id.clone();
        let Some(session_id) = session_id else {
            return;
        };
        if let Err(e) = self.api.update_link_session(&session_id, form_data).await {
            warn!(session_id = %session_id, error = %e, "session update failed");
        }
    }

    /// Flush the session and tell the host the widget is closing. The exit
    /// event is emitted even when the flush fails.
    pub async fn release(&self, host: &dyn HostChannel) {
        self.persist(None).await;
        host.emit(HostEvent::ExitEventLink);
    }

    pub async fn session_id(&self) -> Option<String> {
        self.state.read().await.session_id.clone()
    }

    /// Drop the cached session entirely. The next `ensure` mints.
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        state.session_id = None;
        state.record = None;
    }

    async fn adopt(&self, record: LinkSession) {
        let mut state = self.state.write().await;
        state.session_id = Some(record.session_id.clone());
        state.record = Some(record);
    }
}
