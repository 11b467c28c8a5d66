//! Lazily opened transport sessions keyed by alias.

use std::collections::HashMap;
use std::sync::Arc;

use cloak_net_transport::{TransportError, TransportProvider, TransportSession};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Alias of the session used for discovery and application sends.
pub const DEFAULT_SESSION: &str = "default";

pub(crate) struct SessionCache {
    sessions: Mutex<HashMap<String, Arc<dyn TransportSession>>>,
    // Serializes opening so concurrent callers share one session per alias.
    opening: tokio::sync::Mutex<()>,
}

impl SessionCache {
    pub(crate) fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            opening: tokio::sync::Mutex::new(()),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// The session for `alias`, opened and connected on first use.
    pub(crate) async fn get_or_open<T: TransportProvider>(
        &self,
        transport: &T,
        alias: &str,
    ) -> Result<Arc<dyn TransportSession>, TransportError> {
        if let Some(session) = self.get(alias) {
            return Ok(session);
        }

        let _opening = self.opening.lock().await;
        if let Some(session) = self.get(alias) {
            return Ok(session);
        }

        let session = transport.new_session();
        session.open(alias).await?;
        session.connect().await?;
        debug!(alias, "session established");

        self.sessions
            .lock()
            .insert(alias.to_owned(), Arc::clone(&session));
        Ok(session)
    }

    /// Forget a session the transport reported closed.
    pub(crate) fn evict(&self, alias: &str) -> bool {
        self.sessions.lock().remove(alias).is_some()
    }

    /// Disconnect and close every session.
    pub(crate) async fn close_all(&self) {
        let sessions: Vec<_> = self.sessions.lock().drain().collect();
        for (alias, session) in sessions {
            if let Err(err) = session.disconnect().await {
                debug!(%alias, %err, "disconnect failed");
            }
            if let Err(err) = session.close().await {
                warn!(%alias, %err, "failed to close session");
            }
        }
    }

    fn get(&self, alias: &str) -> Option<Arc<dyn TransportSession>> {
        self.sessions.lock().get(alias).cloned()
    }
}
