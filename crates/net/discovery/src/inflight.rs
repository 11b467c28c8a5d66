//! Correlation of outstanding discovery requests.

use std::collections::HashMap;

use cloak_net_primitives::{MessageId, Millis};
use parking_lot::Mutex;

/// Send times of discovery requests still awaiting a response.
///
/// An entry lives from the send until either the matching response or the
/// next discovery tick, which sweeps everything left as timed out.
#[derive(Debug, Default)]
pub struct InFlightTracker {
    sent: Mutex<HashMap<MessageId, Millis>>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, id: MessageId, sent_at: Millis) {
        self.sent.lock().insert(id, sent_at);
    }

    /// Remove `id` and return the round trip, if it was tracked.
    pub fn complete(&self, id: &MessageId, now: Millis) -> Option<Millis> {
        self.sent
            .lock()
            .remove(id)
            .map(|sent_at| now.saturating_sub(sent_at))
    }

    /// Forget `id` without measuring it. Safe to call twice.
    pub fn remove(&self, id: &MessageId) -> bool {
        self.sent.lock().remove(id).is_some()
    }

    /// Drop every outstanding entry, returning how many there were.
    pub fn sweep(&self) -> usize {
        let mut sent = self.sent.lock();
        let count = sent.len();
        sent.clear();
        count
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.sent.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
