use crate::tracker::PeerIdentity;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

/// Which pieces of which files have already gone to which requester.
///
/// Only suppresses redundant sends; it never decides correctness. Keyed by
/// the requester's full identity, and every check-and-record happens under
/// one lock so concurrent requests from the same requester serialize.
#[derive(Debug, Default)]
pub struct SharedPieceLedger {
    sent: Mutex<HashMap<PeerIdentity, HashMap<String, HashSet<usize>>>>,
}

impl SharedPieceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the piece as sent; false if it already was.
    pub async fn try_reserve(&self, requester: &PeerIdentity, filename: &str, index: usize) -> bool {
        let mut sent = self.sent.lock().await;
        sent.entry(requester.clone())
            .or_default()
            .entry(filename.to_string())
            .or_default()
            .insert(index)
    }

    /// Undo a reservation whose send failed.
    pub async fn release(&self, requester: &PeerIdentity, filename: &str, index: usize) {
        let mut sent = self.sent.lock().await;
        if let Some(indices) = sent
            .get_mut(requester)
            .and_then(|files| files.get_mut(filename))
        {
            indices.remove(&index);
        }
    }

    /// Forget everything sent to `requester`.
    pub async fn reset(&self, requester: &PeerIdentity) {
        self.sent.lock().await.remove(requester);
    }

    pub async fn sent_count(&self, requester: &PeerIdentity, filename: &str) -> usize {
        self.sent
            .lock()
            .await
            .get(requester)
            .and_then(|files| files.get(filename))
            .map_or(0, HashSet::len)
    }
}
