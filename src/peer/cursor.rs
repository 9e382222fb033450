use crate::tracker::PeerIdentity;

/// Round-robin position over the tracker's peer list.
///
/// Lives for a whole download, so consecutive pieces and retries go to
/// successive peers rather than always starting from the first one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerCursor {
    next: usize,
}

impl PeerCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The candidate at the cursor, advancing past it. The list may have
    /// shrunk since the last call; an out-of-range cursor wraps to 0.
    pub fn pick<'a>(&mut self, peers: &'a [PeerIdentity]) -> Option<&'a PeerIdentity> {
        if peers.is_empty() {
            return None;
        }
        if self.next >= peers.len() {
            self.next = 0;
        }

        let candidate = &peers[self.next];
        self.next = (self.next + 1) % peers.len();
        Some(candidate)
    }

    pub fn position(&self) -> usize {
        self.next
    }
}
