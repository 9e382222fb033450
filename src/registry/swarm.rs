use crate::tracker::PeerIdentity;
use serde::{Deserialize, Serialize};

/// Everything the tracker knows about one torrent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmRecord {
    /// Name given by the first uploader
    pub filename: String,
    /// Every peer that announced possession of the torrent, in arrival order
    pub peers: Vec<PeerIdentity>,
    /// Peers currently serving pieces
    pub seeders: Vec<PeerIdentity>,
    /// Peers currently downloading
    pub leechers: Vec<PeerIdentity>,
}

impl SwarmRecord {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            peers: Vec::new(),
            seeders: Vec::new(),
            leechers: Vec::new(),
        }
    }

    /// Returns false when the identity was already listed.
    pub fn add_peer(&mut self, peer: &PeerIdentity) -> bool {
        insert_unique(&mut self.peers, peer)
    }

    pub fn add_seeder(&mut self, peer: &PeerIdentity) -> bool {
        insert_unique(&mut self.seeders, peer)
    }

    pub fn remove_seeder(&mut self, peer: &PeerIdentity) -> usize {
        remove_all(&mut self.seeders, peer)
    }

    pub fn add_leecher(&mut self, peer: &PeerIdentity) -> bool {
        insert_unique(&mut self.leechers, peer)
    }

    pub fn remove_leecher(&mut self, peer: &PeerIdentity) -> usize {
        remove_all(&mut self.leechers, peer)
    }

    /// Drop the identity from every membership list.
    pub fn purge(&mut self, peer: &PeerIdentity) {
        remove_all(&mut self.peers, peer);
        remove_all(&mut self.seeders, peer);
        remove_all(&mut self.leechers, peer);
    }

    pub fn contains(&self, peer: &PeerIdentity) -> bool {
        self.peers.contains(peer) || self.seeders.contains(peer) || self.leechers.contains(peer)
    }
}

fn insert_unique(list: &mut Vec<PeerIdentity>, peer: &PeerIdentity) -> bool {
    if list.contains(peer) {
        return false;
    }
    list.push(peer.clone());
    true
}

fn remove_all(list: &mut Vec<PeerIdentity>, peer: &PeerIdentity) -> usize {
    let before = list.len();
    list.retain(|p| p != peer);
    before - list.len()
}
