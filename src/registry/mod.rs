//! Tracker state: the peer directory and one swarm record per info hash.
//!
//! `Registry` is a plain single-owner state object. It performs no locking
//! of its own; the HTTP layer wraps it in one mutex and runs each request
//! as a complete critical section. Every operation validates before it
//! mutates, so a failed call leaves the registry unchanged.

mod swarm;

pub use swarm::SwarmRecord;

use crate::error::RegistryError;
use crate::torrent::InfoHash;
use crate::tracker::{Announce, AnnouncePhase, PeerIdentity, ScrapeResponse, UploadInfo};
use std::collections::HashMap;
use tracing::{debug, info};

type Result<T> = std::result::Result<T, RegistryError>;

/// Counters for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub connected_peers: usize,
    pub swarms: usize,
}

#[derive(Debug, Default)]
pub struct Registry {
    /// peer_id -> (host, port) of currently connected peers
    directory: HashMap<String, (String, u16)>,
    swarms: HashMap<InfoHash, SwarmRecord>,
    /// Swarm creation order; filename lookups resolve to the earliest match.
    created: Vec<InfoHash>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer; its id must not be in use.
    pub fn connect(&mut self, peer: &PeerIdentity) -> Result<()> {
        check_identity(peer)?;

        if self.directory.contains_key(&peer.peer_id) {
            return Err(RegistryError::AlreadyConnected {
                peer_id: peer.peer_id.clone(),
            });
        }

        self.directory.insert(
            peer.peer_id.clone(),
            (peer.peer_host.clone(), peer.peer_port),
        );
        info!("Peer {} registered: {}", peer.peer_id, peer.addr());
        Ok(())
    }

    /// Remove a peer and purge it from every swarm.
    ///
    /// The caller must present the address it registered with.
    pub fn disconnect(&mut self, peer: &PeerIdentity) -> Result<()> {
        let (host, port) =
            self.directory
                .get(&peer.peer_id)
                .ok_or_else(|| RegistryError::PeerNotFound {
                    peer_id: peer.peer_id.clone(),
                })?;

        if !peer.same_address(host, *port) {
            return Err(RegistryError::AddressMismatch {
                peer_id: peer.peer_id.clone(),
            });
        }

        self.directory.remove(&peer.peer_id);
        for swarm in self.swarms.values_mut() {
            swarm.purge(peer);
        }

        info!("Peer {} disconnected: {}", peer.peer_id, peer.addr());
        Ok(())
    }

    /// Record that a peer holds the torrent, creating its swarm on first upload.
    pub fn upload_info(&mut self, upload: &UploadInfo) -> Result<()> {
        check_identity(&upload.peer)?;
        if upload.filename.is_empty() {
            return Err(RegistryError::InvalidInput("filename is required".to_string()));
        }

        let created = &mut self.created;
        let swarm = self.swarms.entry(upload.info_hash).or_insert_with(|| {
            created.push(upload.info_hash);
            SwarmRecord::new(upload.filename.clone())
        });

        if !swarm.add_peer(&upload.peer) {
            debug!(
                "Peer {} already listed for {}",
                upload.peer.peer_id, upload.info_hash
            );
        }

        info!(
            "Received info_hash {} for file {} from peer {}",
            upload.info_hash, upload.filename, upload.peer.peer_id
        );
        Ok(())
    }

    pub fn peer_list(&self, info_hash: &InfoHash) -> Result<Vec<PeerIdentity>> {
        self.swarm(info_hash).map(|swarm| swarm.peers.clone())
    }

    pub fn torrent_info(&self, info_hash: &InfoHash) -> Result<SwarmRecord> {
        self.swarm(info_hash).cloned()
    }

    /// Add or remove a seeder; returns a human-readable confirmation.
    pub fn announce_seeding(&mut self, announce: &Announce) -> Result<String> {
        let swarm = self.resolve_mut(&announce.filename, announce.info_hash.as_ref())?;
        let peer = &announce.peer;

        match announce.phase {
            AnnouncePhase::Start => {
                swarm.add_seeder(peer);
                Ok(format!("Peer {} is seeding {}", peer, announce.filename))
            }
            AnnouncePhase::End => {
                swarm.remove_seeder(peer);
                info!("Peer {} stop seeding.", peer);
                Ok(format!("Peer {} stop seeding {}", peer, announce.filename))
            }
        }
    }

    pub fn announce_leeching(&mut self, announce: &Announce) -> Result<String> {
        let swarm = self.resolve_mut(&announce.filename, announce.info_hash.as_ref())?;
        let peer = &announce.peer;

        match announce.phase {
            AnnouncePhase::Start => {
                swarm.add_leecher(peer);
                Ok(format!("Peer {} is downloading {}", peer, announce.filename))
            }
            AnnouncePhase::End => {
                swarm.remove_leecher(peer);
                info!("Peer {} stop downloading.", peer);
                Ok(format!("Peer {} stop downloading {}", peer, announce.filename))
            }
        }
    }

    /// Current seeders and leechers of the first swarm registered under `filename`.
    pub fn scrape(&self, filename: &str) -> Result<ScrapeResponse> {
        let swarm = self
            .created
            .iter()
            .filter_map(|hash| self.swarms.get(hash))
            .find(|swarm| swarm.filename == filename)
            .ok_or_else(|| RegistryError::FilenameNotFound {
                filename: filename.to_string(),
            })?;

        Ok(ScrapeResponse {
            seeders: swarm.seeders.clone(),
            leechers: swarm.leechers.clone(),
        })
    }

    /// The address a connected peer registered with.
    pub fn directory_entry(&self, peer_id: &str) -> Option<(&str, u16)> {
        self.directory
            .get(peer_id)
            .map(|(host, port)| (host.as_str(), *port))
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            connected_peers: self.directory.len(),
            swarms: self.swarms.len(),
        }
    }

    fn swarm(&self, info_hash: &InfoHash) -> Result<&SwarmRecord> {
        self.swarms
            .get(info_hash)
            .ok_or_else(|| RegistryError::TorrentNotFound {
                info_hash: info_hash.to_hex(),
            })
    }

    /// The pinned swarm when an info hash is given, else the earliest swarm
    /// created under `filename`.
    fn resolve_mut(
        &mut self,
        filename: &str,
        info_hash: Option<&InfoHash>,
    ) -> Result<&mut SwarmRecord> {
        let hash = match info_hash {
            Some(hash) => {
                let swarm = self.swarm(hash)?;
                if swarm.filename != filename {
                    return Err(RegistryError::InvalidInput(format!(
                        "info_hash {} is registered as {}, not {}",
                        hash, swarm.filename, filename
                    )));
                }
                *hash
            }
            None => self
                .created
                .iter()
                .copied()
                .find(|hash| {
                    self.swarms
                        .get(hash)
                        .is_some_and(|swarm| swarm.filename == filename)
                })
                .ok_or_else(|| RegistryError::FilenameNotFound {
                    filename: filename.to_string(),
                })?,
        };

        self.swarms
            .get_mut(&hash)
            .ok_or_else(|| RegistryError::TorrentNotFound {
                info_hash: hash.to_hex(),
            })
    }
}

fn check_identity(peer: &PeerIdentity) -> Result<()> {
    if peer.peer_id.is_empty() || peer.peer_host.is_empty() || peer.peer_port == 0 {
        return Err(RegistryError::InvalidInput("Invalid peer data".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: &str, port: u16) -> PeerIdentity {
        PeerIdentity::new(id, "127.0.0.1", port)
    }

    fn upload(peer: &PeerIdentity, filename: &str, hash: u8) -> UploadInfo {
        UploadInfo {
            peer: peer.clone(),
            filename: filename.to_string(),
            info_hash: InfoHash([hash; 20]),
        }
    }

    fn announce(peer: &PeerIdentity, filename: &str, phase: AnnouncePhase) -> Announce {
        Announce {
            filename: filename.to_string(),
            peer: peer.clone(),
            phase,
            info_hash: None,
        }
    }

    #[test]
    fn second_connect_with_same_id_conflicts() {
        let mut registry = Registry::new();
        registry
            .connect(&PeerIdentity::new("A", "h1", 1000))
            .unwrap();

        let err = registry
            .connect(&PeerIdentity::new("A", "h2", 2000))
            .unwrap_err();

        assert_eq!(
            err,
            RegistryError::AlreadyConnected {
                peer_id: "A".to_string()
            }
        );
        assert_eq!(registry.directory_entry("A"), Some(("h1", 1000)));
    }

    #[test]
    fn connect_rejects_empty_fields() {
        let mut registry = Registry::new();
        assert!(matches!(
            registry.connect(&PeerIdentity::new("", "h1", 1000)),
            Err(RegistryError::InvalidInput(_))
        ));
        assert!(matches!(
            registry.connect(&PeerIdentity::new("A", "h1", 0)),
            Err(RegistryError::InvalidInput(_))
        ));
        assert_eq!(registry.stats().connected_peers, 0);
    }

    #[test]
    fn id_is_reusable_after_disconnect() {
        let mut registry = Registry::new();
        let first = PeerIdentity::new("A", "h1", 1000);
        registry.connect(&first).unwrap();
        registry.disconnect(&first).unwrap();

        registry.connect(&PeerIdentity::new("A", "h2", 2000)).unwrap();
        assert_eq!(registry.directory_entry("A"), Some(("h2", 2000)));
    }

    #[test]
    fn disconnect_requires_matching_address() {
        let mut registry = Registry::new();
        registry.connect(&PeerIdentity::new("A", "h1", 1000)).unwrap();

        let err = registry
            .disconnect(&PeerIdentity::new("A", "h1", 1001))
            .unwrap_err();
        assert!(matches!(err, RegistryError::AddressMismatch { .. }));
        assert_eq!(registry.directory_entry("A"), Some(("h1", 1000)));

        let err = registry
            .disconnect(&PeerIdentity::new("B", "h1", 1000))
            .unwrap_err();
        assert!(matches!(err, RegistryError::PeerNotFound { .. }));
    }

    #[test]
    fn disconnect_purges_swarm_membership() {
        let mut registry = Registry::new();
        let a = peer("A", 1000);
        let b = peer("B", 2000);
        for p in [&a, &b] {
            registry.connect(p).unwrap();
            registry.upload_info(&upload(p, "a.txt", 1)).unwrap();
            registry.upload_info(&upload(p, "b.txt", 2)).unwrap();
            registry
                .announce_seeding(&announce(p, "a.txt", AnnouncePhase::Start))
                .unwrap();
            registry
                .announce_leeching(&announce(p, "b.txt", AnnouncePhase::Start))
                .unwrap();
        }

        registry.disconnect(&a).unwrap();

        for hash in [1u8, 2] {
            let swarm = registry.torrent_info(&InfoHash([hash; 20])).unwrap();
            assert!(!swarm.contains(&a));
            assert!(swarm.contains(&b));
        }
    }

    #[test]
    fn first_uploader_names_the_swarm() {
        let mut registry = Registry::new();
        registry.upload_info(&upload(&peer("A", 1000), "a.txt", 1)).unwrap();
        registry.upload_info(&upload(&peer("B", 2000), "renamed.txt", 1)).unwrap();

        let swarm = registry.torrent_info(&InfoHash([1; 20])).unwrap();
        assert_eq!(swarm.filename, "a.txt");
        assert_eq!(swarm.peers, vec![peer("A", 1000), peer("B", 2000)]);
    }

    #[test]
    fn repeated_upload_does_not_duplicate_peer() {
        let mut registry = Registry::new();
        let a = peer("A", 1000);
        registry.upload_info(&upload(&a, "a.txt", 1)).unwrap();
        registry.upload_info(&upload(&a, "a.txt", 1)).unwrap();

        assert_eq!(registry.peer_list(&InfoHash([1; 20])).unwrap(), vec![a]);
    }

    #[test]
    fn unknown_info_hash_is_not_found() {
        let registry = Registry::new();
        assert!(matches!(
            registry.peer_list(&InfoHash([9; 20])),
            Err(RegistryError::TorrentNotFound { .. })
        ));
        assert!(matches!(
            registry.torrent_info(&InfoHash([9; 20])),
            Err(RegistryError::TorrentNotFound { .. })
        ));
    }

    #[test]
    fn repeated_seeding_start_is_idempotent() {
        let mut registry = Registry::new();
        let a = peer("A", 1000);
        registry.upload_info(&upload(&a, "a.txt", 1)).unwrap();

        for _ in 0..3 {
            registry
                .announce_seeding(&announce(&a, "a.txt", AnnouncePhase::Start))
                .unwrap();
        }
        assert_eq!(registry.scrape("a.txt").unwrap().seeders.len(), 1);

        registry
            .announce_seeding(&announce(&a, "a.txt", AnnouncePhase::End))
            .unwrap();
        assert!(registry.scrape("a.txt").unwrap().seeders.is_empty());
    }

    #[test]
    fn scrape_reports_one_seeder_and_no_leechers() {
        let mut registry = Registry::new();
        let a = peer("A", 1000);
        registry.upload_info(&upload(&a, "a.txt", 1)).unwrap();
        registry
            .announce_seeding(&announce(&a, "a.txt", AnnouncePhase::Start))
            .unwrap();

        let scrape = registry.scrape("a.txt").unwrap();
        assert_eq!(scrape.seeders, vec![a]);
        assert!(scrape.leechers.is_empty());
    }

    #[test]
    fn peer_may_seed_and_leech_at_once() {
        let mut registry = Registry::new();
        let a = peer("A", 1000);
        registry.upload_info(&upload(&a, "a.txt", 1)).unwrap();
        registry
            .announce_seeding(&announce(&a, "a.txt", AnnouncePhase::Start))
            .unwrap();
        registry
            .announce_leeching(&announce(&a, "a.txt", AnnouncePhase::Start))
            .unwrap();

        let scrape = registry.scrape("a.txt").unwrap();
        assert_eq!(scrape.seeders.len(), 1);
        assert_eq!(scrape.leechers.len(), 1);
    }

    #[test]
    fn filename_resolves_to_earliest_swarm() {
        let mut registry = Registry::new();
        let a = peer("A", 1000);
        // created first despite the larger hash
        registry.upload_info(&upload(&a, "dup.txt", 9)).unwrap();
        registry.upload_info(&upload(&a, "dup.txt", 1)).unwrap();

        registry
            .announce_seeding(&announce(&a, "dup.txt", AnnouncePhase::Start))
            .unwrap();

        assert_eq!(registry.torrent_info(&InfoHash([9; 20])).unwrap().seeders.len(), 1);
        assert!(registry.torrent_info(&InfoHash([1; 20])).unwrap().seeders.is_empty());
    }

    #[test]
    fn info_hash_pins_the_announced_swarm() {
        let mut registry = Registry::new();
        let a = peer("A", 1000);
        registry.upload_info(&upload(&a, "dup.txt", 9)).unwrap();
        registry.upload_info(&upload(&a, "dup.txt", 1)).unwrap();

        let mut pinned = announce(&a, "dup.txt", AnnouncePhase::Start);
        pinned.info_hash = Some(InfoHash([1; 20]));
        registry.announce_leeching(&pinned).unwrap();

        assert_eq!(registry.torrent_info(&InfoHash([1; 20])).unwrap().leechers.len(), 1);
        assert!(registry.torrent_info(&InfoHash([9; 20])).unwrap().leechers.is_empty());

        pinned.filename = "other.txt".to_string();
        assert!(matches!(
            registry.announce_leeching(&pinned),
            Err(RegistryError::InvalidInput(_))
        ));
    }

    #[test]
    fn announce_for_unknown_filename_fails() {
        let mut registry = Registry::new();
        let err = registry
            .announce_seeding(&announce(&peer("A", 1000), "ghost.txt", AnnouncePhase::Start))
            .unwrap_err();
        assert!(matches!(err, RegistryError::FilenameNotFound { .. }));
        assert!(matches!(
            registry.scrape("ghost.txt"),
            Err(RegistryError::FilenameNotFound { .. })
        ));
    }

    #[test]
    fn directory_holds_one_address_per_id() {
        let mut registry = Registry::new();
        let ops: &[(bool, &str, &str, u16)] = &[
            (true, "A", "h1", 1),
            (true, "A", "h2", 2),
            (false, "A", "h2", 2),
            (true, "B", "h3", 3),
            (false, "A", "h1", 1),
            (true, "A", "h2", 2),
            (true, "A", "h1", 1),
        ];

        for &(connect, id, host, port) in ops {
            let p = PeerIdentity::new(id, host, port);
            let _ = if connect {
                registry.connect(&p)
            } else {
                registry.disconnect(&p)
            };
        }

        assert_eq!(registry.directory_entry("A"), Some(("h2", 2)));
        assert_eq!(registry.directory_entry("B"), Some(("h3", 3)));
        assert_eq!(registry.stats().connected_peers, 2);
    }
}
