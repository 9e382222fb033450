//! The peer node: shares files, downloads torrents, and seeds what it holds.

mod download;

pub use download::{DownloadReport, DownloadSession, DownloadState};

use crate::error::{BittorrentError, Result};
use crate::seeder::{LocalFiles, SeedingServer, SharedPieceLedger};
use crate::storage::PeerStorage;
use crate::torrent::{
    build_torrent, load_torrent_file, save_torrent_file, torrent_path_for, Metainfo,
};
use crate::tracker::{PeerIdentity, ScrapeResponse, TrackerClient};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Configuration for a peer node
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub peer_id: String,
    pub peer_host: String,
    /// 0 binds an ephemeral port
    pub peer_port: u16,
    pub tracker_url: String,
    pub data_dir: PathBuf,
    /// Pause after an empty peer list or a failed transfer
    pub retry_interval: Duration,
    /// Bound on connecting to and exchanging with one seeder
    pub transfer_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            peer_id: "peer".to_string(),
            peer_host: "127.0.0.1".to_string(),
            peer_port: 0,
            tracker_url: "http://127.0.0.1:8000".to_string(),
            data_dir: PathBuf::from("."),
            retry_interval: Duration::from_secs(5),
            transfer_timeout: Duration::from_secs(30),
        }
    }
}

/// A peer bound to its seeding port
pub struct PeerNode {
    config: NodeConfig,
    identity: PeerIdentity,
    listener: Option<TcpListener>,
    storage: PeerStorage,
    files: LocalFiles,
    ledger: Arc<SharedPieceLedger>,
    tracker: TrackerClient,
}

impl PeerNode {
    /// Bind the seeding port. The identity carries the port actually bound.
    pub async fn bind(config: NodeConfig) -> Result<Self> {
        let listener = TcpListener::bind((config.peer_host.as_str(), config.peer_port)).await?;
        let port = listener.local_addr()?.port();
        let identity = PeerIdentity::new(config.peer_id.clone(), config.peer_host.clone(), port);

        let storage = PeerStorage::new(&config.data_dir, &config.peer_id);
        storage.ensure_dir().await?;
        let tracker = TrackerClient::new(&config.tracker_url)?;

        info!("Peer node {} ready in {}", identity, storage.dir().display());

        Ok(Self {
            config,
            identity,
            listener: Some(listener),
            storage,
            files: LocalFiles::new(),
            ledger: Arc::new(SharedPieceLedger::new()),
            tracker,
        })
    }

    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    pub fn storage(&self) -> &PeerStorage {
        &self.storage
    }

    pub fn files(&self) -> &LocalFiles {
        &self.files
    }

    pub async fn connect(&self) -> Result<()> {
        self.tracker.connect(&self.identity).await?;
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.tracker.disconnect(&self.identity).await?;
        Ok(())
    }

    /// Build a torrent for `path`, keep a copy of the file and its
    /// `.torrent` in the peer directory, and tell the tracker we hold it.
    pub async fn share<P: AsRef<Path>>(&self, path: P) -> Result<Metainfo> {
        let path = path.as_ref();
        let info = build_torrent(path).await?;

        let stored = self.storage.file_path(&info.name)?;
        if !same_file(path, &stored).await {
            fs::copy(path, &stored).await?;
        }

        let metainfo = Metainfo::new(info, self.tracker.announce_url()?);
        save_torrent_file(self.storage.dir(), &metainfo).await?;
        self.publish(&metainfo).await?;

        info!(
            "Sharing {} ({} pieces, info hash {})",
            metainfo.info.name,
            metainfo.info.num_pieces(),
            metainfo.info_hash
        );
        Ok(metainfo)
    }

    /// Re-announce every file in the peer directory that has a `.torrent`.
    pub async fn reshare(&self) -> Result<Vec<Metainfo>> {
        let mut shared = Vec::new();
        for name in self.storage.shared_files().await? {
            let metainfo = load_torrent_file(torrent_path_for(self.storage.dir(), &name)).await?;
            if metainfo.info.name != name {
                warn!("Skipping {}: its torrent describes {}", name, metainfo.info.name);
                continue;
            }
            self.publish(&metainfo).await?;
            shared.push(metainfo);
        }

        info!("Re-shared {} files", shared.len());
        Ok(shared)
    }

    /// Upload the info hash and start serving the file locally.
    pub async fn publish(&self, metainfo: &Metainfo) -> Result<()> {
        self.tracker
            .upload_info(&self.identity, &metainfo.info.name, &metainfo.info_hash)
            .await?;
        self.files.insert(metainfo.info.clone()).await;
        Ok(())
    }

    /// Download the torrent at `torrent_path` into the peer directory.
    ///
    /// The finished file is kept next to a copy of its `.torrent` and can
    /// be served right away.
    pub async fn download<P: AsRef<Path>>(
        &self,
        torrent_path: P,
        cancel: &CancellationToken,
    ) -> Result<DownloadReport> {
        let metainfo = load_torrent_file(torrent_path).await?;
        let mut session = DownloadSession::new(
            metainfo,
            self.identity.clone(),
            self.config.retry_interval,
            self.config.transfer_timeout,
        )?;

        let outcome = match session.run(cancel).await {
            Ok(data) => self.keep_download(session.metainfo(), &data).await,
            Err(e) => Err(e),
        };

        // leave the leechers list whether or not the download finished
        if let Err(e) = session.finish().await {
            warn!("Could not announce end of download: {}", e);
        }

        outcome?;
        Ok(session.report())
    }

    async fn keep_download(&self, metainfo: &Metainfo, data: &[u8]) -> Result<()> {
        self.storage.write_file(&metainfo.info.name, data).await?;
        save_torrent_file(self.storage.dir(), metainfo).await?;
        self.files.insert(metainfo.info.clone()).await;
        Ok(())
    }

    pub async fn scrape(&self, filename: &str) -> Result<ScrapeResponse> {
        self.tracker.scrape(filename).await
    }

    /// The seeding server for this node's port. Available once.
    pub fn seeding_server(&mut self) -> Result<SeedingServer> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| BittorrentError::PeerError("Seeding server already started".to_string()))?;

        Ok(SeedingServer::new(
            listener,
            self.identity.clone(),
            self.storage.clone(),
            self.files.clone(),
            Arc::clone(&self.ledger),
            self.tracker.clone(),
            self.config.transfer_timeout,
        ))
    }

    /// Forget which pieces were sent to `requester`, so it can be served again.
    pub async fn reset_ledger(&self, requester: &PeerIdentity) {
        self.ledger.reset(requester).await;
    }
}

async fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
