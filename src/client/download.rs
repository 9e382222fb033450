use crate::error::{BittorrentError, PieceError, Result};
use crate::peer::{PeerConnection, PeerCursor, PieceRequest};
use crate::piece::ValidatedPieceSet;
use crate::torrent::Metainfo;
use crate::tracker::{AnnouncePhase, PeerIdentity, TrackerClient};
use bytes::Bytes;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where a download currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    DiscoveringPeers,
    TransferringPiece(usize),
    VerifyingPiece(usize),
    Complete,
}

/// Summary of a finished download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub pieces: usize,
    pub bytes: u64,
    /// Attempts that did not yield a verified piece
    pub retries: usize,
}

/// One in-flight download of one torrent.
///
/// Pieces are fetched strictly in index order, each from the next peer in
/// round-robin order. A failed or corrupted attempt retries the same index.
pub struct DownloadSession {
    metainfo: Metainfo,
    identity: PeerIdentity,
    tracker: TrackerClient,
    pieces: ValidatedPieceSet,
    cursor: PeerCursor,
    state: DownloadState,
    retries: usize,
    retry_interval: Duration,
    transfer_timeout: Duration,
}

impl DownloadSession {
    pub fn new(
        metainfo: Metainfo,
        identity: PeerIdentity,
        retry_interval: Duration,
        transfer_timeout: Duration,
    ) -> Result<Self> {
        let tracker = TrackerClient::from_announce(&metainfo.peer_list)?;
        let pieces = ValidatedPieceSet::new(&metainfo.info);

        Ok(Self {
            metainfo,
            identity,
            tracker,
            pieces,
            cursor: PeerCursor::new(),
            state: DownloadState::DiscoveringPeers,
            retries: 0,
            retry_interval,
            transfer_timeout,
        })
    }

    pub fn state(&self) -> DownloadState {
        self.state
    }

    pub fn metainfo(&self) -> &Metainfo {
        &self.metainfo
    }

    pub fn report(&self) -> DownloadReport {
        DownloadReport {
            pieces: self.pieces.piece_count(),
            bytes: self.metainfo.info.length,
            retries: self.retries,
        }
    }

    /// Fetch and verify every piece, then return the reassembled file.
    ///
    /// Runs until all pieces verify, the tracker no longer knows the
    /// torrent or cannot be reached, or `cancel` fires.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let name = self.metainfo.info.name.clone();
        info!(
            "Starting download of {} ({} bytes, {} pieces)",
            name,
            self.metainfo.info.length,
            self.pieces.piece_count()
        );

        self.tracker
            .announce_leeching(
                &self.identity,
                &name,
                &self.metainfo.info_hash,
                AnnouncePhase::Start,
            )
            .await?;

        while let Some(index) = self.pieces.next_missing() {
            if cancel.is_cancelled() {
                return Err(BittorrentError::Cancelled);
            }

            self.state = DownloadState::DiscoveringPeers;
            let peers = self.discover_peers(cancel).await?;
            let Some(peer) = self.cursor.pick(&peers).cloned() else {
                continue;
            };

            self.state = DownloadState::TransferringPiece(index);
            let data = tokio::select! {
                _ = cancel.cancelled() => return Err(BittorrentError::Cancelled),
                fetched = self.fetch_piece(&peer, index) => fetched,
            };

            let data = match data {
                Ok(data) => data,
                Err(e) => {
                    warn!("Piece {} from {} failed: {}. Trying the next peer.", index, peer, e);
                    self.retries += 1;
                    self.pause(cancel).await?;
                    continue;
                }
            };

            let expected = self.pieces.piece_len(index).unwrap_or(0) as usize;
            if data.len() != expected {
                // refused or cut off; wait like any other transport failure
                warn!(
                    "Piece {} from {} came back with {} of {} bytes. Trying the next peer.",
                    index,
                    peer,
                    data.len(),
                    expected
                );
                self.retries += 1;
                self.pause(cancel).await?;
                continue;
            }

            self.state = DownloadState::VerifyingPiece(index);
            match self.pieces.store(index, data) {
                Ok(()) => info!(
                    "Piece {} verified from {} ({:.1}%)",
                    index,
                    peer.peer_id,
                    self.pieces.progress()
                ),
                Err(PieceError::DigestMismatch { .. }) => {
                    warn!("Piece {} from {} is corrupted. Retrying.", index, peer.peer_id);
                    self.retries += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        let data = self.pieces.assemble()?;
        self.state = DownloadState::Complete;
        info!("Download of {} complete ({} retries)", name, self.retries);
        Ok(data)
    }

    /// Tell the tracker this node stopped leeching.
    pub async fn finish(&self) -> Result<()> {
        self.tracker
            .announce_leeching(
                &self.identity,
                &self.metainfo.info.name,
                &self.metainfo.info_hash,
                AnnouncePhase::End,
            )
            .await?;
        Ok(())
    }

    async fn discover_peers(&self, cancel: &CancellationToken) -> Result<Vec<PeerIdentity>> {
        loop {
            let peers = self.tracker.peer_list(&self.metainfo.info_hash).await?;
            if !peers.is_empty() {
                debug!("Tracker returned {} peers", peers.len());
                return Ok(peers);
            }

            warn!(
                "No peers found for {}. Retrying in {:?}.",
                self.metainfo.info_hash, self.retry_interval
            );
            self.pause(cancel).await?;
        }
    }

    async fn fetch_piece(&self, peer: &PeerIdentity, index: usize) -> Result<Bytes> {
        let expected = self.pieces.piece_len(index).unwrap_or(0) as usize;
        let request = PieceRequest::new(index, self.metainfo.info.name.clone(), self.identity.clone());

        let connection = PeerConnection::connect(&peer.addr(), self.transfer_timeout).await?;
        debug!("Requesting piece {} from {}", index, connection.addr());
        connection.fetch_piece(&request, expected).await
    }

    async fn pause(&self, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            _ = cancel.cancelled() => Err(BittorrentError::Cancelled),
            _ = tokio::time::sleep(self.retry_interval) => Ok(()),
        }
    }
}
