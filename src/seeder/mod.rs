//! Serves pieces of locally held files to requesting peers.
//!
//! One accept loop, one task per accepted connection, one request and one
//! answer per connection.

mod ledger;

pub use ledger::SharedPieceLedger;

use crate::error::{BittorrentError, Result};
use crate::peer::{PieceRequest, MAX_REQUEST_LEN};
use crate::storage::PeerStorage;
use crate::torrent::TorrentInfo;
use crate::tracker::{AnnouncePhase, PeerIdentity, TrackerClient};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Files this peer can serve, by name
#[derive(Debug, Clone, Default)]
pub struct LocalFiles {
    files: Arc<RwLock<HashMap<String, TorrentInfo>>>,
}

impl LocalFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, info: TorrentInfo) {
        self.files.write().await.insert(info.name.clone(), info);
    }

    pub async fn get(&self, name: &str) -> Option<TorrentInfo> {
        self.files.read().await.get(name).cloned()
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

/// What happened to one inbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServeOutcome {
    Sent { bytes: usize },
    Duplicate,
    UnknownFile,
    OutOfRange,
    Empty,
}

/// State shared by every connection task
struct Seeder {
    identity: PeerIdentity,
    storage: PeerStorage,
    files: LocalFiles,
    ledger: Arc<SharedPieceLedger>,
    tracker: TrackerClient,
    io_timeout: Duration,
}

pub struct SeedingServer {
    listener: TcpListener,
    seeder: Arc<Seeder>,
}

impl SeedingServer {
    pub fn new(
        listener: TcpListener,
        identity: PeerIdentity,
        storage: PeerStorage,
        files: LocalFiles,
        ledger: Arc<SharedPieceLedger>,
        tracker: TrackerClient,
        io_timeout: Duration,
    ) -> Self {
        Self {
            listener,
            seeder: Arc::new(Seeder {
                identity,
                storage,
                files,
                ledger,
                tracker,
                io_timeout,
            }),
        }
    }

    /// Accept connections until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let addr = self.listener.local_addr()?;
        info!("Seeder listening on {}", addr);

        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            let (socket, remote) = match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let seeder = Arc::clone(&self.seeder);
            tokio::spawn(async move {
                match seeder.handle(socket).await {
                    Ok(outcome) => debug!("Connection from {} done: {:?}", remote, outcome),
                    Err(e) => error!("Error handling client {}: {}", remote, e),
                }
            });
        }

        info!("Seeder on {} stopped", addr);
        Ok(())
    }
}

impl Seeder {
    async fn handle<S>(&self, mut socket: S) -> Result<ServeOutcome>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let line = match self.read_request_line(&mut socket).await? {
            Some(line) => line,
            None => return Ok(ServeOutcome::Empty),
        };
        let request = PieceRequest::parse(&line)?;
        let requester = &request.requester;

        if let Err(e) = self
            .tracker
            .announce_seeding(&self.identity, &request.filename, AnnouncePhase::Start)
            .await
        {
            warn!("Could not announce seeding of {}: {}", request.filename, e);
        }

        let Some(info) = self.files.get(&request.filename).await else {
            warn!("Requested file {} is not shared here", request.filename);
            return Ok(ServeOutcome::UnknownFile);
        };

        if request.piece_index >= info.num_pieces() {
            warn!(
                "Piece index {} is out of range for {}",
                request.piece_index, request.filename
            );
            return Ok(ServeOutcome::OutOfRange);
        }

        if !self
            .ledger
            .try_reserve(requester, &request.filename, request.piece_index)
            .await
        {
            warn!(
                "Piece {} already shared with peer {}. Skipping.",
                request.piece_index, requester.peer_id
            );
            return Ok(ServeOutcome::Duplicate);
        }

        match self.send_piece(&mut socket, &request, &info).await {
            Ok(bytes) => {
                info!(
                    "Sent piece index {} to peer {}",
                    request.piece_index, requester.peer_id
                );
                Ok(ServeOutcome::Sent { bytes })
            }
            Err(e) => {
                self.ledger
                    .release(requester, &request.filename, request.piece_index)
                    .await;
                Err(e)
            }
        }
    }

    async fn read_request_line<S>(&self, socket: &mut S) -> Result<Option<String>>
    where
        S: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(socket.take(MAX_REQUEST_LEN as u64));
        let mut line = String::new();

        let n = timeout(self.io_timeout, reader.read_line(&mut line))
            .await
            .map_err(|_| BittorrentError::PeerError("Timed out reading request".to_string()))??;

        Ok((n > 0).then_some(line))
    }

    async fn send_piece<S>(
        &self,
        socket: &mut S,
        request: &PieceRequest,
        info: &TorrentInfo,
    ) -> Result<usize>
    where
        S: AsyncWrite + Unpin,
    {
        let data = self
            .storage
            .read_piece(&request.filename, request.piece_index, info.piece_length)
            .await?;

        timeout(self.io_timeout, async {
            socket.write_all(&data).await?;
            socket.shutdown().await
        })
        .await
        .map_err(|_| BittorrentError::PeerError("Timed out sending piece".to_string()))??;

        Ok(data.len())
    }
}
