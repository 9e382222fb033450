use super::PieceRequest;
use crate::error::{BittorrentError, Result};
use crate::torrent::PIECE_LENGTH;
use bytes::Bytes;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// One short-lived connection to a seeder: a single request, a single answer
pub struct PeerConnection {
    addr: String,
    stream: TcpStream,
    io_timeout: Duration,
}

impl PeerConnection {
    pub async fn connect(addr: &str, io_timeout: Duration) -> Result<Self> {
        let stream = timeout(io_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| BittorrentError::PeerError(format!("Timed out connecting to {}", addr)))?
            .map_err(|e| BittorrentError::PeerError(format!("Failed to connect to {}: {}", addr, e)))?;

        debug!("Connected to seeder {}", addr);

        Ok(Self {
            addr: addr.to_string(),
            stream,
            io_timeout,
        })
    }

    /// Send the request and read at most `expected_len` bytes of answer.
    ///
    /// A seeder that has nothing to send closes early, so the result may be
    /// shorter; the connection is closed either way.
    pub async fn fetch_piece(mut self, request: &PieceRequest, expected_len: usize) -> Result<Bytes> {
        let addr = self.addr.clone();
        let io_timeout = self.io_timeout;
        let exchange = async {
            self.stream.write_all(&request.to_bytes()).await?;

            let mut data = Vec::with_capacity(expected_len.min(PIECE_LENGTH as usize));
            (&mut self.stream)
                .take(expected_len as u64)
                .read_to_end(&mut data)
                .await?;

            let _ = self.stream.shutdown().await;
            Ok::<_, std::io::Error>(data)
        };

        let data = timeout(io_timeout, exchange)
            .await
            .map_err(|_| BittorrentError::PeerError(format!("Timed out waiting for {}", addr)))?
            .map_err(|e| BittorrentError::PeerError(format!("Transfer from {} failed: {}", addr, e)))?;

        debug!(
            "Received {} of {} bytes for piece {} from {}",
            data.len(),
            expected_len,
            request.piece_index,
            addr
        );

        Ok(Bytes::from(data))
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}
