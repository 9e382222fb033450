use crate::error::{BittorrentError, Result};
use crate::tracker::PeerIdentity;
use bytes::{BufMut, Bytes, BytesMut};

/// Upper bound on a request line, terminator included.
pub const MAX_REQUEST_LEN: usize = 1024;

/// A leecher's request for one piece of a named file
///
/// Wire format: `piece_index,filename,peer_id,peer_host,peer_port\n`.
/// The filename is everything between the first comma and the last three
/// fields, so names containing commas survive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceRequest {
    pub piece_index: usize,
    pub filename: String,
    pub requester: PeerIdentity,
}

impl PieceRequest {
    pub fn new(piece_index: usize, filename: impl Into<String>, requester: PeerIdentity) -> Self {
        Self {
            piece_index,
            filename: filename.into(),
            requester,
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_slice(self.piece_index.to_string().as_bytes());
        buf.put_u8(b',');
        buf.put_slice(self.filename.as_bytes());
        buf.put_u8(b',');
        buf.put_slice(self.requester.peer_id.as_bytes());
        buf.put_u8(b',');
        buf.put_slice(self.requester.peer_host.as_bytes());
        buf.put_u8(b',');
        buf.put_slice(self.requester.peer_port.to_string().as_bytes());
        buf.put_u8(b'\n');
        buf.freeze()
    }

    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);

        let (index, rest) = line
            .split_once(',')
            .ok_or_else(|| bad_request(line, "missing fields"))?;

        let mut tail = rest.rsplitn(4, ',');
        let port = tail.next();
        let host = tail.next();
        let peer_id = tail.next();
        let filename = tail.next();

        let (Some(filename), Some(peer_id), Some(host), Some(port)) = (filename, peer_id, host, port)
        else {
            return Err(bad_request(line, "missing fields"));
        };

        let piece_index = index
            .trim()
            .parse::<usize>()
            .map_err(|_| bad_request(line, "piece index is not a number"))?;
        let peer_port = port
            .trim()
            .parse::<u16>()
            .map_err(|_| bad_request(line, "port is not a number"))?;

        if filename.is_empty() {
            return Err(bad_request(line, "empty filename"));
        }

        Ok(Self {
            piece_index,
            filename: filename.to_string(),
            requester: PeerIdentity::new(peer_id, host, peer_port),
        })
    }
}

fn bad_request(line: &str, reason: &str) -> BittorrentError {
    BittorrentError::PeerError(format!("Malformed piece request {:?}: {}", line, reason))
}
