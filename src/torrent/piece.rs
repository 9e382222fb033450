use crate::error::{BittorrentError, Result};
use sha1::{Digest, Sha1};

/// Length of a SHA1 piece digest.
pub const HASH_LEN: usize = 20;

/// A 20-byte SHA1 digest of one piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PieceHash([u8; HASH_LEN]);

impl PieceHash {
    pub fn new(hash: [u8; HASH_LEN]) -> Self {
        Self(hash)
    }

    /// Digest the given window of file content.
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let hash: [u8; HASH_LEN] = slice.try_into().map_err(|_| {
            BittorrentError::InvalidTorrent("Piece hash must be 20 bytes".to_string())
        })?;
        Ok(Self(hash))
    }

    /// Whether `data` digests to this hash.
    pub fn matches(&self, data: &[u8]) -> bool {
        Self::of(data) == *self
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }
}

impl AsRef<[u8]> for PieceHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Ordered piece digests, as stored in the `pieces` field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pieces {
    hashes: Vec<PieceHash>,
}

impl Pieces {
    /// Split concatenated digests
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() % HASH_LEN != 0 {
            return Err(BittorrentError::InvalidTorrent(
                "Pieces length must be multiple of 20".to_string(),
            ));
        }

        let hashes = data
            .chunks_exact(HASH_LEN)
            .map(PieceHash::from_slice)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { hashes })
    }

    /// Concatenated digests in piece order
    pub fn to_bytes(&self) -> Vec<u8> {
        self.hashes.iter().flat_map(|h| h.0).collect()
    }

    pub fn push(&mut self, hash: PieceHash) {
        self.hashes.push(hash);
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PieceHash> {
        self.hashes.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PieceHash> {
        self.hashes.iter()
    }
}
