use super::{InfoHash, Pieces, PIECE_LENGTH};
use crate::bencode::{encode, BencodeValue};
use crate::error::{BittorrentError, Result};
use sha1::{Digest, Sha1};

/// The `info` dictionary: everything that identifies the content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentInfo {
    /// File name, also the lookup key on the tracker
    pub name: String,
    /// Total file length in bytes
    pub length: u64,
    /// Bytes per piece (the last piece may be shorter)
    pub piece_length: u64,
    /// One digest per piece, in file order
    pub pieces: Pieces,
}

impl TorrentInfo {
    pub fn num_pieces(&self) -> usize {
        self.pieces.len()
    }

    /// Byte length of piece `index`, `None` past the end.
    pub fn piece_size(&self, index: usize) -> Option<u64> {
        piece_size(self.length, self.piece_length, index)
    }

    pub fn to_bencode(&self) -> BencodeValue {
        BencodeValue::dict()
            .with("name", self.name.as_str())
            .with("length", self.length as i64)
            .with("piece length", self.piece_length as i64)
            .with("pieces", self.pieces.to_bytes())
    }

    /// SHA1 of the encoded info dictionary; the announce URL never takes part.
    pub fn info_hash(&self) -> InfoHash {
        let mut hasher = Sha1::new();
        hasher.update(encode(&self.to_bencode()));
        InfoHash(hasher.finalize().into())
    }

    pub fn from_bencode(value: &BencodeValue) -> Result<Self> {
        if value.as_dict().is_none() {
            return Err(invalid("Info must be a dict"));
        }

        let name = value
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| invalid("Missing 'name' field"))?
            .to_string();

        let length = non_negative(value, "length")?;
        let piece_length = non_negative(value, "piece length")?;
        if piece_length != PIECE_LENGTH {
            return Err(invalid(&format!(
                "'piece length' must be {}, found {}",
                PIECE_LENGTH, piece_length
            )));
        }

        let pieces_bytes = value
            .get("pieces")
            .and_then(|v| v.as_bytes())
            .ok_or_else(|| invalid("Missing 'pieces' field"))?;
        let pieces = Pieces::from_bytes(pieces_bytes)?;

        let expected = num_pieces(length, piece_length);
        if pieces.len() != expected {
            return Err(invalid(&format!(
                "{} bytes in {}-byte pieces needs {} digests, found {}",
                length,
                piece_length,
                expected,
                pieces.len()
            )));
        }

        Ok(TorrentInfo {
            name,
            length,
            piece_length,
            pieces,
        })
    }
}

/// Top-level structure of a `.torrent` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metainfo {
    /// Tracker `/peer_list` endpoint URL
    pub peer_list: String,
    pub info: TorrentInfo,
    pub info_hash: InfoHash,
}

impl Metainfo {
    pub fn new(info: TorrentInfo, peer_list: impl Into<String>) -> Self {
        let info_hash = info.info_hash();
        Self {
            peer_list: peer_list.into(),
            info,
            info_hash,
        }
    }

    pub fn to_bencode(&self) -> BencodeValue {
        BencodeValue::dict()
            .with("peer_list", self.peer_list.as_str())
            .with("info", self.info.to_bencode())
    }

    pub fn from_bencode(value: &BencodeValue) -> Result<Self> {
        if value.as_dict().is_none() {
            return Err(invalid("Torrent must be a dict"));
        }

        let peer_list = value
            .get("peer_list")
            .and_then(|v| v.as_str())
            .ok_or_else(|| invalid("Missing 'peer_list' field"))?;

        let info_value = value
            .get("info")
            .ok_or_else(|| invalid("Missing 'info' field"))?;
        let info = TorrentInfo::from_bencode(info_value)?;

        Ok(Metainfo::new(info, peer_list))
    }

    pub fn info_hash_hex(&self) -> String {
        self.info_hash.to_hex()
    }
}

pub(crate) fn num_pieces(length: u64, piece_length: u64) -> usize {
    length.div_ceil(piece_length) as usize
}

pub(crate) fn piece_size(length: u64, piece_length: u64, index: usize) -> Option<u64> {
    let start = (index as u64).checked_mul(piece_length)?;
    if start >= length {
        return None;
    }
    Some(piece_length.min(length - start))
}

fn non_negative(dict: &BencodeValue, key: &str) -> Result<u64> {
    let value = dict
        .get(key)
        .and_then(|v| v.as_integer())
        .ok_or_else(|| invalid(&format!("Missing '{}' field", key)))?;

    u64::try_from(value).map_err(|_| invalid(&format!("'{}' must not be negative", key)))
}

fn invalid(reason: &str) -> BittorrentError {
    BittorrentError::InvalidTorrent(reason.to_string())
}
