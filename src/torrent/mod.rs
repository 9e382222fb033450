mod builder;
mod info_hash;
mod metainfo;
mod piece;

pub use builder::build_torrent;
pub(crate) use builder::build_torrent_with_piece_length;
pub use info_hash::{InfoHash, ParseInfoHashError};
pub use metainfo::{Metainfo, TorrentInfo};
pub use piece::{PieceHash, Pieces, HASH_LEN};

use crate::bencode::{decode, encode};
use crate::error::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Fixed piece size: 256 KiB
pub const PIECE_LENGTH: u64 = 256 * 1024;

/// Suffix of torrent companion files
pub const TORRENT_SUFFIX: &str = ".torrent";

/// Encode a torrent together with its tracker announce URL
pub fn serialize_torrent(metainfo: &Metainfo) -> Vec<u8> {
    encode(&metainfo.to_bencode())
}

/// Parse torrent data from bytes
pub fn parse_torrent(data: &[u8]) -> Result<Metainfo> {
    let value = decode(data)?;
    Metainfo::from_bencode(&value)
}

/// Load and parse a .torrent file
pub async fn load_torrent_file<P: AsRef<Path>>(path: P) -> Result<Metainfo> {
    let data = fs::read(path).await?;
    parse_torrent(&data)
}

/// Write `<name>.torrent` into `dir`, returning its path.
pub async fn save_torrent_file<P: AsRef<Path>>(dir: P, metainfo: &Metainfo) -> Result<PathBuf> {
    let path = torrent_path_for(dir, &metainfo.info.name);
    fs::write(&path, serialize_torrent(metainfo)).await?;
    info!("Torrent file {} written", path.display());
    Ok(path)
}

pub fn torrent_path_for<P: AsRef<Path>>(dir: P, file_name: &str) -> PathBuf {
    dir.as_ref().join(format!("{}{}", file_name, TORRENT_SUFFIX))
}
