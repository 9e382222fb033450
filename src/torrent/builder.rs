use super::{PieceHash, Pieces, TorrentInfo, PIECE_LENGTH};
use crate::error::{BittorrentError, Result};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};

/// Digest a file in `PIECE_LENGTH` windows and describe it as a torrent.
pub async fn build_torrent<P: AsRef<Path>>(path: P) -> Result<TorrentInfo> {
    build_torrent_with_piece_length(path, PIECE_LENGTH).await
}

pub(crate) async fn build_torrent_with_piece_length<P: AsRef<Path>>(
    path: P,
    piece_length: u64,
) -> Result<TorrentInfo> {
    let path = path.as_ref();

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| BittorrentError::FileNotFound(path.display().to_string()))?
        .to_string();

    let mut file = File::open(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => BittorrentError::FileNotFound(path.display().to_string()),
        _ => BittorrentError::IoError(e),
    })?;

    let mut pieces = Pieces::default();
    let mut window = vec![0u8; piece_length as usize];
    let mut length = 0u64;

    loop {
        let filled = fill_window(&mut file, &mut window).await?;
        if filled == 0 {
            break;
        }

        pieces.push(PieceHash::of(&window[..filled]));
        length += filled as u64;
        debug!("Hashed piece {} ({} bytes)", pieces.len() - 1, filled);

        if filled < window.len() {
            break;
        }
    }

    info!(
        "Built torrent for {}: {} bytes, {} pieces",
        name,
        length,
        pieces.len()
    );

    Ok(TorrentInfo {
        name,
        length,
        piece_length,
        pieces,
    })
}

/// Read until `window` is full or the reader is exhausted.
async fn fill_window<R: AsyncRead + Unpin>(reader: &mut R, window: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < window.len() {
        let n = reader.read(&mut window[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_600_kib_file_has_three_pieces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.bin");
        let data = content(600 * 1024);
        tokio::fs::write(&path, &data).await.unwrap();

        let info = build_torrent(&path).await.unwrap();

        assert_eq!(info.name, "video.bin");
        assert_eq!(info.length, 600 * 1024);
        assert_eq!(info.piece_length, 256 * 1024);
        assert_eq!(info.num_pieces(), 3);
        assert_eq!(info.piece_size(2), Some(88 * 1024));
        assert_eq!(info.pieces.to_bytes().len(), 60);
        assert_eq!(
            info.pieces.get(2),
            Some(&PieceHash::of(&data[512 * 1024..]))
        );
    }

    #[tokio::test]
    async fn test_empty_file_has_no_pieces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        tokio::fs::write(&path, b"").await.unwrap();

        let info = build_torrent(&path).await.unwrap();
        assert_eq!(info.length, 0);
        assert!(info.pieces.is_empty());
    }

    #[tokio::test]
    async fn test_aligned_file_has_no_trailing_piece() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aligned");
        tokio::fs::write(&path, content(8)).await.unwrap();

        let info = build_torrent_with_piece_length(&path, 4).await.unwrap();
        assert_eq!(info.num_pieces(), 2);
        assert_eq!(info.piece_size(1), Some(4));
    }

    #[tokio::test]
    async fn test_identical_content_has_identical_info_hash() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a").join("same.bin");
        let second = dir.path().join("b").join("same.bin");
        for path in [&first, &second] {
            tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
            tokio::fs::write(path, content(300 * 1024)).await.unwrap();
        }

        let a = build_torrent(&first).await.unwrap();
        let b = build_torrent(&second).await.unwrap();
        assert_eq!(a.info_hash(), b.info_hash());
    }

    #[tokio::test]
    async fn test_one_changed_byte_changes_only_its_piece() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("orig");
        let edited = dir.path().join("edit");
        let data = content(12);
        let mut changed = data.clone();
        changed[5] ^= 0xff;
        tokio::fs::write(&original, &data).await.unwrap();
        tokio::fs::write(&edited, &changed).await.unwrap();

        let a = build_torrent_with_piece_length(&original, 4).await.unwrap();
        let b = build_torrent_with_piece_length(&edited, 4).await.unwrap();

        let differing: Vec<usize> = (0..a.num_pieces())
            .filter(|&i| a.pieces.get(i) != b.pieces.get(i))
            .collect();
        assert_eq!(differing, vec![1]);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = build_torrent("/definitely/not/here.bin").await.unwrap_err();
        assert!(matches!(err, BittorrentError::FileNotFound(_)));
    }
}
