use crate::error::{BittorrentError, Result};
use crate::torrent::TORRENT_SUFFIX;
use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};

/// A peer's own directory, `<data_dir>/peer_<peer_id>`, holding shared and
/// downloaded files next to their `.torrent` companions
#[derive(Debug, Clone)]
pub struct PeerStorage {
    dir: PathBuf,
}

impl PeerStorage {
    pub fn new<P: AsRef<Path>>(data_dir: P, peer_id: &str) -> Self {
        Self {
            dir: data_dir.as_ref().join(format!("peer_{}", peer_id)),
        }
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a plain file name inside the peer directory.
    pub fn file_path(&self, name: &str) -> Result<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.dir.join(name)),
            _ => Err(BittorrentError::StorageError(format!(
                "{:?} is not a plain file name",
                name
            ))),
        }
    }

    /// Read up to `piece_length` bytes at `index * piece_length`; shorter at end of file.
    pub async fn read_piece(&self, name: &str, index: usize, piece_length: u64) -> Result<Vec<u8>> {
        let path = self.file_path(name)?;
        let offset = (index as u64)
            .checked_mul(piece_length)
            .ok_or_else(|| BittorrentError::StorageError("Piece offset overflow".to_string()))?;

        let mut file = File::open(&path).await?;
        file.seek(SeekFrom::Start(offset)).await?;

        let mut buffer = Vec::with_capacity(piece_length as usize);
        file.take(piece_length).read_to_end(&mut buffer).await?;

        debug!(
            "Read piece {} of {} ({} bytes at offset {})",
            index,
            name,
            buffer.len(),
            offset
        );
        Ok(buffer)
    }

    /// Persist a complete file, replacing any previous copy.
    pub async fn write_file(&self, name: &str, data: &[u8]) -> Result<PathBuf> {
        self.ensure_dir().await?;
        let path = self.file_path(name)?;
        let partial = self.dir.join(format!("{}.part", name));

        fs::write(&partial, data).await?;
        fs::rename(&partial, &path).await?;

        info!("File has been successfully created: {}", path.display());
        Ok(path)
    }

    /// Names of files that have both content and a `.torrent` companion here.
    pub async fn shared_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name
                .to_str()
                .and_then(|n| n.strip_suffix(TORRENT_SUFFIX))
            else {
                continue;
            };
            if fs::metadata(self.dir.join(name)).await.is_ok() {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }
}
