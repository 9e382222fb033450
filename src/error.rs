use thiserror::Error;

#[derive(Error, Debug)]
pub enum BittorrentError {
    #[error("Bencode parsing error: {0}")]
    BencodeError(String),

    #[error("Invalid torrent file: {0}")]
    InvalidTorrent(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Tracker responded with {status}: {message}")]
    TrackerError { status: u16, message: String },

    #[error("Tracker unreachable: {0}")]
    TrackerUnreachable(String),

    #[error("Peer connection error: {0}")]
    PeerError(String),

    #[error("Piece validation failed: {0}")]
    PieceError(#[from] PieceError),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Download cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(String),
}

impl BittorrentError {
    /// Whether the tracker answered with 404 for this request.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BittorrentError::TrackerError { status: 404, .. })
    }
}

impl From<url::ParseError> for BittorrentError {
    fn from(err: url::ParseError) -> Self {
        BittorrentError::UrlParseError(err.to_string())
    }
}

/// Failures while filling a piece slot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PieceError {
    #[error("piece index {index} out of range (torrent has {count} pieces)")]
    OutOfRange { index: usize, count: usize },

    #[error("piece {index} failed digest verification ({received} bytes received)")]
    DigestMismatch { index: usize, received: usize },
}

/// Failures of tracker registry operations.
///
/// Every variant is a per-request outcome: the registry is left untouched
/// when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Invalid request: {0}")]
    InvalidInput(String),

    #[error("Peer {peer_id} already connected")]
    AlreadyConnected { peer_id: String },

    #[error("Peer {peer_id} information mismatch")]
    AddressMismatch { peer_id: String },

    #[error("Peer {peer_id} not found")]
    PeerNotFound { peer_id: String },

    #[error("Torrent {info_hash} not found")]
    TorrentNotFound { info_hash: String },

    #[error("No torrent registered for filename {filename}")]
    FilenameNotFound { filename: String },
}

impl RegistryError {
    /// HTTP status code the tracker answers with for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            RegistryError::InvalidInput(_)
            | RegistryError::AlreadyConnected { .. }
            | RegistryError::AddressMismatch { .. } => 400,
            RegistryError::PeerNotFound { .. }
            | RegistryError::TorrentNotFound { .. }
            | RegistryError::FilenameNotFound { .. } => 404,
        }
    }

    /// Malformed requests are reported as `fail`, state conflicts as `error`.
    pub fn status_label(&self) -> &'static str {
        match self {
            RegistryError::InvalidInput(_) => "fail",
            _ => "error",
        }
    }
}

pub type Result<T> = std::result::Result<T, BittorrentError>;
