//! Request bodies and query strings of the tracker HTTP surface.
//!
//! Every field is optional at the serde level so that a missing field is
//! reported as an `InvalidInput` registry error (HTTP 400) by `validate`,
//! before the registry lock is ever taken.

use super::PeerIdentity;
use crate::error::RegistryError;
use crate::torrent::InfoHash;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `start` or `end` of a seeding/leeching activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnouncePhase {
    Start,
    End,
}

impl AnnouncePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnouncePhase::Start => "start",
            AnnouncePhase::End => "end",
        }
    }
}

impl fmt::Display for AnnouncePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnnouncePhase {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(AnnouncePhase::Start),
            "end" => Ok(AnnouncePhase::End),
            other => Err(RegistryError::InvalidInput(format!(
                "flag must be 'start' or 'end', got {:?}",
                other
            ))),
        }
    }
}

/// Body of `/connect` and `/disconnect`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeerRequest {
    pub peer_id: Option<String>,
    pub peer_host: Option<String>,
    pub peer_port: Option<u16>,
}

impl PeerRequest {
    pub fn validate(self) -> Result<PeerIdentity, RegistryError> {
        identity(self.peer_id, self.peer_host, self.peer_port)
    }
}

impl From<&PeerIdentity> for PeerRequest {
    fn from(peer: &PeerIdentity) -> Self {
        Self {
            peer_id: Some(peer.peer_id.clone()),
            peer_host: Some(peer.peer_host.clone()),
            peer_port: Some(peer.peer_port),
        }
    }
}

/// Body of `/info_hash`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadInfoRequest {
    pub peer_id: Option<String>,
    pub peer_host: Option<String>,
    pub peer_port: Option<u16>,
    pub filename: Option<String>,
    pub info_hash: Option<String>,
}

/// A validated `/info_hash` upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadInfo {
    pub peer: PeerIdentity,
    pub filename: String,
    pub info_hash: InfoHash,
}

impl UploadInfoRequest {
    pub fn new(peer: &PeerIdentity, filename: &str, info_hash: &InfoHash) -> Self {
        Self {
            peer_id: Some(peer.peer_id.clone()),
            peer_host: Some(peer.peer_host.clone()),
            peer_port: Some(peer.peer_port),
            filename: Some(filename.to_string()),
            info_hash: Some(info_hash.to_hex()),
        }
    }

    pub fn validate(self) -> Result<UploadInfo, RegistryError> {
        let peer = identity(self.peer_id, self.peer_host, self.peer_port)?;
        let filename = required(self.filename, "filename")?;
        let info_hash = parse_info_hash(required(self.info_hash, "info_hash")?)?;
        Ok(UploadInfo {
            peer,
            filename,
            info_hash,
        })
    }
}

/// Body of `/seeding` and `/leeching`
///
/// `info_hash` is an optional extension that pins the swarm when several
/// torrents share a filename.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnounceRequest {
    pub filename: Option<String>,
    pub peer_id: Option<String>,
    pub peer_host: Option<String>,
    pub peer_port: Option<u16>,
    pub flag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
}

/// A validated seeding/leeching announcement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announce {
    pub filename: String,
    pub peer: PeerIdentity,
    pub phase: AnnouncePhase,
    pub info_hash: Option<InfoHash>,
}

impl AnnounceRequest {
    pub fn new(peer: &PeerIdentity, filename: &str, phase: AnnouncePhase) -> Self {
        Self {
            filename: Some(filename.to_string()),
            peer_id: Some(peer.peer_id.clone()),
            peer_host: Some(peer.peer_host.clone()),
            peer_port: Some(peer.peer_port),
            flag: Some(phase.as_str().to_string()),
            info_hash: None,
        }
    }

    pub fn with_info_hash(mut self, info_hash: &InfoHash) -> Self {
        self.info_hash = Some(info_hash.to_hex());
        self
    }

    pub fn validate(self) -> Result<Announce, RegistryError> {
        let filename = required(self.filename, "filename")?;
        let peer = identity(self.peer_id, self.peer_host, self.peer_port)?;
        let phase = required(self.flag, "flag")?.parse()?;
        let info_hash = self.info_hash.map(parse_info_hash).transpose()?;
        Ok(Announce {
            filename,
            peer,
            phase,
            info_hash,
        })
    }
}

/// Query string of `/peer_list` and `/torrent_info`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfoHashQuery {
    pub info_hash: Option<String>,
}

impl InfoHashQuery {
    pub fn validate(self) -> Result<InfoHash, RegistryError> {
        parse_info_hash(required(self.info_hash, "info_hash")?)
    }
}

/// Query string of `/scrape`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilenameQuery {
    pub filename: Option<String>,
}

impl FilenameQuery {
    pub fn validate(self) -> Result<String, RegistryError> {
        required(self.filename, "filename")
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, RegistryError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RegistryError::InvalidInput(format!("{} is required", field)))
}

fn identity(
    peer_id: Option<String>,
    peer_host: Option<String>,
    peer_port: Option<u16>,
) -> Result<PeerIdentity, RegistryError> {
    let peer_id = required(peer_id, "peer_id")?;
    let peer_host = required(peer_host, "peer_host")?;
    let peer_port = peer_port
        .filter(|&p| p != 0)
        .ok_or_else(|| RegistryError::InvalidInput("peer_port is required".to_string()))?;
    Ok(PeerIdentity {
        peer_id,
        peer_host,
        peer_port,
    })
}

fn parse_info_hash(text: String) -> Result<InfoHash, RegistryError> {
    text.parse()
        .map_err(|e: crate::torrent::ParseInfoHashError| RegistryError::InvalidInput(e.to_string()))
}
