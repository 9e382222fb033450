//! Tracker wire schemas and the peer-side tracker client.

mod client;
mod peer;
mod request;
mod response;

pub use client::{TrackerClient, PEER_LIST_PATH};
pub use peer::PeerIdentity;
pub use request::{
    Announce, AnnouncePhase, AnnounceRequest, FilenameQuery, InfoHashQuery, PeerRequest,
    UploadInfo, UploadInfoRequest,
};
pub use response::{PeerListResponse, ScrapeResponse, StatusResponse, STATUS_SUCCESS};
