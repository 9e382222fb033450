use super::{
    AnnouncePhase, AnnounceRequest, PeerIdentity, PeerListResponse, PeerRequest, ScrapeResponse,
    StatusResponse, UploadInfoRequest,
};
use crate::error::{BittorrentError, Result};
use crate::registry::SwarmRecord;
use crate::torrent::InfoHash;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

/// Path of the peer list endpoint; torrents store it as their announce URL.
pub const PEER_LIST_PATH: &str = "peer_list";

/// Peer-side access to the tracker's JSON API
#[derive(Debug, Clone)]
pub struct TrackerClient {
    client: Client,
    base: Url,
}

impl TrackerClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, base })
    }

    /// Client for the tracker a torrent announces, given its `peer_list` URL.
    pub fn from_announce(peer_list_url: &str) -> Result<Self> {
        let mut url = Url::parse(peer_list_url)?;
        let base_path = url
            .path()
            .strip_suffix(PEER_LIST_PATH)
            .unwrap_or("/")
            .to_string();
        url.set_path(&base_path);
        url.set_query(None);
        Self::new(url.as_str())
    }

    /// The URL written into torrents built against this tracker.
    pub fn announce_url(&self) -> Result<String> {
        Ok(self.base.join(PEER_LIST_PATH)?.to_string())
    }

    pub async fn connect(&self, peer: &PeerIdentity) -> Result<StatusResponse> {
        let request = self.client.post(self.url("connect")?).json(&PeerRequest::from(peer));
        let response: StatusResponse = self.send(request).await?;
        info!("Connected to tracker as {}: {}", peer, response.message);
        Ok(response)
    }

    pub async fn disconnect(&self, peer: &PeerIdentity) -> Result<StatusResponse> {
        let request = self.client.post(self.url("disconnect")?).json(&PeerRequest::from(peer));
        let response: StatusResponse = self.send(request).await?;
        info!("Disconnected {} from tracker", peer);
        Ok(response)
    }

    pub async fn upload_info(
        &self,
        peer: &PeerIdentity,
        filename: &str,
        info_hash: &InfoHash,
    ) -> Result<StatusResponse> {
        let request = self
            .client
            .post(self.url("info_hash")?)
            .json(&UploadInfoRequest::new(peer, filename, info_hash));
        let response: StatusResponse = self.send(request).await?;
        info!("Uploaded info_hash {} for {}", info_hash, filename);
        Ok(response)
    }

    pub async fn peer_list(&self, info_hash: &InfoHash) -> Result<Vec<PeerIdentity>> {
        let request = self
            .client
            .get(self.url(PEER_LIST_PATH)?)
            .query(&[("info_hash", info_hash.to_hex())]);
        let response: PeerListResponse = self.send(request).await?;
        debug!("Peers holding {}: {:?}", info_hash, response.peers);
        Ok(response.peers)
    }

    pub async fn torrent_info(&self, info_hash: &InfoHash) -> Result<SwarmRecord> {
        let request = self
            .client
            .get(self.url("torrent_info")?)
            .query(&[("info_hash", info_hash.to_hex())]);
        self.send(request).await
    }

    pub async fn announce_seeding(
        &self,
        peer: &PeerIdentity,
        filename: &str,
        phase: AnnouncePhase,
    ) -> Result<StatusResponse> {
        let request = self
            .client
            .post(self.url("seeding")?)
            .json(&AnnounceRequest::new(peer, filename, phase));
        self.send(request).await
    }

    /// Leeching is always announced against the exact swarm being downloaded.
    pub async fn announce_leeching(
        &self,
        peer: &PeerIdentity,
        filename: &str,
        info_hash: &InfoHash,
        phase: AnnouncePhase,
    ) -> Result<StatusResponse> {
        let announce = AnnounceRequest::new(peer, filename, phase).with_info_hash(info_hash);
        let request = self.client.post(self.url("leeching")?).json(&announce);
        self.send(request).await
    }

    pub async fn scrape(&self, filename: &str) -> Result<ScrapeResponse> {
        let request = self
            .client
            .get(self.url("scrape")?)
            .query(&[("filename", filename)]);
        self.send(request).await
    }

    fn url(&self, endpoint: &str) -> Result<Url> {
        Ok(self.base.join(endpoint)?)
    }

    /// Send, mapping transport failures and non-2xx answers to errors.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| BittorrentError::TrackerUnreachable(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| BittorrentError::TrackerUnreachable(e.to_string()))?;

        debug!("Tracker response status: {}, body length: {}", status, body.len());

        if !status.is_success() {
            let message = serde_json::from_slice::<StatusResponse>(&body)
                .map(|s| s.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
            return Err(BittorrentError::TrackerError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }
}
