use super::PeerIdentity;
use serde::{Deserialize, Serialize};

pub const STATUS_SUCCESS: &str = "success";

/// `{status, message}` body shared by every endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

impl StatusResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            message: message.into(),
        }
    }

    pub fn failure(status: &str, message: impl Into<String>) -> Self {
        Self {
            status: status.to_string(),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

/// Body of a successful `/peer_list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerListResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    pub peers: Vec<PeerIdentity>,
}

impl PeerListResponse {
    pub fn new(peers: Vec<PeerIdentity>) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            message: "Peer data retrieved".to_string(),
            peers,
        }
    }
}

/// Body of a successful `/scrape`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeResponse {
    pub seeders: Vec<PeerIdentity>,
    pub leechers: Vec<PeerIdentity>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_body_parses_without_extra_fields() {
        let body: StatusResponse =
            serde_json::from_str(r#"{"status":"error","message":"Peer already connected"}"#).unwrap();
        assert!(!body.is_success());
        assert_eq!(body.message, "Peer already connected");
    }

    #[test]
    fn test_scrape_shape() {
        let scrape = ScrapeResponse {
            seeders: vec![PeerIdentity::new("A", "h1", 1000)],
            leechers: vec![],
        };
        let json = serde_json::to_value(&scrape).unwrap();
        assert_eq!(json["leechers"], serde_json::json!([]));
        assert_eq!(json["seeders"][0]["peer_id"], "A");
    }
}
