use serde::{Deserialize, Serialize};
use std::fmt;

/// A peer's tracker-facing identity: caller-chosen id plus the address it seeds on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerIdentity {
    pub peer_id: String,
    pub peer_host: String,
    pub peer_port: u16,
}

impl PeerIdentity {
    pub fn new(peer_id: impl Into<String>, peer_host: impl Into<String>, peer_port: u16) -> Self {
        Self {
            peer_id: peer_id.into(),
            peer_host: peer_host.into(),
            peer_port,
        }
    }

    /// `host:port`, suitable for `TcpStream::connect`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.peer_host, self.peer_port)
    }

    /// Same endpoint, ignoring the id.
    pub fn same_address(&self, host: &str, port: u16) -> bool {
        self.peer_host == host && self.peer_port == port
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.peer_id, self.peer_host, self.peer_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let peer = PeerIdentity::new("A", "127.0.0.1", 10001);
        let json = serde_json::to_value(&peer).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"peer_id": "A", "peer_host": "127.0.0.1", "peer_port": 10001})
        );
        assert_eq!(peer.addr(), "127.0.0.1:10001");
        assert_eq!(peer.to_string(), "A (127.0.0.1:10001)");
    }
}
