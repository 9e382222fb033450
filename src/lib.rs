//! A minimal BitTorrent-style tracker and peer.
//!
//! The tracker keeps a registry of connected peers and of the swarm behind
//! each info hash. Peers build torrents, download them piece by piece with
//! digest verification, and seed what they hold over plain TCP.

pub mod bencode;
pub mod cli;
pub mod client;
pub mod error;
pub mod peer;
pub mod piece;
pub mod registry;
pub mod seeder;
pub mod server;
pub mod storage;
pub mod torrent;
pub mod tracker;

pub use error::{BittorrentError, Result};
