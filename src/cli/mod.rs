use crate::client::{NodeConfig, PeerNode};
use crate::error::Result;
use crate::server::{TrackerConfig, TrackerServer};
use crate::torrent::load_torrent_file;
use crate::tracker::TrackerClient;
use clap::{Parser, Subcommand};
use rand::Rng;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "bittorrent-swarm")]
#[command(about = "A minimal BitTorrent tracker and peer", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tracker
    Tracker {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(short, long, default_value = "8000")]
        port: u16,
    },

    /// Run a peer node
    Peer {
        /// Peer id, unique on the tracker
        #[arg(long)]
        id: String,

        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Seeding port (random in 10000..20000 if omitted)
        #[arg(short, long)]
        port: Option<u16>,

        /// Tracker base URL
        #[arg(short, long, default_value = "http://127.0.0.1:8000")]
        tracker: String,

        /// Directory holding peer_<id>/
        #[arg(short, long, default_value = ".")]
        data_dir: PathBuf,

        /// Seconds to wait before retrying discovery or a failed transfer
        #[arg(long, default_value = "5")]
        retry_interval: u64,

        #[command(subcommand)]
        action: PeerAction,
    },

    /// Show information about a torrent file
    Info {
        /// Path to the .torrent file
        torrent: PathBuf,
    },
}

#[derive(Subcommand)]
enum PeerAction {
    /// Share files and seed them until interrupted
    Share {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Download a torrent
    Download {
        /// Path to the .torrent file
        torrent: PathBuf,

        /// Keep seeding after the download completes
        #[arg(long)]
        seed: bool,
    },

    /// Seed previously shared files from the peer directory
    Seed,

    /// Show seeders and leechers of a file
    Scrape { filename: String },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Tracker { host, port } => {
                let config = TrackerConfig {
                    host: host.clone(),
                    port: *port,
                };
                let server = TrackerServer::bind(&config).await?;
                server.serve(shutdown_on_ctrl_c()).await?;
            }

            Commands::Peer {
                id,
                host,
                port,
                tracker,
                data_dir,
                retry_interval,
                action,
            } => {
                if let PeerAction::Scrape { filename } = action {
                    return scrape(tracker, filename).await;
                }

                let config = NodeConfig {
                    peer_id: id.clone(),
                    peer_host: host.clone(),
                    peer_port: port.unwrap_or_else(|| rand::thread_rng().gen_range(10000..20000)),
                    tracker_url: tracker.clone(),
                    data_dir: data_dir.clone(),
                    retry_interval: Duration::from_secs(*retry_interval),
                    ..NodeConfig::default()
                };
                run_peer(config, action).await?;
            }

            Commands::Info { torrent } => {
                self.show_torrent_info(torrent).await?;
            }
        }

        Ok(())
    }

    async fn show_torrent_info(&self, torrent_path: &Path) -> Result<()> {
        let metainfo = load_torrent_file(torrent_path).await?;

        println!("Torrent Information");
        println!("==================");
        println!("Name: {}", metainfo.info.name);
        println!("Tracker: {}", metainfo.peer_list);
        println!("Total Size: {} bytes", metainfo.info.length);
        println!("Piece Length: {} bytes", metainfo.info.piece_length);
        println!("Number of Pieces: {}", metainfo.info.num_pieces());
        println!("Info Hash: {}", metainfo.info_hash_hex());

        Ok(())
    }
}

async fn scrape(tracker: &str, filename: &str) -> Result<()> {
    let swarm = TrackerClient::new(tracker)?.scrape(filename).await?;

    println!("Seeders of {}:", filename);
    for peer in &swarm.seeders {
        println!("  {}", peer);
    }
    println!("Leechers of {}:", filename);
    for peer in &swarm.leechers {
        println!("  {}", peer);
    }

    Ok(())
}

async fn run_peer(config: NodeConfig, action: &PeerAction) -> Result<()> {
    let mut node = PeerNode::bind(config).await?;
    node.connect().await?;

    let shutdown = shutdown_on_ctrl_c();
    let seeding = spawn_seeding(&mut node, &shutdown)?;

    let outcome = match action {
        PeerAction::Share { files } => share(&node, files, &shutdown).await,
        PeerAction::Download { torrent, seed } => {
            download(&node, torrent, *seed, &shutdown).await
        }
        PeerAction::Seed => seed(&node, &shutdown).await,
        PeerAction::Scrape { .. } => Ok(()),
    };

    shutdown.cancel();
    if let Err(e) = seeding.await {
        warn!("Seeding task ended abnormally: {}", e);
    }

    if let Err(e) = node.disconnect().await {
        warn!("Could not disconnect from tracker: {}", e);
    }

    outcome
}

async fn share(node: &PeerNode, files: &[PathBuf], shutdown: &CancellationToken) -> Result<()> {
    for file in files {
        let metainfo = node.share(file).await?;
        println!(
            "Sharing {} (info hash {})",
            metainfo.info.name,
            metainfo.info_hash_hex()
        );
    }

    info!("Seeding until interrupted");
    shutdown.cancelled().await;
    Ok(())
}

async fn download(
    node: &PeerNode,
    torrent: &Path,
    keep_seeding: bool,
    shutdown: &CancellationToken,
) -> Result<()> {
    let report = node.download(torrent, shutdown).await?;
    println!(
        "Downloaded {} bytes in {} pieces ({} retries)",
        report.bytes, report.pieces, report.retries
    );

    if keep_seeding {
        let metainfo = load_torrent_file(torrent).await?;
        node.publish(&metainfo).await?;
        info!("Seeding until interrupted");
        shutdown.cancelled().await;
    }

    Ok(())
}

async fn seed(node: &PeerNode, shutdown: &CancellationToken) -> Result<()> {
    if node.reshare().await?.is_empty() {
        warn!("No shared files found in {}", node.storage().dir().display());
    }
    for name in node.files().names().await {
        println!("Seeding {}", name);
    }

    shutdown.cancelled().await;
    Ok(())
}

fn spawn_seeding(node: &mut PeerNode, shutdown: &CancellationToken) -> Result<JoinHandle<()>> {
    let server = node.seeding_server()?;
    let shutdown = shutdown.clone();
    Ok(tokio::spawn(async move {
        if let Err(e) = server.run(shutdown).await {
            error!("Seeding server failed: {}", e);
        }
    }))
}

/// A token cancelled on the first ctrl-c.
fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted, shutting down");
                trigger.cancel();
            }
            Err(e) => warn!("Cannot listen for ctrl-c: {}", e),
        }
    });
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_peer_download() {
        let cli = Cli::try_parse_from([
            "bittorrent-swarm",
            "peer",
            "--id",
            "B",
            "--port",
            "12000",
            "download",
            "movie.bin.torrent",
            "--seed",
        ])
        .unwrap();

        match cli.command {
            Commands::Peer {
                id,
                port,
                tracker,
                action: PeerAction::Download { torrent, seed },
                ..
            } => {
                assert_eq!(id, "B");
                assert_eq!(port, Some(12000));
                assert_eq!(tracker, "http://127.0.0.1:8000");
                assert_eq!(torrent, PathBuf::from("movie.bin.torrent"));
                assert!(seed);
            }
            _ => panic!("expected a peer download command"),
        }
    }

    #[test]
    fn test_share_needs_files() {
        assert!(Cli::try_parse_from(["bittorrent-swarm", "peer", "--id", "A", "share"]).is_err());
    }

    #[test]
    fn test_tracker_defaults() {
        let cli = Cli::try_parse_from(["bittorrent-swarm", "tracker"]).unwrap();
        match cli.command {
            Commands::Tracker { host, port } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(port, 8000);
            }
            _ => panic!("expected the tracker command"),
        }
    }
}
