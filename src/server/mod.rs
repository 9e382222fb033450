//! HTTP surface of the tracker.
//!
//! Each handler validates its request schema first, then takes the single
//! registry lock once and runs the whole operation under it.

use crate::error::{RegistryError, Result};
use crate::registry::{Registry, SwarmRecord};
use crate::tracker::{
    AnnounceRequest, FilenameQuery, InfoHashQuery, PeerListResponse, PeerRequest, ScrapeResponse,
    StatusResponse, UploadInfoRequest,
};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Configuration for the tracker process
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

pub type SharedRegistry = Arc<Mutex<Registry>>;

type HandlerResult<T> = std::result::Result<Json<T>, RegistryError>;

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
        let body = StatusResponse::failure(self.status_label(), self.to_string());
        (status, Json(body)).into_response()
    }
}

/// All tracker endpoints over the given registry
pub fn router(registry: SharedRegistry) -> Router {
    Router::new()
        .route("/connect", post(connect))
        .route("/disconnect", post(disconnect))
        .route("/peer_list", get(peer_list))
        .route("/info_hash", post(upload_info_hash))
        .route("/torrent_info", get(torrent_info))
        .route("/seeding", post(seeding))
        .route("/leeching", post(leeching))
        .route("/scrape", get(scrape))
        .with_state(registry)
}

/// A bound, not yet serving, tracker
pub struct TrackerServer {
    listener: TcpListener,
    registry: SharedRegistry,
}

impl TrackerServer {
    pub async fn bind(config: &TrackerConfig) -> Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        Ok(Self {
            listener,
            registry: Arc::new(Mutex::new(Registry::new())),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    /// Serve requests until `shutdown` is cancelled.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let addr = self.listener.local_addr()?;
        info!("Tracker listening on {}", addr);

        axum::serve(self.listener, router(self.registry))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Tracker on {} stopped", addr);
        Ok(())
    }
}

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> std::result::Result<T, RegistryError> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|rejection| {
            warn!("Rejected request body: {}", rejection.body_text());
            RegistryError::InvalidInput(rejection.body_text())
        })
}

fn query<T>(params: std::result::Result<Query<T>, QueryRejection>) -> std::result::Result<T, RegistryError> {
    params
        .map(|Query(inner)| inner)
        .map_err(|rejection| RegistryError::InvalidInput(rejection.body_text()))
}

async fn connect(
    State(registry): State<SharedRegistry>,
    payload: std::result::Result<Json<PeerRequest>, JsonRejection>,
) -> HandlerResult<StatusResponse> {
    let peer = body(payload)?.validate()?;

    let mut registry = registry.lock().await;
    registry.connect(&peer)?;
    let stats = registry.stats();
    debug!(
        "{} peers connected, {} swarms",
        stats.connected_peers, stats.swarms
    );
    Ok(Json(StatusResponse::success(format!(
        "Peer {} registered successfully",
        peer.peer_id
    ))))
}

async fn disconnect(
    State(registry): State<SharedRegistry>,
    payload: std::result::Result<Json<PeerRequest>, JsonRejection>,
) -> HandlerResult<StatusResponse> {
    let peer = body(payload)?.validate()?;

    let mut registry = registry.lock().await;
    registry.disconnect(&peer)?;
    debug!("{} peers still connected", registry.stats().connected_peers);
    Ok(Json(StatusResponse::success("Peer disconnected successfully")))
}

async fn peer_list(
    State(registry): State<SharedRegistry>,
    params: std::result::Result<Query<InfoHashQuery>, QueryRejection>,
) -> HandlerResult<PeerListResponse> {
    let info_hash = query(params)?.validate()?;

    let peers = registry.lock().await.peer_list(&info_hash)?;
    Ok(Json(PeerListResponse::new(peers)))
}

async fn upload_info_hash(
    State(registry): State<SharedRegistry>,
    payload: std::result::Result<Json<UploadInfoRequest>, JsonRejection>,
) -> HandlerResult<StatusResponse> {
    let upload = body(payload)?.validate()?;

    registry.lock().await.upload_info(&upload)?;
    Ok(Json(StatusResponse::success(
        "Torrent info uploaded successfully",
    )))
}

async fn torrent_info(
    State(registry): State<SharedRegistry>,
    params: std::result::Result<Query<InfoHashQuery>, QueryRejection>,
) -> HandlerResult<SwarmRecord> {
    let info_hash = query(params)?.validate()?;

    let swarm = registry.lock().await.torrent_info(&info_hash)?;
    Ok(Json(swarm))
}

async fn seeding(
    State(registry): State<SharedRegistry>,
    payload: std::result::Result<Json<AnnounceRequest>, JsonRejection>,
) -> HandlerResult<StatusResponse> {
    let announce = body(payload)?.validate()?;

    let message = registry.lock().await.announce_seeding(&announce)?;
    Ok(Json(StatusResponse::success(message)))
}

async fn leeching(
    State(registry): State<SharedRegistry>,
    payload: std::result::Result<Json<AnnounceRequest>, JsonRejection>,
) -> HandlerResult<StatusResponse> {
    let announce = body(payload)?.validate()?;

    let message = registry.lock().await.announce_leeching(&announce)?;
    Ok(Json(StatusResponse::success(message)))
}

async fn scrape(
    State(registry): State<SharedRegistry>,
    params: std::result::Result<Query<FilenameQuery>, QueryRejection>,
) -> HandlerResult<ScrapeResponse> {
    let filename = query(params)?.validate()?;

    let scrape = registry.lock().await.scrape(&filename)?;
    Ok(Json(scrape))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::{json, Value};

    /// A tracker on an ephemeral localhost port; stops when the token is cancelled.
    pub(crate) async fn spawn_tracker() -> (String, SharedRegistry, CancellationToken) {
        let config = TrackerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        let server = TrackerServer::bind(&config).await.unwrap();
        let url = format!("http://{}", server.local_addr().unwrap());
        let registry = server.registry();
        let shutdown = CancellationToken::new();
        tokio::spawn(server.serve(shutdown.clone()));
        (url, registry, shutdown)
    }

    async fn post(url: &str, path: &str, body: Value) -> (u16, Value) {
        let response = reqwest::Client::new()
            .post(format!("{}{}", url, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    async fn get(url: &str, path: &str, params: &[(&str, &str)]) -> (u16, Value) {
        let response = reqwest::Client::new()
            .get(format!("{}{}", url, path))
            .query(params)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    fn peer(id: &str, port: u16) -> Value {
        json!({"peer_id": id, "peer_host": "127.0.0.1", "peer_port": port})
    }

    #[tokio::test]
    async fn connect_statuses() {
        let (url, _, shutdown) = spawn_tracker().await;

        let (status, body) = post(&url, "/connect", peer("A", 1000)).await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "success");

        let (status, body) = post(&url, "/connect", peer("A", 2000)).await;
        assert_eq!(status, 400);
        assert_eq!(body["status"], "error");

        let (status, body) = post(&url, "/connect", json!({"peer_id": "B"})).await;
        assert_eq!(status, 400);
        assert_eq!(body["status"], "fail");

        shutdown.cancel();
    }

    #[tokio::test]
    async fn malformed_body_is_client_error() {
        let (url, _, shutdown) = spawn_tracker().await;

        let response = reqwest::Client::new()
            .post(format!("{}/connect", url))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn disconnect_statuses() {
        let (url, registry, shutdown) = spawn_tracker().await;
        post(&url, "/connect", peer("A", 1000)).await;

        let (status, _) = post(&url, "/disconnect", peer("A", 1001)).await;
        assert_eq!(status, 400);

        let (status, _) = post(&url, "/disconnect", peer("Z", 1000)).await;
        assert_eq!(status, 404);

        let (status, _) = post(&url, "/disconnect", peer("A", 1000)).await;
        assert_eq!(status, 200);
        assert_eq!(registry.lock().await.stats().connected_peers, 0);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn swarm_endpoints() {
        let (url, _, shutdown) = spawn_tracker().await;
        let hash = "ab".repeat(20);

        let mut upload = peer("A", 1000);
        upload["filename"] = json!("a.txt");
        upload["info_hash"] = json!(hash);
        let (status, _) = post(&url, "/info_hash", upload).await;
        assert_eq!(status, 200);

        let (status, body) = get(&url, "/peer_list", &[("info_hash", &hash)]).await;
        assert_eq!(status, 200);
        assert_eq!(body["peers"], json!([peer("A", 1000)]));

        let (status, _) = get(&url, "/peer_list", &[("info_hash", &"cd".repeat(20))]).await;
        assert_eq!(status, 404);

        let (status, _) = get(&url, "/torrent_info", &[]).await;
        assert_eq!(status, 400);

        let mut seeding = peer("A", 1000);
        seeding["filename"] = json!("a.txt");
        seeding["flag"] = json!("start");
        let (status, body) = post(&url, "/seeding", seeding).await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "success");

        let (status, body) = get(&url, "/torrent_info", &[("info_hash", &hash)]).await;
        assert_eq!(status, 200);
        assert_eq!(body["filename"], "a.txt");
        assert_eq!(body["seeders"], json!([peer("A", 1000)]));
        assert_eq!(body["leechers"], json!([]));

        let (status, body) = get(&url, "/scrape", &[("filename", "a.txt")]).await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({"seeders": [peer("A", 1000)], "leechers": []}));

        let (status, _) = get(&url, "/scrape", &[]).await;
        assert_eq!(status, 400);

        let (status, _) = post(&url, "/leeching", json!({"filename": "a.txt"})).await;
        assert_eq!(status, 400);

        shutdown.cancel();
    }
}
