use crate::app::settings::{Settings, SettingsStore};
use crate::game::room::Room;
use crate::transport::ws_session::handle_socket;
use axum::{
    extract::{State, WebSocketUpgrade},
    http::Method,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::env;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

const DEFAULT_PORT: u16 = 8080;

#[derive(Clone)]
struct ArenaState {
    room: Arc<Room>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
    sessions: usize,
}

pub fn router(room: Arc<Room>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    Router::new()
        .route("/api/health", get(health))
        .route("/ws", get(ws_handler))
        .route("/", get(ws_handler))
        .layer(cors)
        .with_state(ArenaState { room })
}

/// Serves the arena on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    room: Arc<Room>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = router(room);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

pub async fn run() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    tracing::info!(
        world_size = settings.world_size,
        food_count = settings.food_count,
        update_rate = settings.multiplayer.update_rate,
        "settings loaded"
    );
    let room = Arc::new(Room::new(SettingsStore::new(settings)));

    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let address = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&address).await?;
    tracing::info!("arena listening on {address}");

    serve(listener, room, shutdown_signal()).await?;
    tracing::info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ArenaState>) -> impl IntoResponse {
    let room = Arc::clone(&state.room);
    ws.on_upgrade(move |socket| handle_socket(socket, room))
}

async fn health(State(state): State<ArenaState>) -> impl IntoResponse {
    Json(HealthResponse {
        ok: true,
        sessions: state.room.session_count(),
    })
}
