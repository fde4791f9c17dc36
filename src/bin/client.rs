use slither_arena::app::settings::Settings;
use slither_arena::client::render::{RenderSink, TracingSink};
use slither_arena::client::runtime::{GameClient, Phase};
use slither_arena::game::sim::GameMode;
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:8080/ws";
const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const LOG_EVERY_FRAMES: u64 = 120;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let server_url = env::var("SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
    let mode = match env::var("CLIENT_MODE").as_deref() {
        Ok("bot") => GameMode::Bots,
        _ => GameMode::Networked,
    };
    let frame_limit: Option<u64> = env::var("CLIENT_FRAMES")
        .ok()
        .and_then(|value| value.parse().ok());

    let settings = Arc::new(Settings::load()?);
    let mut client = GameClient::new(settings);
    let mut sink = TracingSink::new(LOG_EVERY_FRAMES);

    client.start(mode, &server_url).await?;

    let mut ticker = tokio::time::interval(FRAME_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut frames = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => {
                tracing::info!("interrupted");
                break;
            }
        }

        let input = client.autopilot();
        let frame = client.frame(&input, Instant::now()).await;
        sink.present(&frame);

        if frame.phase == Phase::Menu {
            tracing::info!(score = frame.score, "back at menu, starting a new round");
            client.start(mode, &server_url).await?;
        }

        frames += 1;
        if frame_limit.is_some_and(|limit| frames >= limit) {
            break;
        }
    }

    client.disconnect().await;
    Ok(())
}
