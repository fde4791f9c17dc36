//! The client's per-frame driver.
//!
//! One [`GameClient::frame`] call is one display refresh: apply whatever the
//! network delivered, advance the interpolator, step the local world, report
//! the player's state, and hand a [`RenderFrame`] back to the caller.

use super::interpolator::{Capture, Interpolator};
use super::net::{ConnectionStatus, NetClient, NetEvent};
use super::render::{PelletView, RenderFrame, SnakeView};
use crate::app::settings::Settings;
use crate::game::constants::RETURN_TO_MENU_DELAY_MS;
use crate::game::sim::{GameMode, SimEvent, TickInput, World};
use crate::game::snake::Snake;
use crate::game::types::Point;
use crate::protocol::{ClientMessage, FoodState, PlayerState, ServerMessage};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

const FALLBACK_COLOR: &str = "#ffffff";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Menu,
    Playing,
    Dead { return_at: Instant },
}

pub struct GameClient {
    settings: Arc<Settings>,
    world: World,
    interpolator: Interpolator,
    net: Option<NetClient>,
    phase: Phase,
    status: Option<ConnectionStatus>,
    player_id: Option<String>,
    roster: HashMap<String, PlayerState>,
}

impl GameClient {
    pub fn new(settings: Arc<Settings>) -> Self {
        let world = World::new(Arc::clone(&settings), GameMode::Networked);
        let interpolator = make_interpolator(&settings);
        Self {
            settings,
            world,
            interpolator,
            net: None,
            phase: Phase::Menu,
            status: None,
            player_id: None,
            roster: HashMap::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> Option<ConnectionStatus> {
        self.status
    }

    pub fn player_id(&self) -> Option<&str> {
        self.player_id.as_deref()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Leaves the menu with a fresh world. In networked mode a failed first
    /// connection keeps the client in the menu and is returned to the caller.
    pub async fn start(&mut self, mode: GameMode, server_url: &str) -> anyhow::Result<()> {
        self.disconnect().await;
        self.world = World::new(Arc::clone(&self.settings), mode);
        self.interpolator = make_interpolator(&self.settings);
        self.roster.clear();
        self.player_id = None;

        if mode == GameMode::Networked {
            self.status = Some(ConnectionStatus::Connecting);
            match NetClient::connect(server_url).await {
                Ok(net) => self.net = Some(net),
                Err(error) => {
                    self.status = Some(ConnectionStatus::Failed);
                    self.phase = Phase::Menu;
                    return Err(error);
                }
            }
        }

        tracing::info!(?mode, "game started");
        self.phase = Phase::Playing;
        Ok(())
    }

    pub fn apply_settings(&mut self, settings: Arc<Settings>) {
        self.settings = Arc::clone(&settings);
        self.world.apply_settings(settings);
    }

    /// Steering for an unattended player.
    pub fn autopilot(&mut self) -> TickInput {
        self.world.autopilot()
    }

    pub async fn frame(&mut self, input: &TickInput, now: Instant) -> RenderFrame {
        self.drain_network();
        self.interpolator.advance_frame();
        self.sync_remotes();

        let phase = self.phase;
        match phase {
            Phase::Playing => self.step_world(input, now),
            Phase::Dead { return_at } if now >= return_at => self.return_to_menu().await,
            _ => {}
        }
        self.render()
    }

    /// Closes the connection, if any. Safe to call in any phase.
    pub async fn disconnect(&mut self) {
        if let Some(net) = self.net.take() {
            net.close().await;
        }
        self.status = None;
    }

    fn drain_network(&mut self) {
        let Some(net) = self.net.as_mut() else { return };
        let mut events = Vec::new();
        while let Some(event) = net.try_recv() {
            events.push(event);
        }
        for event in events {
            match event {
                NetEvent::Status(status) => self.status = Some(status),
                NetEvent::Message(message) => self.handle_server_message(message),
            }
        }
    }

    fn handle_server_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Init {
                player_id,
                foods,
                players,
            } => {
                tracing::info!(player_id = %player_id, peers = players.len(), "joined arena");
                self.world.replace_food(food_entries(&foods));
                self.roster = players
                    .into_iter()
                    .filter(|player| player.id != player_id)
                    .map(|player| (player.id.clone(), player))
                    .collect();
                self.world.player.id = Some(player_id.clone());
                self.player_id = Some(player_id);
            }
            ServerMessage::GameState {
                players, timestamp, ..
            } => {
                let own = self.player_id.as_deref();
                let captures: Vec<(String, Capture)> = players
                    .iter()
                    .filter(|player| Some(player.id.as_str()) != own)
                    .map(|player| (player.id.clone(), Capture::from_remote(player, timestamp)))
                    .collect();
                self.interpolator.apply_snapshot(captures);
            }
            ServerMessage::PlayerJoined { player } => {
                if self.player_id.as_deref() != Some(player.id.as_str()) {
                    tracing::debug!(player_id = %player.id, "peer joined");
                    self.roster.insert(player.id.clone(), player);
                }
            }
            ServerMessage::PlayerLeft { player_id } => {
                tracing::debug!(player_id = %player_id, "peer left");
                self.forget_peer(&player_id);
            }
            ServerMessage::PlayerDied {
                player_id,
                new_foods,
            } => {
                let positions: Vec<_> = new_foods.iter().map(FoodState::position).collect();
                self.world.add_death_food(&positions);
                if self.player_id.as_deref() != Some(player_id.as_str()) {
                    self.forget_peer(&player_id);
                }
            }
            ServerMessage::FoodUpdate { foods, .. } => {
                self.world.replace_food(food_entries(&foods));
            }
        }
    }

    fn forget_peer(&mut self, player_id: &str) {
        self.roster.remove(player_id);
        self.interpolator.remove(player_id);
        self.world.remotes.remove(player_id);
    }

    /// Rebuilds the remote shadows from the interpolator's current blend.
    fn sync_remotes(&mut self) {
        self.world
            .remotes
            .retain(|id, _| self.interpolator.contains(id));
        for (id, capture) in self.interpolator.views() {
            let color = self
                .roster
                .get(id)
                .map(|player| player.color.as_str())
                .filter(|color| !color.is_empty())
                .unwrap_or(FALLBACK_COLOR)
                .to_string();
            let shadow = Snake::remote(id.to_string(), capture.position, capture.angle, capture.segments, color);
            self.world.remotes.insert(id.to_string(), shadow);
        }
    }

    fn step_world(&mut self, input: &TickInput, now: Instant) {
        for event in self.world.step(input) {
            match event {
                SimEvent::PlayerDied { food_positions } => {
                    tracing::info!(score = self.world.player.score, "player died");
                    self.send(ClientMessage::Died { food_positions });
                    self.phase = Phase::Dead {
                        return_at: now + Duration::from_millis(RETURN_TO_MENU_DELAY_MS),
                    };
                }
                SimEvent::PlayerAte { position } => self.send(ClientMessage::AteFood { food: position }),
                SimEvent::BotRespawned { index } => tracing::debug!(index, "bot respawned"),
            }
        }

        let player = &self.world.player;
        if player.alive {
            let update = ClientMessage::Update {
                x: player.position.x,
                y: player.position.y,
                angle: player.angle,
                segments: player.segments.clone(),
                score: player.score,
            };
            self.send(update);
        }
    }

    async fn return_to_menu(&mut self) {
        tracing::info!("returning to menu");
        self.phase = Phase::Menu;
        self.disconnect().await;
    }

    fn send(&self, message: ClientMessage) {
        if let Some(net) = &self.net {
            net.send(message);
        }
    }

    fn render(&self) -> RenderFrame {
        let world = &self.world;
        let mut snakes: Vec<SnakeView> = world
            .remotes
            .values()
            .chain(world.bots.iter())
            .filter(|snake| snake.alive)
            .map(|snake| SnakeView::of(snake, false))
            .collect();
        if self.phase != Phase::Menu && world.player.alive {
            snakes.push(SnakeView::of(&world.player, true));
        }
        RenderFrame {
            camera: world.player.position,
            snakes,
            pellets: world.food.pellets().iter().map(PelletView::from).collect(),
            score: world.player.score,
            phase: self.phase,
            status: self.status,
        }
    }
}

fn make_interpolator(settings: &Settings) -> Interpolator {
    Interpolator::new(settings.multiplayer.lerp_speed, settings.multiplayer.interpolation)
}

fn food_entries(foods: &[FoodState]) -> Vec<(Point, bool)> {
    foods
        .iter()
        .map(|food| (food.position(), food.from_dead_snake))
        .collect()
}
