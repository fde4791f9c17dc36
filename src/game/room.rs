use super::constants::{
    DEATH_DISCONNECT_DELAY_MS, FOOD_MATCH_TOLERANCE, SESSION_EVENT_QUEUE,
    SESSION_SPAWN_RADIUS_FRACTION,
};
use super::food::FoodField;
use super::math::{distance_squared, random_angle, random_world_point};
use super::types::{Pellet, Point};
use crate::app::settings::SettingsStore;
use crate::app::time::now_millis;
use crate::protocol::{
    self, ClientMessage, CurrentPlayer, FoodState, PlayerState, RemotePlayer, ServerMessage,
};
use dashmap::DashMap;
use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Notify};
use uuid::Uuid;

mod session;
mod visibility;

pub use session::{LatestFrame, ReportedState, SessionIo};
pub use visibility::within_interest;

use session::SessionEntry;

/// The one shared world: session registry, server food field and broadcast loop.
#[derive(Debug)]
pub struct Room {
    sessions: DashMap<String, SessionEntry>,
    food: Mutex<FoodField>,
    settings: SettingsStore,
    running: AtomicBool,
    death_disconnect_delay: Duration,
}

impl Room {
    pub fn new(settings: SettingsStore) -> Self {
        let snapshot = settings.snapshot();
        let mut food = FoodField::new(&snapshot);
        food.replenish_to(snapshot.food_count, &mut rand::thread_rng());
        Self {
            sessions: DashMap::new(),
            food: Mutex::new(food),
            settings,
            running: AtomicBool::new(false),
            death_disconnect_delay: Duration::from_millis(DEATH_DISCONNECT_DELAY_MS),
        }
    }

    pub fn with_death_disconnect_delay(mut self, delay: Duration) -> Self {
        self.death_disconnect_delay = delay;
        self
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn player_state(&self, session_id: &str) -> Option<PlayerState> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.player_state(session_id))
    }

    pub async fn food_count(&self) -> usize {
        self.food.lock().await.len()
    }

    pub async fn add_session(self: &Arc<Self>) -> SessionIo {
        let session_id = Uuid::new_v4().to_string();
        let settings = self.settings.snapshot();
        let outbound_state = Arc::new(LatestFrame::new());
        let (outbound_events, outbound_events_rx) = mpsc::channel::<String>(SESSION_EVENT_QUEUE);
        let close = Arc::new(Notify::new());

        let entry = {
            let mut rng = rand::thread_rng();
            SessionEntry {
                position: random_world_point(
                    &mut rng,
                    settings.world_size * SESSION_SPAWN_RADIUS_FRACTION,
                ),
                angle: random_angle(&mut rng),
                segments: Vec::new(),
                score: 0,
                alive: true,
                color: settings
                    .colors
                    .choose(&mut rng)
                    .cloned()
                    .unwrap_or_default(),
                outbound_state: Arc::clone(&outbound_state),
                outbound_events,
                close: Arc::clone(&close),
            }
        };
        let joined = entry.player_state(&session_id);
        self.sessions.insert(session_id.clone(), entry);

        let foods = self.food_states().await;
        let init = ServerMessage::Init {
            player_id: session_id.clone(),
            foods,
            players: self.roster(),
        };
        self.send_to(&session_id, &init);
        self.broadcast(&ServerMessage::PlayerJoined { player: joined }, Some(&session_id));
        tracing::info!(session_id = %session_id, sessions = self.sessions.len(), "player joined");

        self.ensure_loop();

        SessionIo {
            session_id,
            outbound_state,
            outbound_events_rx,
            close,
        }
    }

    pub async fn remove_session(&self, session_id: &str) {
        if self.sessions.remove(session_id).is_none() {
            return;
        }
        self.broadcast(
            &ServerMessage::PlayerLeft {
                player_id: session_id.to_string(),
            },
            None,
        );
        tracing::info!(session_id, sessions = self.sessions.len(), "player left");
    }

    pub async fn handle_text_message(self: &Arc<Self>, session_id: &str, text: &str) {
        let Some(message) = protocol::decode_client_message(text) else {
            tracing::warn!(session_id, "dropping malformed client message");
            return;
        };
        if !self.sessions.contains_key(session_id) {
            tracing::debug!(session_id, "message for unknown session ignored");
            return;
        }
        match message {
            ClientMessage::Update {
                x,
                y,
                angle,
                segments,
                score,
            } => {
                self.apply_reported_state(
                    session_id,
                    ReportedState {
                        position: Point::new(x, y),
                        angle,
                        segments,
                        score,
                    },
                );
            }
            ClientMessage::Died { food_positions } => {
                self.handle_died(session_id, &food_positions).await;
            }
            ClientMessage::AteFood { food } => {
                self.handle_ate_food(session_id, food).await;
            }
        }
    }

    /// The only place peer-reported motion enters the registry. Values are
    /// stored verbatim; no bounds or plausibility checks are made.
    pub fn apply_reported_state(&self, session_id: &str, reported: ReportedState) -> bool {
        let Some(mut entry) = self.sessions.get_mut(session_id) else {
            return false;
        };
        entry.overwrite(reported);
        true
    }

    async fn handle_died(&self, session_id: &str, food_positions: &[Point]) {
        let close = {
            let Some(mut entry) = self.sessions.get_mut(session_id) else { return };
            if !entry.alive {
                return;
            }
            entry.alive = false;
            Arc::clone(&entry.close)
        };

        let new_foods = {
            let mut food = self.food.lock().await;
            food.scatter_from_death(food_positions, &mut rand::thread_rng())
        };
        tracing::debug!(session_id, pellets = new_foods.len(), "player died");
        self.broadcast(
            &ServerMessage::PlayerDied {
                player_id: session_id.to_string(),
                new_foods: new_foods.iter().map(food_state).collect(),
            },
            None,
        );

        let delay = self.death_disconnect_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            close.notify_one();
        });
    }

    async fn handle_ate_food(&self, session_id: &str, reported: Point) {
        let target = self.settings.snapshot().food_count;
        let foods = {
            let mut food = self.food.lock().await;
            let Some(eaten) = food.consume_matching(reported, FOOD_MATCH_TOLERANCE) else {
                tracing::debug!(session_id, x = reported.x, y = reported.y, "eaten pellet not found");
                return;
            };
            // Death pellets sit above the target count, so replacing up to the
            // target never respawns them.
            let spawned = food.replenish_to(target, &mut rand::thread_rng());
            tracing::debug!(session_id, from_death = eaten.from_death, spawned, "pellet eaten");
            food.pellets().iter().map(food_state).collect()
        };
        self.broadcast(
            &ServerMessage::FoodUpdate {
                foods,
                eaten_food: Some(reported),
            },
            None,
        );
    }

    fn ensure_loop(self: &Arc<Self>) {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let room = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(room.settings.snapshot().tick_interval());
            loop {
                interval.tick().await;
                if room.sessions.is_empty() && room.release_loop() {
                    break;
                }
                room.tick().await;
            }
            tracing::debug!("broadcast loop stopped");
        });
    }

    /// Clears the running flag, then takes it back if a session joined in the
    /// meantime, since that joiner's own `ensure_loop` saw the flag still set.
    /// Returns true when the loop should stop.
    fn release_loop(&self) -> bool {
        self.running.store(false, Ordering::SeqCst);
        if self.sessions.is_empty() {
            return true;
        }
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
    }

    /// One broadcast tick: top the food field back up, then hand every session
    /// its own interest-filtered snapshot.
    pub async fn tick(&self) {
        let settings = self.settings.snapshot();
        let refill = {
            let mut food = self.food.lock().await;
            let spawned = food.replenish_to(settings.food_count, &mut rand::thread_rng());
            (spawned > 0).then(|| food.pellets().iter().map(food_state).collect::<Vec<_>>())
        };
        if let Some(foods) = refill {
            self.broadcast(
                &ServerMessage::FoodUpdate {
                    foods,
                    eaten_food: None,
                },
                None,
            );
        }

        let roster = self.roster();
        let snapshots = visibility::personalized_snapshots(
            &roster,
            settings.interest_threshold_sq(),
            now_millis(),
        );
        for (session_id, message) in snapshots {
            let Some(payload) = protocol::encode(&message) else { continue };
            if let Some(entry) = self.sessions.get(&session_id) {
                entry.outbound_state.store(payload);
            }
        }
    }

    fn roster(&self) -> Vec<PlayerState> {
        self.sessions
            .iter()
            .map(|entry| entry.player_state(entry.key()))
            .collect()
    }

    async fn food_states(&self) -> Vec<FoodState> {
        self.food.lock().await.pellets().iter().map(food_state).collect()
    }

    fn send_to(&self, session_id: &str, message: &ServerMessage) {
        let Some(payload) = protocol::encode(message) else { return };
        if let Some(entry) = self.sessions.get(session_id) {
            entry.send_event(session_id, payload);
        }
    }

    fn broadcast(&self, message: &ServerMessage, exclude: Option<&str>) {
        let Some(payload) = protocol::encode(message) else { return };
        for entry in self.sessions.iter() {
            if Some(entry.key().as_str()) == exclude {
                continue;
            }
            entry.send_event(entry.key(), payload.clone());
        }
    }
}

fn food_state(pellet: &Pellet) -> FoodState {
    FoodState {
        x: pellet.origin.x,
        y: pellet.origin.y,
        from_dead_snake: pellet.from_death,
    }
}
