//! One tick of the local simulation.
//!
//! The same [`World::step`] drives the standalone bot arena and the networked
//! client. Remote shadows are never advanced here; they only act as obstacles.

use super::bot::{self, Surroundings};
use super::constants::{BOT_RESPAWN_RADIUS_FRACTION, EAT_RADIUS, MAGNET_RADIUS};
use super::food::FoodField;
use super::geometry::clamp_to_radius;
use super::math::{bearing, point_from_polar, random_angle, random_world_point, shortest_delta};
use super::snake::Snake;
use super::types::{Controller, Point};
use crate::app::settings::Settings;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    /// Standalone arena against locally simulated bots.
    Bots,
    /// Shared world; food and peers come from the server.
    Networked,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput {
    /// Bearing from the player's head toward the pointer.
    pub target_heading: f64,
    pub boosting: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    PlayerDied { food_positions: Vec<Point> },
    PlayerAte { position: Point },
    BotRespawned { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum AvatarKey {
    Player,
    Bot(usize),
    Remote(String),
}

pub struct World {
    settings: Arc<Settings>,
    mode: GameMode,
    pub player: Snake,
    pub bots: Vec<Snake>,
    pub remotes: HashMap<String, Snake>,
    pub food: FoodField,
    rng: StdRng,
}

impl World {
    pub fn new(settings: Arc<Settings>, mode: GameMode) -> Self {
        Self::with_rng(settings, mode, StdRng::from_entropy())
    }

    pub fn with_rng(settings: Arc<Settings>, mode: GameMode, mut rng: StdRng) -> Self {
        let player = Snake::new(Point::default(), 0.0, Controller::Player, &settings, &mut rng);
        let food = FoodField::new(&settings);
        let mut world = Self {
            settings,
            mode,
            player,
            bots: Vec::new(),
            remotes: HashMap::new(),
            food,
            rng,
        };
        if mode == GameMode::Bots {
            world.sync_bot_count();
            let target = world.settings.food_count;
            world.food.replenish_to(target, &mut world.rng);
        }
        world
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// Swaps in a new settings snapshot and reconciles counts and appearance with it.
    pub fn apply_settings(&mut self, settings: Arc<Settings>) {
        self.settings = settings;
        self.food.apply_settings(&self.settings, &mut self.rng);
        self.player.refresh_speed(&self.settings);
        for bot in &mut self.bots {
            bot.refresh_speed(&self.settings);
        }
        if self.mode == GameMode::Bots {
            self.food.trim_to(self.settings.food_count);
            let target = self.settings.food_count;
            self.food.replenish_to(target, &mut self.rng);
            self.sync_bot_count();
        }
    }

    /// Replaces the food field with the server's authoritative list.
    pub fn replace_food(&mut self, entries: impl IntoIterator<Item = (Point, bool)>) {
        self.food.replace_all(entries, &mut self.rng);
    }

    /// Adds pellets another peer's death left behind.
    pub fn add_death_food(&mut self, positions: &[Point]) {
        self.food.scatter_from_death(positions, &mut self.rng);
    }

    /// Steering input for an unattended player: the bot decision applied to
    /// the player's avatar, with every other avatar treated as a threat.
    pub fn autopilot(&mut self) -> TickInput {
        let others: Vec<&Snake> = self
            .bots
            .iter()
            .chain(self.remotes.values())
            .filter(|snake| snake.alive)
            .collect();
        let peers: Vec<Point> = others.iter().map(|snake| snake.head()).collect();
        let surroundings = Surroundings {
            peers: &peers,
            rivals: &others,
            food: &self.food,
            world_radius: self.settings.world_radius(),
        };
        TickInput {
            target_heading: bot::steer(&self.player, &surroundings, &mut self.rng),
            boosting: false,
        }
    }

    fn sync_bot_count(&mut self) {
        let target = self.settings.bot_count;
        self.bots.truncate(target);
        while self.bots.len() < target {
            let position = random_world_point(&mut self.rng, self.settings.world_size);
            let bot = Snake::new(position, 0.0, Controller::Bot, &self.settings, &mut self.rng);
            self.bots.push(bot);
        }
    }

    pub fn step(&mut self, input: &TickInput) -> Vec<SimEvent> {
        let settings = Arc::clone(&self.settings);
        let mut events = Vec::new();

        self.advance_avatars(input, &settings);

        let radius = settings.world_radius();
        let mut deaths = Vec::new();
        for key in self.local_keys() {
            let Some(avatar) = self.avatar_mut(&key) else { continue };
            if !avatar.alive || avatar.distance_from_center() <= radius {
                continue;
            }
            if settings.safe_wall {
                follow_border(avatar, input.target_heading, radius);
            } else {
                deaths.push(key);
            }
        }
        self.apply_deaths(deaths, &mut events);

        let deaths = self.collision_pass();
        self.apply_deaths(deaths, &mut events);

        self.consume_food(&mut events);

        if self.mode == GameMode::Bots {
            self.food.replenish_to(settings.food_count, &mut self.rng);
        }
        events
    }

    fn advance_avatars(&mut self, input: &TickInput, settings: &Settings) {
        self.player.advance(input.target_heading, input.boosting, settings);

        let heads: Vec<Option<Point>> = self
            .bots
            .iter()
            .map(|bot| bot.alive.then_some(bot.head()))
            .collect();
        let rivals: Vec<&Snake> = std::iter::once(&self.player).filter(|p| p.alive).collect();
        let mut targets = Vec::with_capacity(self.bots.len());
        let mut peers = Vec::with_capacity(heads.len());
        for (index, bot) in self.bots.iter().enumerate() {
            if !bot.alive {
                targets.push(bot.target_angle);
                continue;
            }
            peers.clear();
            peers.extend(
                heads
                    .iter()
                    .enumerate()
                    .filter(|(other, _)| *other != index)
                    .filter_map(|(_, head)| *head),
            );
            let surroundings = Surroundings {
                peers: &peers,
                rivals: &rivals,
                food: &self.food,
                world_radius: settings.world_radius(),
            };
            targets.push(bot::steer(bot, &surroundings, &mut self.rng));
        }
        for (bot, target) in self.bots.iter_mut().zip(targets) {
            bot.advance(target, false, settings);
        }
    }

    /// Every living avatar's head tested against every other living avatar's body.
    /// Only locally simulated avatars can die here; deaths land after the whole pass.
    fn collision_pass(&self) -> Vec<AvatarKey> {
        let everyone: Vec<(AvatarKey, &Snake)> = self.all_avatars().filter(|(_, s)| s.alive).collect();
        let mut dead = Vec::new();
        for (key, avatar) in &everyone {
            if !avatar.is_locally_simulated() {
                continue;
            }
            let hit = everyone
                .iter()
                .any(|(other_key, other)| other_key != key && avatar.check_collision(other));
            if hit {
                dead.push(key.clone());
            }
        }
        dead
    }

    fn apply_deaths(&mut self, keys: Vec<AvatarKey>, events: &mut Vec<SimEvent>) {
        for key in keys {
            match key {
                AvatarKey::Player => {
                    if !self.player.alive {
                        continue;
                    }
                    let food_positions = self.player.die(&mut self.rng);
                    // Networked peers learn about the pellets from the server's playerDied.
                    if self.mode == GameMode::Bots {
                        self.food.scatter_from_death(&food_positions, &mut self.rng);
                    }
                    tracing::debug!(segments = food_positions.len(), "player died");
                    events.push(SimEvent::PlayerDied { food_positions });
                }
                AvatarKey::Bot(index) => {
                    let Some(bot) = self.bots.get_mut(index) else { continue };
                    if !bot.alive {
                        continue;
                    }
                    let food_positions = bot.die(&mut self.rng);
                    self.food.scatter_from_death(&food_positions, &mut self.rng);
                    let spawn = point_from_polar(
                        random_angle(&mut self.rng),
                        self.settings.world_size * BOT_RESPAWN_RADIUS_FRACTION,
                    );
                    self.bots[index] = Snake::new(spawn, 0.0, Controller::Bot, &self.settings, &mut self.rng);
                    events.push(SimEvent::BotRespawned { index });
                }
                AvatarKey::Remote(_) => {}
            }
        }
    }

    fn consume_food(&mut self, events: &mut Vec<SimEvent>) {
        let heads: Vec<Point> = self
            .local_avatars()
            .filter(|(_, avatar)| avatar.alive)
            .map(|(_, avatar)| avatar.head())
            .collect();
        self.food.attract(&heads, MAGNET_RADIUS);

        for key in self.local_keys() {
            let food = &mut self.food;
            let avatar = match &key {
                AvatarKey::Player => &mut self.player,
                AvatarKey::Bot(index) => &mut self.bots[*index],
                AvatarKey::Remote(_) => continue,
            };
            if !avatar.alive {
                continue;
            }
            while let Some(pellet) = food.consume_near(avatar.head(), EAT_RADIUS) {
                avatar.score += 1;
                avatar.grow_by_one();
                if key == AvatarKey::Player {
                    events.push(SimEvent::PlayerAte {
                        position: pellet.origin,
                    });
                }
            }
        }
    }

    fn local_keys(&self) -> Vec<AvatarKey> {
        std::iter::once(AvatarKey::Player)
            .chain((0..self.bots.len()).map(AvatarKey::Bot))
            .collect()
    }

    fn local_avatars(&self) -> impl Iterator<Item = (AvatarKey, &Snake)> {
        std::iter::once((AvatarKey::Player, &self.player)).chain(
            self.bots
                .iter()
                .enumerate()
                .map(|(index, bot)| (AvatarKey::Bot(index), bot)),
        )
    }

    fn all_avatars(&self) -> impl Iterator<Item = (AvatarKey, &Snake)> {
        self.local_avatars().chain(
            self.remotes
                .iter()
                .map(|(id, remote)| (AvatarKey::Remote(id.clone()), remote)),
        )
    }

    fn avatar_mut(&mut self, key: &AvatarKey) -> Option<&mut Snake> {
        match key {
            AvatarKey::Player => Some(&mut self.player),
            AvatarKey::Bot(index) => self.bots.get_mut(*index),
            AvatarKey::Remote(id) => self.remotes.get_mut(id),
        }
    }
}

/// Pins an avatar that crossed the border back onto it. The player keeps
/// sliding along the border toward the side its pointer is on.
fn follow_border(avatar: &mut Snake, pointer_heading: f64, radius: f64) {
    avatar.position = clamp_to_radius(avatar.position, radius);
    if avatar.controller == Controller::Player {
        let radial = bearing(Point::default(), avatar.position);
        let tangent = if shortest_delta(pointer_heading, radial) >= 0.0 {
            radial + FRAC_PI_2
        } else {
            radial - FRAC_PI_2
        };
        avatar.angle = super::math::normalize_angle(tangent);
    }
    avatar.sync_head();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::math::{distance, length};
    use crate::game::constants::FOOD_MATCH_TOLERANCE;
    use crate::game::types::Segment;
    use std::f64::consts::PI;

    fn quiet_settings() -> Settings {
        let mut settings = Settings::default();
        settings.food_count = 0;
        settings.bot_count = 0;
        settings
    }

    fn world(settings: Settings, mode: GameMode) -> World {
        World::with_rng(Arc::new(settings), mode, StdRng::seed_from_u64(42))
    }

    fn bot(world: &mut World, position: Point, angle: f64) -> Snake {
        Snake::new(position, angle, Controller::Bot, &world.settings, &mut world.rng)
    }

    #[test]
    fn head_into_body_kills_only_the_intruder() {
        let mut world = world(quiet_settings(), GameMode::Bots);
        world.player = Snake::new(
            Point::new(-40.0, 12.0),
            -PI / 2.0,
            Controller::Player,
            &world.settings,
            &mut world.rng,
        );
        let blocker = bot(&mut world, Point::new(0.0, 0.0), 0.0);
        world.bots.push(blocker);
        let segments_before = world.player.segments.len();

        let events = world.step(&TickInput {
            target_heading: -PI / 2.0,
            boosting: false,
        });

        assert!(!world.player.alive);
        assert!(world.bots[0].alive);
        assert_eq!(world.food.len(), segments_before);
        assert!(matches!(events.as_slice(), [SimEvent::PlayerDied { food_positions }] if food_positions.len() == segments_before));
    }

    #[test]
    fn crossing_the_wall_kills_without_safe_wall() {
        let mut world = world(quiet_settings(), GameMode::Bots);
        world.player = Snake::new(
            Point::new(2499.0, 0.0),
            0.0,
            Controller::Player,
            &world.settings,
            &mut world.rng,
        );
        let events = world.step(&TickInput::default());
        assert!(!world.player.alive);
        assert_eq!(events.len(), 1);
        assert_eq!(world.food.len(), 10);
    }

    #[test]
    fn safe_wall_slides_player_along_border() {
        let mut settings = quiet_settings();
        settings.safe_wall = true;
        let mut world = world(settings, GameMode::Bots);
        world.player = Snake::new(
            Point::new(2499.5, 0.0),
            0.0,
            Controller::Player,
            &world.settings,
            &mut world.rng,
        );
        let events = world.step(&TickInput {
            target_heading: 0.1,
            boosting: false,
        });
        assert!(events.is_empty());
        assert!(world.player.alive);
        assert!((length(world.player.position) - 2500.0).abs() < 1e-9);
        assert!((world.player.angle - FRAC_PI_2).abs() < 1e-9);
        assert_eq!(world.player.segments[0].position(), world.player.position);
    }

    #[test]
    fn bot_leaving_the_world_respawns_at_mid_radius() {
        let mut world = world(quiet_settings(), GameMode::Bots);
        let runaway = bot(&mut world, Point::new(2498.0, 0.0), 0.0);
        world.bots.push(runaway);
        let events = world.step(&TickInput::default());
        assert_eq!(events, vec![SimEvent::BotRespawned { index: 0 }]);
        let respawned = &world.bots[0];
        assert!(respawned.alive);
        assert!((length(respawned.position) - 5000.0 / 3.0).abs() < 1e-6);
        assert_eq!(world.food.len(), 10);
    }

    #[test]
    fn player_eats_nearby_pellet_and_grows() {
        let mut world = world(quiet_settings(), GameMode::Bots);
        let mut rng = StdRng::seed_from_u64(1);
        world.food.scatter_from_death(&[Point::new(12.0, 0.0)], &mut rng);

        let events = world.step(&TickInput::default());

        assert_eq!(world.player.score, 1);
        assert_eq!(world.player.segments.len(), 11);
        assert!(world.food.is_empty());
        assert!(matches!(events.as_slice(), [SimEvent::PlayerAte { .. }]));
    }

    #[test]
    fn remote_shadows_are_obstacles_but_never_move_or_die() {
        let mut world = world(quiet_settings(), GameMode::Networked);
        world.player = Snake::new(
            Point::new(-40.0, 12.0),
            -PI / 2.0,
            Controller::Player,
            &world.settings,
            &mut world.rng,
        );
        let body = bot(&mut world, Point::new(0.0, 0.0), 0.0);
        let shadow = Snake::remote("peer".into(), body.position, 0.0, body.segments.clone(), body.color.clone());
        world.remotes.insert("peer".into(), shadow.clone());

        let events = world.step(&TickInput {
            target_heading: -PI / 2.0,
            boosting: false,
        });

        let remote = &world.remotes["peer"];
        assert_eq!(remote.segments, shadow.segments);
        assert!(remote.alive);
        assert!(!world.player.alive);
        // Networked deaths are scattered by the server, not locally.
        assert!(world.food.is_empty());
        assert!(matches!(events.as_slice(), [SimEvent::PlayerDied { .. }]));
    }

    #[test]
    fn bots_mode_keeps_food_at_target() {
        let mut settings = quiet_settings();
        settings.food_count = 50;
        settings.bot_count = 5;
        let mut world = world(settings, GameMode::Bots);
        assert_eq!(world.bots.len(), 5);
        for _ in 0..20 {
            world.step(&TickInput::default());
            assert!(world.food.len() >= 50);
        }
    }

    #[test]
    fn autopilot_turns_home_near_the_border() {
        let mut world = world(quiet_settings(), GameMode::Bots);
        world.player.position = Point::new(2400.0, 0.0);
        world.player.sync_head();
        let input = world.autopilot();
        assert!(shortest_delta(input.target_heading, PI).abs() < 1e-9);
        assert!(!input.boosting);
    }

    #[test]
    fn autopilot_backs_away_from_a_remote_head() {
        let mut world = world(quiet_settings(), GameMode::Networked);
        let head = Point::new(120.0, 0.0);
        let shadow = Snake::remote("peer".into(), head, PI, vec![Segment::new(head, PI)], "#fff".into());
        world.remotes.insert("peer".into(), shadow);
        let input = world.autopilot();
        assert!(shortest_delta(input.target_heading, PI).abs() < 1e-9);
    }

    #[test]
    fn server_food_replaces_the_local_field() {
        let mut world = world(quiet_settings(), GameMode::Networked);
        world.replace_food([(Point::new(1.0, 2.0), false), (Point::new(3.0, 4.0), true)]);
        assert_eq!(world.food.len(), 2);
        assert!(world.food.pellets()[1].from_death);
        world.add_death_food(&[Point::new(5.0, 6.0)]);
        assert_eq!(world.food.len(), 3);
    }

    #[test]
    fn eaten_report_matches_the_server_pellet() {
        let mut world = world(quiet_settings(), GameMode::Networked);
        let placed = Point::new(60.0, 0.0);
        world.replace_food([(placed, false)]);
        let mut server_food = FoodField::new(&world.settings);
        server_food.replace_all([(placed, false)], &mut StdRng::seed_from_u64(3));

        let mut reported = None;
        for _ in 0..100 {
            let events = world.step(&TickInput::default());
            if let Some(SimEvent::PlayerAte { position }) = events.into_iter().next() {
                reported = Some(position);
                break;
            }
        }

        let reported = reported.expect("player reached the pellet");
        assert_eq!(reported, placed);
        assert!(server_food.consume_matching(reported, FOOD_MATCH_TOLERANCE).is_some());
    }

    #[test]
    fn settings_swap_adjusts_counts() {
        let mut settings = quiet_settings();
        settings.food_count = 30;
        settings.bot_count = 6;
        let mut world = world(settings.clone(), GameMode::Bots);
        settings.food_count = 10;
        settings.bot_count = 2;
        settings.player_speed = 3.0;
        world.apply_settings(Arc::new(settings));
        assert_eq!(world.food.len(), 10);
        assert_eq!(world.bots.len(), 2);
        assert_eq!(world.player.speed, 3.0);
        let before = world.player.position;
        world.step(&TickInput::default());
        assert!((distance(before, world.player.position) - 3.0).abs() < 1e-9);
    }
}
