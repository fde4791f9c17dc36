//! Tunable game parameters.
//!
//! Components receive an immutable `Arc<Settings>` snapshot; runtime changes
//! swap a whole new snapshot into the [`SettingsStore`].

use crate::game::constants::COLOR_POOL;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Settings {
    pub world_size: f64,
    pub player_speed: f64,
    pub bot_speed: f64,
    pub boost_multiplier: f64,
    pub initial_snake_length: usize,
    pub bot_count: usize,
    pub food_count: usize,
    pub head_turn_speed: f64,
    pub eye_turn_speed: f64,
    pub segment_distance: f64,
    pub food_size: f64,
    pub colored_food: bool,
    pub safe_wall: bool,
    pub colors: Vec<String>,
    pub multiplayer: MultiplayerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct MultiplayerSettings {
    /// Blend remote avatars between snapshots instead of snapping to the latest one.
    pub interpolation: bool,
    /// Broadcast ticks per second.
    pub update_rate: u32,
    /// Blend factor advance per rendered frame.
    pub lerp_speed: f64,
    /// Radius of a recipient's interest set, in world units.
    pub view_distance: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            world_size: 5000.0,
            player_speed: 1.5,
            bot_speed: 4.0,
            boost_multiplier: 1.8,
            initial_snake_length: 10,
            bot_count: 100,
            food_count: 500,
            head_turn_speed: 0.05,
            eye_turn_speed: 0.3,
            segment_distance: 5.0,
            food_size: 2.0,
            colored_food: false,
            safe_wall: false,
            colors: COLOR_POOL.iter().map(|color| color.to_string()).collect(),
            multiplayer: MultiplayerSettings::default(),
        }
    }
}

impl Default for MultiplayerSettings {
    fn default() -> Self {
        Self {
            interpolation: true,
            update_rate: 30,
            lerp_speed: 0.1,
            view_distance: 1000.0,
        }
    }
}

impl Settings {
    /// Defaults, then the optional `SETTINGS_PATH` JSON file, then `SNAKE_*` env overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut settings = match env::var("SETTINGS_PATH") {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        settings.apply_env_overrides();
        Ok(settings.sanitized())
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("failed to parse settings file {}", path.display()))
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let settings: Settings = serde_json::from_str(raw)?;
        Ok(settings.sanitized())
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(value) = env_parse("SNAKE_WORLD_SIZE") {
            self.world_size = value;
        }
        if let Some(value) = env_parse("SNAKE_FOOD_COUNT") {
            self.food_count = value;
        }
        if let Some(value) = env_parse("SNAKE_BOT_COUNT") {
            self.bot_count = value;
        }
        if let Some(value) = env_parse("SNAKE_PLAYER_SPEED") {
            self.player_speed = value;
        }
        if let Some(value) = env_parse("SNAKE_BOT_SPEED") {
            self.bot_speed = value;
        }
        if let Some(value) = env_parse("SNAKE_SAFE_WALL") {
            self.safe_wall = value;
        }
        if let Some(value) = env_parse("SNAKE_UPDATE_RATE") {
            self.multiplayer.update_rate = value;
        }
        if let Some(value) = env_parse("SNAKE_VIEW_DISTANCE") {
            self.multiplayer.view_distance = value;
        }
    }

    /// Replaces values the simulation cannot run with.
    pub fn sanitized(mut self) -> Self {
        let defaults = Settings::default();
        if !self.world_size.is_finite() || self.world_size <= 0.0 {
            self.world_size = defaults.world_size;
        }
        if !self.segment_distance.is_finite() || self.segment_distance <= 0.0 {
            self.segment_distance = defaults.segment_distance;
        }
        self.initial_snake_length = self.initial_snake_length.max(1);
        self.multiplayer.update_rate = self.multiplayer.update_rate.max(1);
        self.multiplayer.lerp_speed = self.multiplayer.lerp_speed.clamp(0.0, 1.0);
        if self.colors.is_empty() {
            self.colors = defaults.colors;
        }
        self
    }

    pub fn world_radius(&self) -> f64 {
        self.world_size / 2.0
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.multiplayer.update_rate.max(1) as f64)
    }

    pub fn interest_threshold_sq(&self) -> f64 {
        self.multiplayer.view_distance * self.multiplayer.view_distance
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.trim().parse().ok())
}

/// Shared handle that hands out whole-settings snapshots.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    current: Arc<RwLock<Arc<Settings>>>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(settings))),
        }
    }

    pub fn snapshot(&self) -> Arc<Settings> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, edit: impl FnOnce(&mut Settings)) -> Arc<Settings> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Settings::clone(&guard);
        edit(&mut next);
        let next = Arc::new(next.sanitized());
        *guard = Arc::clone(&next);
        next
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults_for_missing_keys() {
        let settings = Settings::from_json_str(
            r#"{"WORLD_SIZE": 800, "SAFE_WALL": true, "MULTIPLAYER": {"VIEW_DISTANCE": 250}, "SHOW_GRID": true}"#,
        )
        .expect("settings");
        assert_eq!(settings.world_size, 800.0);
        assert!(settings.safe_wall);
        assert_eq!(settings.multiplayer.view_distance, 250.0);
        assert_eq!(settings.multiplayer.update_rate, 30);
        assert_eq!(settings.food_count, 500);
        assert_eq!(settings.world_radius(), 400.0);
    }

    #[test]
    fn sanitized_rejects_unusable_values() {
        let settings = Settings::from_json_str(
            r#"{"WORLD_SIZE": -1, "SEGMENT_DISTANCE": 0, "COLORS": [], "MULTIPLAYER": {"UPDATE_RATE": 0}}"#,
        )
        .expect("settings");
        assert_eq!(settings.world_size, 5000.0);
        assert_eq!(settings.segment_distance, 5.0);
        assert!(!settings.colors.is_empty());
        assert_eq!(settings.multiplayer.update_rate, 1);
    }

    #[test]
    fn store_swaps_whole_snapshots() {
        let store = SettingsStore::default();
        let before = store.snapshot();
        let after = store.update(|settings| settings.food_count = 12);
        assert_eq!(before.food_count, 500);
        assert_eq!(after.food_count, 12);
        assert_eq!(store.snapshot().food_count, 12);
    }

    #[test]
    fn tick_interval_follows_update_rate() {
        let mut settings = Settings::default();
        settings.multiplayer.update_rate = 20;
        assert_eq!(settings.tick_interval(), Duration::from_millis(50));
        assert_eq!(settings.interest_threshold_sq(), 1_000_000.0);
    }
}
