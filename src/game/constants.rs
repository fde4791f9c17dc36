pub const SEGMENT_HEADING_BLEND: f64 = 0.3;
pub const COLLISION_RADIUS: f64 = 15.0;
pub const DEATH_SCATTER_RADIUS: f64 = 15.0;
pub const EAT_RADIUS: f64 = 20.0;
pub const MAGNET_RADIUS: f64 = 50.0;
pub const MAGNET_PULL: f64 = 0.1;

pub const BODY_BASE_WIDTH: f64 = 20.0;
pub const BODY_MAX_WIDTH: f64 = 28.0;
pub const BODY_WIDTH_PER_SCORE: f64 = 0.005;

pub const BOT_RANDOM_TURN_CHANCE: f64 = 0.02;
pub const BOT_RANDOM_TURN_SPREAD: f64 = 0.5;
pub const BOT_AVOID_BOT_RADIUS: f64 = 100.0;
pub const BOT_AVOID_PLAYER_HEAD_RADIUS: f64 = 150.0;
pub const BOT_AVOID_PLAYER_BODY_RADIUS: f64 = 100.0;
pub const BOT_FOOD_DETECT_RADIUS: f64 = 150.0;
pub const BOT_BORDER_MARGIN: f64 = 200.0;
pub const BOT_RESPAWN_RADIUS_FRACTION: f64 = 1.0 / 3.0;

pub const SESSION_SPAWN_RADIUS_FRACTION: f64 = 0.5;
pub const FOOD_MATCH_TOLERANCE: f64 = 0.5;
pub const SESSION_EVENT_QUEUE: usize = 64;
pub const DEATH_DISCONNECT_DELAY_MS: u64 = 3000;
pub const RETURN_TO_MENU_DELAY_MS: u64 = 3000;
pub const RECONNECT_DELAY_MS: u64 = 3000;
pub const SESSION_FLUSH_TIMEOUT_MS: u64 = 1000;

pub const NEUTRAL_FOOD_COLOR: &str = "#666666";

pub const COLOR_POOL: [&str; 6] = [
    "#ff0000", "#00ff00", "#0000ff", "#ffff00", "#ff00ff", "#00ffff",
];
