//! Heading decisions for computer-controlled avatars.
//!
//! Every rule that fires overwrites the decision of the rules before it, so the
//! evaluation order doubles as the priority order: boundary avoidance beats
//! entity avoidance, which beats food seeking, which beats idle jitter.

use super::constants::{
    BOT_AVOID_BOT_RADIUS, BOT_AVOID_PLAYER_BODY_RADIUS, BOT_AVOID_PLAYER_HEAD_RADIUS,
    BOT_BORDER_MARGIN, BOT_FOOD_DETECT_RADIUS, BOT_RANDOM_TURN_CHANCE, BOT_RANDOM_TURN_SPREAD,
};
use super::food::FoodField;
use super::math::{bearing, distance, distance_squared, length, normalize_angle};
use super::snake::Snake;
use super::types::Point;
use rand::Rng;

/// What a steering avatar can see this tick.
pub struct Surroundings<'a> {
    /// Heads of other bots, excluding the one being steered.
    pub peers: &'a [Point],
    /// Avatars whose head and body are given a wide berth.
    pub rivals: &'a [&'a Snake],
    pub food: &'a FoodField,
    pub world_radius: f64,
}

/// Picks the next target heading for `bot`. With nothing to react to the
/// previous target is kept.
pub fn steer<R: Rng + ?Sized>(bot: &Snake, surroundings: &Surroundings<'_>, rng: &mut R) -> f64 {
    let position = bot.position;
    let mut target = bot.target_angle;

    if rng.gen::<f64>() < BOT_RANDOM_TURN_CHANCE {
        target = bot.angle + (rng.gen::<f64>() - 0.5) * BOT_RANDOM_TURN_SPREAD;
    }

    let border_gap = surroundings.world_radius - length(position);
    if border_gap > BOT_BORDER_MARGIN {
        if let Some(pellet) = nearest_pellet(position, surroundings.food) {
            target = bearing(position, pellet);
        }
    }

    if let Some(threat) = nearest_within(position, surroundings.peers.iter().copied(), BOT_AVOID_BOT_RADIUS) {
        target = bearing(threat, position);
    }

    for rival in surroundings.rivals.iter().filter(|rival| rival.alive) {
        if distance(position, rival.head()) < BOT_AVOID_PLAYER_HEAD_RADIUS {
            target = bearing(rival.head(), position);
            break;
        }
        let body = rival.body().iter().map(|segment| segment.position());
        if let Some(threat) = nearest_within(position, body, BOT_AVOID_PLAYER_BODY_RADIUS) {
            target = bearing(threat, position);
            break;
        }
    }

    if border_gap < BOT_BORDER_MARGIN {
        target = bearing(position, Point::default());
    }

    normalize_angle(target)
}

fn nearest_pellet(position: Point, food: &FoodField) -> Option<Point> {
    nearest_within(
        position,
        food.pellets().iter().map(|pellet| pellet.origin),
        BOT_FOOD_DETECT_RADIUS,
    )
}

fn nearest_within(origin: Point, candidates: impl Iterator<Item = Point>, radius: f64) -> Option<Point> {
    let radius_sq = radius * radius;
    candidates
        .map(|point| (point, distance_squared(origin, point)))
        .filter(|(_, dist_sq)| *dist_sq < radius_sq)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(point, _)| point)
}
