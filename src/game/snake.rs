use super::constants::{
    BODY_BASE_WIDTH, BODY_MAX_WIDTH, BODY_WIDTH_PER_SCORE, COLLISION_RADIUS, DEATH_SCATTER_RADIUS,
};
use super::geometry::{follow_chain, head_body_collision};
use super::math::{ease_angle, jitter, length, normalize_angle};
use super::types::{Controller, Point, Segment};
use crate::app::settings::Settings;
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone)]
pub struct Snake {
    pub id: Option<String>,
    pub controller: Controller,
    pub position: Point,
    pub angle: f64,
    pub target_angle: f64,
    pub eye_angle: f64,
    pub speed: f64,
    pub boosting: bool,
    pub segments: Vec<Segment>,
    pub alive: bool,
    pub score: u32,
    pub color: String,
}

impl Snake {
    /// Spawns an avatar with a straight tail trailing behind `position`.
    pub fn new<R: Rng + ?Sized>(
        position: Point,
        angle: f64,
        controller: Controller,
        settings: &Settings,
        rng: &mut R,
    ) -> Self {
        let angle = normalize_angle(angle);
        let segments = (0..settings.initial_snake_length)
            .map(|index| {
                let back = index as f64 * settings.segment_distance;
                Segment::new(
                    Point {
                        x: position.x - angle.cos() * back,
                        y: position.y - angle.sin() * back,
                    },
                    angle,
                )
            })
            .collect();
        let color = settings
            .colors
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| "#ffffff".to_string());
        Self {
            id: None,
            controller,
            position,
            angle,
            target_angle: angle,
            eye_angle: angle,
            speed: base_speed(controller, settings),
            boosting: false,
            segments,
            alive: true,
            score: 0,
            color,
        }
    }

    /// Shadow of a peer simulated elsewhere; driven purely by snapshots.
    pub fn remote(id: String, position: Point, angle: f64, segments: Vec<Segment>, color: String) -> Self {
        let angle = normalize_angle(angle);
        Self {
            id: Some(id),
            controller: Controller::Remote,
            position,
            angle,
            target_angle: angle,
            eye_angle: angle,
            speed: 0.0,
            boosting: false,
            segments,
            alive: true,
            score: 0,
            color,
        }
    }

    pub fn is_locally_simulated(&self) -> bool {
        self.controller != Controller::Remote
    }

    pub fn head(&self) -> Point {
        self.position
    }

    pub fn body(&self) -> &[Segment] {
        self.segments.get(1..).unwrap_or(&[])
    }

    pub fn distance_from_center(&self) -> f64 {
        length(self.position)
    }

    pub fn refresh_speed(&mut self, settings: &Settings) {
        self.speed = base_speed(self.controller, settings);
    }

    /// One steering step: ease heading toward `target_angle`, move the head, drag the chain.
    pub fn advance(&mut self, target_angle: f64, boosting: bool, settings: &Settings) {
        if !self.alive {
            return;
        }
        self.target_angle = normalize_angle(target_angle);
        self.boosting = boosting;
        self.angle = ease_angle(self.angle, self.target_angle, settings.head_turn_speed);
        self.eye_angle = ease_angle(self.eye_angle, self.target_angle, settings.eye_turn_speed);

        let speed = if boosting {
            self.speed * settings.boost_multiplier
        } else {
            self.speed
        };
        self.position.x += self.angle.cos() * speed;
        self.position.y += self.angle.sin() * speed;
        self.sync_head();
        follow_chain(&mut self.segments, settings.segment_distance);
    }

    /// Keeps segment 0 identical to the avatar's own position and heading.
    pub fn sync_head(&mut self) {
        let head = Segment::new(self.position, self.angle);
        match self.segments.first_mut() {
            Some(first) => *first = head,
            None => self.segments.push(head),
        }
    }

    /// Appends a tail segment on top of the current last one; the chain pulls it taut.
    pub fn grow_by_one(&mut self) {
        let tail = self
            .segments
            .last()
            .copied()
            .unwrap_or_else(|| Segment::new(self.position, self.angle));
        self.segments.push(tail);
    }

    /// Marks the avatar dead and returns one scattered pellet position per segment.
    pub fn die<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<Point> {
        self.alive = false;
        self.segments
            .iter()
            .map(|segment| jitter(rng, segment.position(), DEATH_SCATTER_RADIUS))
            .collect()
    }

    /// Whether this avatar's head is inside `other`'s body.
    pub fn check_collision(&self, other: &Snake) -> bool {
        if !self.alive || !other.alive {
            return false;
        }
        head_body_collision(self.head(), other.body(), COLLISION_RADIUS)
    }

    /// Rendered thickness grows slightly with score, capped.
    pub fn body_width(&self) -> f64 {
        let multiplier = 1.0 + self.score as f64 * BODY_WIDTH_PER_SCORE;
        (BODY_BASE_WIDTH * multiplier).min(BODY_MAX_WIDTH)
    }

    /// Heading the pupils are drawn along.
    pub fn pupil_angle(&self) -> f64 {
        match self.controller {
            Controller::Player => self.eye_angle,
            _ => self.angle,
        }
    }
}

fn base_speed(controller: Controller, settings: &Settings) -> f64 {
    match controller {
        Controller::Player => settings.player_speed,
        Controller::Bot => settings.bot_speed,
        Controller::Remote => 0.0,
    }
}
