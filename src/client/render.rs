use super::net::ConnectionStatus;
use super::runtime::Phase;
use crate::game::snake::Snake;
use crate::game::types::{Pellet, Point, Segment};

/// Everything a renderer needs for one frame. Write-only from the simulation's side.
#[derive(Debug, Clone)]
pub struct RenderFrame {
    pub camera: Point,
    pub snakes: Vec<SnakeView>,
    pub pellets: Vec<PelletView>,
    pub score: u32,
    pub phase: Phase,
    pub status: Option<ConnectionStatus>,
}

#[derive(Debug, Clone)]
pub struct SnakeView {
    pub id: Option<String>,
    pub is_player: bool,
    pub position: Point,
    pub angle: f64,
    pub pupil_angle: f64,
    pub width: f64,
    pub color: String,
    pub segments: Vec<Segment>,
}

impl SnakeView {
    pub fn of(snake: &Snake, is_player: bool) -> Self {
        Self {
            id: snake.id.clone(),
            is_player,
            position: snake.position,
            angle: snake.angle,
            pupil_angle: snake.pupil_angle(),
            width: snake.body_width(),
            color: snake.color.clone(),
            segments: snake.segments.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PelletView {
    pub position: Point,
    pub color: String,
    pub size: f64,
}

impl From<&Pellet> for PelletView {
    fn from(pellet: &Pellet) -> Self {
        Self {
            position: pellet.position,
            color: pellet.color.clone(),
            size: pellet.size,
        }
    }
}

pub trait RenderSink {
    fn present(&mut self, frame: &RenderFrame);
}

/// Headless sink that logs a one-line summary every `every` frames.
#[derive(Debug)]
pub struct TracingSink {
    every: u64,
    frames: u64,
}

impl TracingSink {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            frames: 0,
        }
    }
}

impl RenderSink for TracingSink {
    fn present(&mut self, frame: &RenderFrame) {
        self.frames += 1;
        if self.frames % self.every != 0 {
            return;
        }
        tracing::info!(
            frame = self.frames,
            phase = ?frame.phase,
            status = ?frame.status,
            x = frame.camera.x,
            y = frame.camera.y,
            score = frame.score,
            snakes = frame.snakes.len(),
            pellets = frame.pellets.len(),
            "frame"
        );
    }
}
