use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One link of an avatar's body. Index 0 of a chain is always the head.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub angle: f64,
}

impl Segment {
    pub fn new(position: Point, angle: f64) -> Self {
        Self {
            x: position.x,
            y: position.y,
            angle,
        }
    }

    pub fn position(&self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pellet {
    /// Where the pellet is drawn; the magnet drifts it toward nearby heads.
    pub position: Point,
    /// Where the pellet was placed. Consumption and reports use this.
    pub origin: Point,
    pub color: String,
    pub size: f64,
    pub from_death: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Controller {
    Player,
    Bot,
    Remote,
}
