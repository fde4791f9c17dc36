//! Smooths remote avatars between discrete server snapshots.
//!
//! Each peer keeps its two most recent captures. A single blend factor runs
//! from 0 toward 1 across render frames and snaps back to 0 whenever a new
//! snapshot lands, so the render rate stays independent of the tick rate.

use crate::game::math::{lerp, normalize_angle, shortest_delta};
use crate::game::types::{Point, Segment};
use crate::protocol::RemotePlayer;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub position: Point,
    pub angle: f64,
    pub segments: Vec<Segment>,
    pub captured_at: i64,
}

impl Capture {
    pub fn from_remote(player: &RemotePlayer, captured_at: i64) -> Self {
        Self {
            position: Point::new(player.x, player.y),
            angle: player.angle,
            segments: player.segments.clone(),
            captured_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotPair {
    pub previous: Option<Capture>,
    pub current: Capture,
}

#[derive(Debug, Clone)]
pub struct Interpolator {
    peers: HashMap<String, SnapshotPair>,
    blend: f64,
    step: f64,
    enabled: bool,
}

impl Interpolator {
    /// `step` is the per-frame blend advance; with `enabled` false peers snap
    /// straight to their latest capture.
    pub fn new(step: f64, enabled: bool) -> Self {
        Self {
            peers: HashMap::new(),
            blend: 0.0,
            step: step.clamp(0.0, 1.0),
            enabled,
        }
    }

    pub fn blend(&self) -> f64 {
        self.blend
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.peers.contains_key(id)
    }

    pub fn pair(&self, id: &str) -> Option<&SnapshotPair> {
        self.peers.get(id)
    }

    /// Takes in one snapshot's worth of peers. Known peers demote their current
    /// capture to previous; peers absent from the snapshot are forgotten, so a
    /// peer that comes back later starts over with no history.
    pub fn apply_snapshot(&mut self, captures: impl IntoIterator<Item = (String, Capture)>) {
        let mut next = HashMap::with_capacity(self.peers.len());
        for (id, capture) in captures {
            let previous = self.peers.remove(&id).map(|pair| pair.current);
            next.insert(
                id,
                SnapshotPair {
                    previous,
                    current: capture,
                },
            );
        }
        self.peers = next;
        self.blend = 0.0;
    }

    pub fn remove(&mut self, id: &str) -> Option<SnapshotPair> {
        self.peers.remove(id)
    }

    /// Called once per rendered frame.
    pub fn advance_frame(&mut self) {
        self.blend = (self.blend + self.step).min(1.0);
    }

    pub fn view(&self, id: &str) -> Option<Capture> {
        self.peers.get(id).map(|pair| self.blended(pair))
    }

    pub fn views(&self) -> impl Iterator<Item = (&str, Capture)> + '_ {
        self.peers
            .iter()
            .map(|(id, pair)| (id.as_str(), self.blended(pair)))
    }

    fn blended(&self, pair: &SnapshotPair) -> Capture {
        match &pair.previous {
            Some(previous) if self.enabled => blend_captures(previous, &pair.current, self.blend),
            _ => pair.current.clone(),
        }
    }
}

pub fn blend_captures(previous: &Capture, current: &Capture, t: f64) -> Capture {
    if t >= 1.0 {
        return current.clone();
    }
    let segments = current
        .segments
        .iter()
        .enumerate()
        .map(|(index, target)| match previous.segments.get(index) {
            Some(from) => Segment {
                x: lerp(from.x, target.x, t),
                y: lerp(from.y, target.y, t),
                angle: blend_angle(from.angle, target.angle, t),
            },
            None => *target,
        })
        .collect();
    Capture {
        position: Point {
            x: lerp(previous.position.x, current.position.x, t),
            y: lerp(previous.position.y, current.position.y, t),
        },
        angle: blend_angle(previous.angle, current.angle, t),
        segments,
        captured_at: current.captured_at,
    }
}

fn blend_angle(from: f64, to: f64, t: f64) -> f64 {
    normalize_angle(from + shortest_delta(to, from) * t)
}
