use super::constants::{MAGNET_PULL, NEUTRAL_FOOD_COLOR};
use super::math::{distance, distance_squared, random_world_point};
use super::types::{Pellet, Point};
use crate::app::settings::Settings;
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone)]
struct PelletStyle {
    colored: bool,
    size: f64,
    palette: Vec<String>,
}

impl PelletStyle {
    fn from_settings(settings: &Settings) -> Self {
        Self {
            colored: settings.colored_food,
            size: settings.food_size,
            palette: settings.colors.clone(),
        }
    }

    fn pick_color<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        if !self.colored {
            return NEUTRAL_FOOD_COLOR.to_string();
        }
        self.palette
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| NEUTRAL_FOOD_COLOR.to_string())
    }
}

/// The set of consumable pellets in the world.
#[derive(Debug, Clone)]
pub struct FoodField {
    pellets: Vec<Pellet>,
    world_size: f64,
    style: PelletStyle,
}

impl FoodField {
    pub fn new(settings: &Settings) -> Self {
        Self {
            pellets: Vec::new(),
            world_size: settings.world_size,
            style: PelletStyle::from_settings(settings),
        }
    }

    pub fn len(&self) -> usize {
        self.pellets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pellets.is_empty()
    }

    pub fn pellets(&self) -> &[Pellet] {
        &self.pellets
    }

    pub fn spawn_one<R: Rng + ?Sized>(&mut self, rng: &mut R) -> &Pellet {
        let position = random_world_point(rng, self.world_size);
        self.push_pellet(position, false, rng)
    }

    /// Removes and returns the first pellet whose placed position is strictly
    /// within `radius` of `position`. Magnet drift does not count.
    pub fn consume_near(&mut self, position: Point, radius: f64) -> Option<Pellet> {
        let radius_sq = radius * radius;
        let index = self
            .pellets
            .iter()
            .position(|pellet| distance_squared(pellet.origin, position) < radius_sq)?;
        Some(self.pellets.remove(index))
    }

    /// Removes the pellet closest to `position`, if one lies within `tolerance`.
    pub fn consume_matching(&mut self, position: Point, tolerance: f64) -> Option<Pellet> {
        let (index, dist) = self
            .pellets
            .iter()
            .enumerate()
            .map(|(index, pellet)| (index, distance(pellet.origin, position)))
            .min_by(|a, b| a.1.total_cmp(&b.1))?;
        if dist > tolerance {
            return None;
        }
        Some(self.pellets.remove(index))
    }

    /// Spawns pellets one at a time until the field holds `target` of them.
    /// Returns how many were created.
    pub fn replenish_to<R: Rng + ?Sized>(&mut self, target: usize, rng: &mut R) -> usize {
        let mut spawned = 0;
        while self.pellets.len() < target {
            self.spawn_one(rng);
            spawned += 1;
        }
        spawned
    }

    /// Drops pellets from the end until at most `target` remain.
    pub fn trim_to(&mut self, target: usize) {
        self.pellets.truncate(target);
    }

    /// Adds pellets at exact positions left behind by a dying avatar.
    pub fn scatter_from_death<R: Rng + ?Sized>(&mut self, positions: &[Point], rng: &mut R) -> Vec<Pellet> {
        positions
            .iter()
            .map(|position| self.push_pellet(*position, true, rng).clone())
            .collect()
    }

    /// Drifts the drawn position of each pellet inside `radius` of its nearest
    /// head toward that head, harder the closer it already is. Placement is
    /// left alone.
    pub fn attract(&mut self, heads: &[Point], radius: f64) {
        if heads.is_empty() || radius <= 0.0 {
            return;
        }
        for pellet in &mut self.pellets {
            let nearest = heads
                .iter()
                .map(|head| (*head, distance(*head, pellet.position)))
                .min_by(|a, b| a.1.total_cmp(&b.1));
            let Some((head, dist)) = nearest else { continue };
            if dist >= radius {
                continue;
            }
            let attraction = (1.0 - dist / radius) * 2.0;
            pellet.position.x += (head.x - pellet.position.x) * attraction * MAGNET_PULL;
            pellet.position.y += (head.y - pellet.position.y) * attraction * MAGNET_PULL;
        }
    }

    /// Replaces the whole field, e.g. with the server's authoritative list.
    pub fn replace_all<R: Rng + ?Sized>(&mut self, entries: impl IntoIterator<Item = (Point, bool)>, rng: &mut R) {
        self.pellets.clear();
        for (position, from_death) in entries {
            self.push_pellet(position, from_death, rng);
        }
    }

    /// Re-reads world bounds and pellet appearance from a new settings snapshot.
    pub fn apply_settings<R: Rng + ?Sized>(&mut self, settings: &Settings, rng: &mut R) {
        self.world_size = settings.world_size;
        let style = PelletStyle::from_settings(settings);
        let recolor = style.colored != self.style.colored || style.palette != self.style.palette;
        self.style = style;
        for pellet in &mut self.pellets {
            pellet.size = self.style.size;
            if recolor {
                pellet.color = self.style.pick_color(rng);
            }
        }
    }

    fn push_pellet<R: Rng + ?Sized>(&mut self, position: Point, from_death: bool, rng: &mut R) -> &Pellet {
        let pellet = Pellet {
            position,
            origin: position,
            color: self.style.pick_color(rng),
            size: self.style.size,
            from_death,
        };
        self.pellets.push(pellet);
        &self.pellets[self.pellets.len() - 1]
    }
}
