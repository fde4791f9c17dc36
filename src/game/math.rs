use super::types::Point;
use rand::Rng;
use std::f64::consts::{PI, TAU};

/// Wraps any angle into (-PI, PI].
pub fn normalize_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

pub fn shortest_delta(target: f64, current: f64) -> f64 {
    normalize_angle(target - current)
}

/// Moves `current` a fraction `rate` of the way toward `target` along the shorter arc.
pub fn ease_angle(current: f64, target: f64, rate: f64) -> f64 {
    normalize_angle(current + shortest_delta(target, current) * rate)
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

pub fn distance_squared(a: Point, b: Point) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

pub fn distance(a: Point, b: Point) -> f64 {
    distance_squared(a, b).sqrt()
}

pub fn length(point: Point) -> f64 {
    (point.x * point.x + point.y * point.y).sqrt()
}

/// Heading of the straight line running from `from` to `to`.
pub fn bearing(from: Point, to: Point) -> f64 {
    (to.y - from.y).atan2(to.x - from.x)
}

pub fn point_from_polar(angle: f64, radius: f64) -> Point {
    Point {
        x: angle.cos() * radius,
        y: angle.sin() * radius,
    }
}

pub fn random_angle<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen::<f64>() * TAU
}

/// Uniform point inside the axis-aligned square of side `world_size` centered on the origin.
pub fn random_world_point<R: Rng + ?Sized>(rng: &mut R, world_size: f64) -> Point {
    Point {
        x: (rng.gen::<f64>() - 0.5) * world_size,
        y: (rng.gen::<f64>() - 0.5) * world_size,
    }
}

pub fn jitter<R: Rng + ?Sized>(rng: &mut R, origin: Point, max_radius: f64) -> Point {
    let angle = random_angle(rng);
    let radius = rng.gen::<f64>() * max_radius;
    let offset = point_from_polar(angle, radius);
    Point {
        x: origin.x + offset.x,
        y: origin.y + offset.y,
    }
}
