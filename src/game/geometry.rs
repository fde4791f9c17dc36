use super::constants::SEGMENT_HEADING_BLEND;
use super::math::{bearing, distance, distance_squared, ease_angle, length};
use super::types::{Point, Segment};

/// Pulls `follower` toward `leader` by exactly the amount it exceeds `spacing`,
/// easing its heading toward the direction of the pull. Followers already within
/// `spacing` are returned unchanged.
pub fn follow_segment(leader: Point, follower: Segment, spacing: f64) -> Segment {
    let follower_pos = follower.position();
    let dist = distance(leader, follower_pos);
    if dist <= spacing || dist == 0.0 {
        return follower;
    }
    let ratio = spacing / dist;
    let moved = Point {
        x: leader.x + (follower_pos.x - leader.x) * ratio,
        y: leader.y + (follower_pos.y - leader.y) * ratio,
    };
    let pull = bearing(follower_pos, leader);
    Segment {
        x: moved.x,
        y: moved.y,
        angle: ease_angle(follower.angle, pull, SEGMENT_HEADING_BLEND),
    }
}

/// Propagates the head's position down the chain. Each segment uses the already
/// updated position of the one before it, so lag never exceeds one tick.
pub fn follow_chain(segments: &mut [Segment], spacing: f64) {
    for index in 1..segments.len() {
        let leader = segments[index - 1].position();
        segments[index] = follow_segment(leader, segments[index], spacing);
    }
}

/// True when `head` lies strictly within `radius` of any segment in `body`.
/// Callers pass the other avatar's chain without its head.
pub fn head_body_collision(head: Point, body: &[Segment], radius: f64) -> bool {
    let radius_sq = radius * radius;
    body.iter()
        .any(|segment| distance_squared(head, segment.position()) < radius_sq)
}

/// Projects `point` back onto the circle of `radius` around the origin if it lies outside.
pub fn clamp_to_radius(point: Point, radius: f64) -> Point {
    let len = length(point);
    if len <= radius || len == 0.0 {
        return point;
    }
    Point {
        x: point.x / len * radius,
        y: point.y / len * radius,
    }
}
