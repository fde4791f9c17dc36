use super::*;

/// Whether `other` belongs in the interest set of a recipient at `viewer`.
/// Inclusion is strict: a peer exactly on the threshold is left out.
pub fn within_interest(viewer: Point, other: Point, threshold_sq: f64) -> bool {
    distance_squared(viewer, other) < threshold_sq
}

/// Builds one personalized `gameState` per recipient from a registry snapshot.
/// Dead peers are left out of everyone's list, on top of the distance test.
pub(super) fn personalized_snapshots(
    roster: &[PlayerState],
    threshold_sq: f64,
    timestamp: i64,
) -> Vec<(String, ServerMessage)> {
    roster
        .iter()
        .map(|me| {
            let players = roster
                .iter()
                .filter(|other| other.id != me.id && other.alive)
                .filter(|other| within_interest(me.position(), other.position(), threshold_sq))
                .map(RemotePlayer::from)
                .collect();
            let message = ServerMessage::GameState {
                current_player: CurrentPlayer::from(me.clone()),
                players,
                timestamp,
            };
            (me.id.clone(), message)
        })
        .collect()
}
