use crate::game::types::{Point, Segment};
use crate::protocol::PlayerState;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};

/// Single-slot outbox for per-tick snapshots. A newer frame replaces an unsent
/// older one, so a slow socket skips ticks instead of queueing them.
#[derive(Debug)]
pub struct LatestFrame {
    frame: StdMutex<Option<String>>,
    notify: Notify,
}

impl LatestFrame {
    pub(crate) fn new() -> Self {
        Self {
            frame: StdMutex::new(None),
            notify: Notify::new(),
        }
    }

    pub(crate) fn store(&self, payload: String) {
        *self.frame.lock().unwrap_or_else(PoisonError::into_inner) = Some(payload);
        self.notify.notify_one();
    }

    pub fn take_latest(&self) -> Option<String> {
        self.frame.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    pub async fn wait_for_update(&self) {
        self.notify.notified().await;
    }
}

/// Avatar state as last reported by the peer's own client.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportedState {
    pub position: Point,
    pub angle: f64,
    pub segments: Vec<Segment>,
    pub score: u32,
}

#[derive(Debug)]
pub(crate) struct SessionEntry {
    pub(crate) position: Point,
    pub(crate) angle: f64,
    pub(crate) segments: Vec<Segment>,
    pub(crate) score: u32,
    pub(crate) alive: bool,
    pub(crate) color: String,
    pub(crate) outbound_state: Arc<LatestFrame>,
    pub(crate) outbound_events: mpsc::Sender<String>,
    pub(crate) close: Arc<Notify>,
}

impl SessionEntry {
    pub(crate) fn overwrite(&mut self, reported: ReportedState) {
        self.position = reported.position;
        self.angle = reported.angle;
        self.segments = reported.segments;
        self.score = reported.score;
    }

    pub(crate) fn player_state(&self, id: &str) -> PlayerState {
        PlayerState {
            id: id.to_string(),
            x: self.position.x,
            y: self.position.y,
            angle: self.angle,
            segments: self.segments.clone(),
            score: self.score,
            alive: self.alive,
            color: self.color.clone(),
        }
    }

    /// Queues a notification without waiting. Returns false when it was dropped.
    pub(crate) fn send_event(&self, session_id: &str, payload: String) -> bool {
        match self.outbound_events.try_send(payload) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(session_id, "event queue full; dropping notification");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

pub struct SessionIo {
    pub session_id: String,
    pub outbound_state: Arc<LatestFrame>,
    pub outbound_events_rx: mpsc::Receiver<String>,
    /// Fired when the server decides to end this connection.
    pub close: Arc<Notify>,
}
