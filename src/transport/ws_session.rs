use crate::game::constants::SESSION_FLUSH_TIMEOUT_MS;
use crate::game::room::Room;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const SESSION_FLUSH_TIMEOUT: Duration = Duration::from_millis(SESSION_FLUSH_TIMEOUT_MS);

pub async fn handle_socket(socket: WebSocket, room: Arc<Room>) {
    let (mut sender, mut receiver) = socket.split();
    let session = room.add_session().await;
    let session_id = session.session_id;
    let outbound_state = session.outbound_state;
    let mut outbound_events_rx = session.outbound_events_rx;
    let close = session.close;

    let mut send_task = tokio::spawn(async move {
        use std::collections::VecDeque;

        let mut pending_events: VecDeque<String> = VecDeque::new();
        let mut pending_state: Option<String> = None;

        loop {
            tokio::select! {
                payload = outbound_events_rx.recv() => match payload {
                    Some(payload) => pending_events.push_back(payload),
                    // Session removed and its queue drained.
                    None => {
                        let _ = sender.send(Message::Close(None)).await;
                        return;
                    }
                },
                _ = outbound_state.wait_for_update() => {}
            }

            while let Ok(payload) = outbound_events_rx.try_recv() {
                pending_events.push_back(payload);
            }
            if let Some(payload) = outbound_state.take_latest() {
                pending_state = Some(payload);
            }

            // Roster and food notifications go out before the snapshot that may depend on them.
            while let Some(payload) = pending_events.pop_front() {
                if sender.send(Message::Text(payload)).await.is_err() {
                    return;
                }
            }

            if let Some(payload) = pending_state.take() {
                if sender.send(Message::Text(payload)).await.is_err() {
                    return;
                }
            }
        }
    });

    loop {
        tokio::select! {
            _ = close.notified() => {
                tracing::debug!(session_id = %session_id, "closing session after death");
                break;
            }
            result = receiver.next() => {
                let Some(Ok(message)) = result else { break };
                match message {
                    Message::Text(text) => room.handle_text_message(&session_id, &text).await,
                    Message::Binary(_) => {
                        tracing::warn!(session_id = %session_id, "ignoring binary frame");
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    // Dropping the registry entry closes the event queue, so the writer sends
    // whatever is still queued, then a close frame.
    room.remove_session(&session_id).await;
    if timeout(SESSION_FLUSH_TIMEOUT, &mut send_task).await.is_err() {
        tracing::debug!(session_id = %session_id, "writer did not flush in time");
        send_task.abort();
    }
}
