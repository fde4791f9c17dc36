use crate::game::constants::RECONNECT_DELAY_MS;
use crate::protocol::{self, ClientMessage, ServerMessage};
use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NetEvent {
    Status(ConnectionStatus),
    Message(ServerMessage),
}

enum Outcome {
    Lost,
    Shutdown,
}

/// Socket I/O runs on a background task; the game loop talks to it through channels.
#[derive(Debug)]
pub struct NetClient {
    outbound_tx: UnboundedSender<ClientMessage>,
    inbound_rx: UnboundedReceiver<NetEvent>,
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl NetClient {
    /// Connects once. A failure here is returned to the caller instead of retried.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        Self::connect_with_delay(url, Duration::from_millis(RECONNECT_DELAY_MS)).await
    }

    pub async fn connect_with_delay(url: &str, reconnect_delay: Duration) -> anyhow::Result<Self> {
        let (socket, _) = connect_async(url)
            .await
            .with_context(|| format!("failed to connect to {url}"))?;
        tracing::info!(url, "connected");

        let (outbound_tx, outbound_rx) = unbounded_channel::<ClientMessage>();
        let (inbound_tx, inbound_rx) = unbounded_channel::<NetEvent>();
        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(connection_loop(
            url.to_string(),
            socket,
            reconnect_delay,
            outbound_rx,
            inbound_tx,
            Arc::clone(&shutdown),
        ));

        Ok(Self {
            outbound_tx,
            inbound_rx,
            shutdown,
            task,
        })
    }

    pub fn send(&self, message: ClientMessage) {
        let _ = self.outbound_tx.send(message);
    }

    pub fn try_recv(&mut self) -> Option<NetEvent> {
        self.inbound_rx.try_recv().ok()
    }

    pub async fn recv(&mut self) -> Option<NetEvent> {
        self.inbound_rx.recv().await
    }

    /// Closes the socket and stops any reconnect attempts.
    pub async fn close(self) {
        self.shutdown.notify_one();
        if let Err(error) = self.task.await {
            tracing::debug!(?error, "network task ended abnormally");
        }
    }
}

async fn connection_loop(
    url: String,
    mut socket: Socket,
    reconnect_delay: Duration,
    mut outbound_rx: UnboundedReceiver<ClientMessage>,
    inbound_tx: UnboundedSender<NetEvent>,
    shutdown: Arc<Notify>,
) {
    loop {
        let _ = inbound_tx.send(NetEvent::Status(ConnectionStatus::Connected));
        match pump(&mut socket, &mut outbound_rx, &inbound_tx, &shutdown).await {
            Outcome::Shutdown => {
                let _ = socket.close(None).await;
                return;
            }
            Outcome::Lost => {
                tracing::warn!(url = %url, "connection lost");
            }
        }

        socket = loop {
            let _ = inbound_tx.send(NetEvent::Status(ConnectionStatus::Reconnecting));
            tokio::select! {
                _ = tokio::time::sleep(reconnect_delay) => {}
                _ = shutdown.notified() => return,
            }
            // Reports queued while offline describe a stale avatar.
            while outbound_rx.try_recv().is_ok() {}
            match connect_async(url.as_str()).await {
                Ok((socket, _)) => {
                    tracing::info!(url = %url, "reconnected");
                    break socket;
                }
                Err(error) => tracing::warn!(url = %url, %error, "reconnect failed"),
            }
        };
    }
}

async fn pump(
    socket: &mut Socket,
    outbound_rx: &mut UnboundedReceiver<ClientMessage>,
    inbound_tx: &UnboundedSender<NetEvent>,
    shutdown: &Notify,
) -> Outcome {
    loop {
        tokio::select! {
            _ = shutdown.notified() => return Outcome::Shutdown,
            outbound = outbound_rx.recv() => {
                let Some(message) = outbound else { return Outcome::Shutdown };
                let Some(payload) = protocol::encode(&message) else { continue };
                if socket.send(Message::Text(payload)).await.is_err() {
                    return Outcome::Lost;
                }
            }
            inbound = socket.next() => match inbound {
                Some(Ok(Message::Text(text))) => match protocol::decode_server_message(&text) {
                    Some(message) => {
                        if inbound_tx.send(NetEvent::Message(message)).is_err() {
                            return Outcome::Shutdown;
                        }
                    }
                    None => tracing::warn!("dropping malformed server message"),
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return Outcome::Lost,
                Some(Ok(_)) => {}
            },
        }
    }
}
