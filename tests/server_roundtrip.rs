use futures_util::{SinkExt, StreamExt};
use slither_arena::app::settings::{Settings, SettingsStore};
use slither_arena::app::time::now_millis;
use slither_arena::client::net::{ConnectionStatus, NetClient, NetEvent};
use slither_arena::game::room::Room;
use slither_arena::game::types::{Point, Segment};
use slither_arena::protocol::{self, ClientMessage, ServerMessage};
use slither_arena::room_runtime;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    url: String,
    room: Arc<Room>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let _ = timeout(WAIT, self.handle).await;
    }
}

fn make_settings() -> Settings {
    let mut settings = Settings::default();
    settings.food_count = 20;
    settings.multiplayer.update_rate = 30;
    settings.multiplayer.view_distance = 1000.0;
    settings
}

async fn make_server(settings: Settings) -> TestServer {
    let room = Arc::new(
        Room::new(SettingsStore::new(settings)).with_death_disconnect_delay(Duration::from_millis(100)),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let address = listener.local_addr().expect("local addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(room_runtime::serve(listener, Arc::clone(&room), async move {
        let _ = shutdown_rx.await;
    }));
    TestServer {
        url: format!("ws://{address}/ws"),
        room,
        shutdown: Some(shutdown_tx),
        handle,
    }
}

async fn make_client(url: &str) -> Client {
    let (client, _) = timeout(WAIT, connect_async(url))
        .await
        .expect("connect timed out")
        .expect("connect");
    client
}

/// Next decoded server message; `None` once the connection is gone.
async fn next_message(client: &mut Client) -> Option<ServerMessage> {
    loop {
        let frame = timeout(WAIT, client.next()).await.expect("no message in time");
        match frame {
            Some(Ok(Message::Text(text))) => {
                return Some(protocol::decode_server_message(&text).expect("server sent valid json"));
            }
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
            Some(Ok(_)) => {}
        }
    }
}

async fn wait_for(client: &mut Client, mut matches: impl FnMut(&ServerMessage) -> bool) -> ServerMessage {
    loop {
        let message = next_message(client).await.expect("connection closed while waiting");
        if matches(&message) {
            return message;
        }
    }
}

async fn join(url: &str) -> (Client, String) {
    let mut client = make_client(url).await;
    let init = wait_for(&mut client, |message| matches!(message, ServerMessage::Init { .. })).await;
    let ServerMessage::Init { player_id, .. } = init else { unreachable!() };
    (client, player_id)
}

async fn send(client: &mut Client, message: &ClientMessage) {
    let payload = protocol::encode(message).expect("encode");
    client.send(Message::Text(payload)).await.expect("send");
}

fn make_update(x: f64, y: f64, score: u32) -> ClientMessage {
    ClientMessage::Update {
        x,
        y,
        angle: 0.5,
        segments: vec![
            Segment::new(Point::new(x, y), 0.5),
            Segment::new(Point::new(x - 5.0, y), 0.5),
        ],
        score,
    }
}

async fn wait_until_reported(room: &Room, session_id: &str, x: f64) {
    timeout(WAIT, async {
        while room.player_state(session_id).map(|state| state.x) != Some(x) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("update never reached the room");
}

#[tokio::test]
async fn join_then_update_is_stored_verbatim() {
    let server = make_server(make_settings()).await;
    let mut client = make_client(&server.url).await;

    let init = wait_for(&mut client, |message| matches!(message, ServerMessage::Init { .. })).await;
    let ServerMessage::Init {
        player_id,
        foods,
        players,
    } = init
    else {
        unreachable!()
    };
    assert_eq!(foods.len(), 20);
    assert!(players.iter().any(|player| player.id == player_id));

    let segments = vec![
        Segment::new(Point::new(123.25, -45.5), 1.25),
        Segment::new(Point::new(118.0, -47.0), 1.1),
    ];
    send(
        &mut client,
        &ClientMessage::Update {
            x: 123.25,
            y: -45.5,
            angle: 1.25,
            segments: segments.clone(),
            score: 7,
        },
    )
    .await;
    wait_until_reported(&server.room, &player_id, 123.25).await;

    let state = server.room.player_state(&player_id).expect("session");
    assert_eq!(state.y, -45.5);
    assert_eq!(state.angle, 1.25);
    assert_eq!(state.segments, segments);
    assert_eq!(state.score, 7);

    let game_state = wait_for(&mut client, |message| match message {
        ServerMessage::GameState { current_player, .. } => current_player.state.x == 123.25,
        _ => false,
    })
    .await;
    let ServerMessage::GameState { current_player, .. } = game_state else { unreachable!() };
    assert!(current_player.is_current_player);
    assert_eq!(current_player.state.score, 7);

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn snapshots_only_carry_peers_inside_view_distance() {
    let server = make_server(make_settings()).await;
    let (mut viewer, viewer_id) = join(&server.url).await;
    let (mut near, near_id) = join(&server.url).await;
    let (mut far, far_id) = join(&server.url).await;

    send(&mut viewer, &make_update(0.0, 0.0, 0)).await;
    send(&mut near, &make_update(300.0, 0.0, 0)).await;
    send(&mut far, &make_update(1800.0, 0.0, 0)).await;
    wait_until_reported(&server.room, &viewer_id, 0.0).await;
    wait_until_reported(&server.room, &near_id, 300.0).await;
    wait_until_reported(&server.room, &far_id, 1800.0).await;
    let settled_at = now_millis();

    let snapshot = wait_for(&mut viewer, |message| match message {
        ServerMessage::GameState { timestamp, .. } => *timestamp > settled_at,
        _ => false,
    })
    .await;
    let ServerMessage::GameState { players, .. } = snapshot else { unreachable!() };
    let ids: Vec<&str> = players.iter().map(|player| player.id.as_str()).collect();
    assert_eq!(ids, vec![near_id.as_str()]);
    assert!(players[0].is_other_player);
    assert_eq!(players[0].x, 300.0);

    drop((viewer, near, far));
    server.stop().await;
}

#[tokio::test]
async fn death_is_broadcast_and_closes_the_connection() {
    let server = make_server(make_settings()).await;
    let (mut victim, victim_id) = join(&server.url).await;
    let (mut witness, _) = join(&server.url).await;

    send(
        &mut victim,
        &ClientMessage::Died {
            food_positions: vec![Point::new(10.0, 10.0), Point::new(15.0, 10.0), Point::new(20.0, 10.0)],
        },
    )
    .await;

    let died = wait_for(&mut witness, |message| matches!(message, ServerMessage::PlayerDied { .. })).await;
    let ServerMessage::PlayerDied {
        player_id,
        new_foods,
    } = died
    else {
        unreachable!()
    };
    assert_eq!(player_id, victim_id);
    assert_eq!(new_foods.len(), 3);
    assert!(new_foods.iter().all(|food| food.from_dead_snake));

    let own_death = wait_for(&mut victim, |message| matches!(message, ServerMessage::PlayerDied { .. })).await;
    assert!(matches!(&own_death, ServerMessage::PlayerDied { player_id, .. } if *player_id == victim_id));
    let close_frame = timeout(WAIT, async {
        loop {
            match victim.next().await {
                Some(Ok(Message::Close(_))) => return true,
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => return false,
            }
        }
    })
    .await
    .expect("victim connection stayed open");
    assert!(close_frame, "connection dropped without a close frame");

    let left = wait_for(&mut witness, |message| matches!(message, ServerMessage::PlayerLeft { .. })).await;
    assert_eq!(
        left,
        ServerMessage::PlayerLeft {
            player_id: victim_id.clone()
        }
    );
    assert_eq!(server.room.session_count(), 1);

    drop(witness);
    server.stop().await;
}

async fn next_net_event(net: &mut NetClient, mut matches: impl FnMut(&NetEvent) -> bool) -> NetEvent {
    loop {
        let event = timeout(WAIT, net.recv())
            .await
            .expect("no network event in time")
            .expect("network task ended");
        if matches(&event) {
            return event;
        }
    }
}

fn is_init(event: &NetEvent) -> bool {
    matches!(event, NetEvent::Message(ServerMessage::Init { .. }))
}

#[tokio::test]
async fn client_reconnects_after_the_server_drops_it() {
    let server = make_server(make_settings()).await;
    let mut net = NetClient::connect_with_delay(&server.url, Duration::from_millis(50))
        .await
        .expect("first connection");

    assert_eq!(
        next_net_event(&mut net, |_| true).await,
        NetEvent::Status(ConnectionStatus::Connected)
    );
    let NetEvent::Message(ServerMessage::Init { player_id: first_id, .. }) = next_net_event(&mut net, is_init).await
    else {
        unreachable!()
    };

    // Dying makes the server end the connection shortly after.
    net.send(ClientMessage::Died {
        food_positions: Vec::new(),
    });

    next_net_event(&mut net, |event| {
        matches!(event, NetEvent::Status(ConnectionStatus::Reconnecting))
    })
    .await;
    let after = next_net_event(&mut net, |event| !matches!(event, NetEvent::Message(_))).await;
    assert_eq!(after, NetEvent::Status(ConnectionStatus::Connected));
    let NetEvent::Message(ServerMessage::Init { player_id: second_id, .. }) = next_net_event(&mut net, is_init).await
    else {
        unreachable!()
    };
    assert_ne!(first_id, second_id);

    timeout(WAIT, net.close()).await.expect("close finished");
    timeout(WAIT, async {
        while server.room.session_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("sessions cleaned up after close");

    server.stop().await;
}

#[tokio::test]
async fn close_interrupts_the_reconnect_backoff() {
    let server = make_server(make_settings()).await;
    let mut net = NetClient::connect_with_delay(&server.url, Duration::from_secs(60))
        .await
        .expect("first connection");
    next_net_event(&mut net, is_init).await;

    net.send(ClientMessage::Died {
        food_positions: Vec::new(),
    });
    next_net_event(&mut net, |event| {
        matches!(event, NetEvent::Status(ConnectionStatus::Reconnecting))
    })
    .await;

    timeout(Duration::from_secs(1), net.close())
        .await
        .expect("close waited out the backoff");
    assert_eq!(server.room.session_count(), 0);

    server.stop().await;
}
