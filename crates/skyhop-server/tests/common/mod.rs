use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use skyhop_core::net::messages::{
    ClientMessage, CollectItemMsg, JoinMsg, PlayerUpdateMsg, PositionMsg, ServerMessage,
};
use skyhop_core::net::protocol::{decode_server_message, encode_client_message};

use skyhop_server::build_app;
use skyhop_server::config::ServerConfig;
use skyhop_server::state::AppState;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, state) = build_app(config);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            state,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Send a ClientMessage as a text frame.
pub async fn ws_send_client_msg(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Text(encoded.into())).await.unwrap();
}

/// Send a raw text frame.
pub async fn ws_send_text(stream: &mut WsStream, text: &str) {
    stream.send(Message::Text(text.to_string().into())).await.unwrap();
}

/// Join as `player_id` and consume the `playerJoined` + `gameState` pair.
/// Returns whether this player was announced as host.
pub async fn ws_join(stream: &mut WsStream, player_id: &str, name: Option<&str>) -> bool {
    let msg = ClientMessage::Join(JoinMsg {
        player_id: player_id.to_string(),
        name: name.map(str::to_string),
        timestamp: 0,
    });
    ws_send_client_msg(stream, &msg).await;

    let is_host = match ws_read_server_msg(stream).await {
        ServerMessage::PlayerJoined(j) => {
            assert_eq!(j.player_id, player_id);
            j.is_host
        },
        other => panic!("Expected PlayerJoined, got: {other:?}"),
    };
    match ws_read_server_msg(stream).await {
        ServerMessage::GameState(_) => {},
        other => panic!("Expected GameState, got: {other:?}"),
    }
    is_host
}

pub async fn ws_send_position(stream: &mut WsStream, player_id: &str, position: PositionMsg) {
    let msg = ClientMessage::PlayerUpdate(PlayerUpdateMsg {
        player_id: player_id.to_string(),
        position,
        timestamp: 0,
    });
    ws_send_client_msg(stream, &msg).await;
}

pub async fn ws_collect(stream: &mut WsStream, player_id: &str, collectible_id: &str) {
    let msg = ClientMessage::CollectItem(CollectItemMsg {
        player_id: player_id.to_string(),
        collectible_id: collectible_id.to_string(),
        timestamp: 0,
    });
    ws_send_client_msg(stream, &msg).await;
}

/// Read the next text frame (5s timeout).
pub async fn ws_read_raw(stream: &mut WsStream) -> String {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(data))) => return data.as_str().to_string(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read a text frame, returning None on timeout.
pub async fn ws_try_read_raw(stream: &mut WsStream, timeout_ms: u64) -> Option<String> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(data))) => return data.as_str().to_string(),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    panic!("WebSocket error or closed")
                },
                _ => continue,
            }
        }
    })
    .await
    .ok()
}

/// Read the next ServerMessage (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let data = ws_read_raw(stream).await;
    decode_server_message(&data).unwrap()
}

/// POST a registration body and return (status, json body).
pub async fn post_collectibles(
    server: &TestServer,
    body: serde_json::Value,
) -> (u16, serde_json::Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}/api/collectibles", server.base_url()))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

pub fn position(x: f32, y: f32) -> PositionMsg {
    PositionMsg {
        x,
        y,
        width: 40.0,
        height: 50.0,
        grow_level: 0,
    }
}
