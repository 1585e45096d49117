// ABOUTME: Integration tests for the WebSocket terminal client against a local tungstenite server
// Covers initial resize, output ordering, input, reconnect after drops, and intentional closes

use futures_util::{SinkExt, StreamExt};
use labterm::terminal::connection::{
    CLOSED_BANNER, CONNECTED_BANNER, CONNECTING_BANNER, RECONNECTING_BANNER,
};
use labterm::terminal::{
    ConnectionState, ReconnectConfig, SurfaceEvent, TerminalSize, WebSocketTerminalClient,
};
use std::borrow::Cow;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use url::Url;

type ServerSocket = WebSocketStream<TcpStream>;

const WAIT: Duration = Duration::from_secs(5);

/// Accepts WebSocket upgrades and hands each socket to the test.
async fn start_server() -> (Url, mpsc::UnboundedReceiver<ServerSocket>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            if let Ok(socket) = accept_async(stream).await {
                if tx.send(socket).is_err() {
                    break;
                }
            }
        }
    });
    let url = Url::parse(&format!("ws://127.0.0.1:{port}/api/v1/terminals/t-1/attach")).unwrap();
    (url, rx)
}

fn fast_reconnect(base_delay_ms: u64) -> ReconnectConfig {
    ReconnectConfig {
        base_delay_ms,
        multiplier: 1.0,
        max_delay_ms: base_delay_ms,
        max_jitter_ms: 0,
        ..ReconnectConfig::default()
    }
}

async fn next_event(surface: &mut mpsc::UnboundedReceiver<SurfaceEvent>) -> SurfaceEvent {
    timeout(WAIT, surface.recv())
        .await
        .expect("timed out waiting for surface event")
        .expect("surface channel closed")
}

/// Skip surface events until `line` is written.
async fn wait_for_line(surface: &mut mpsc::UnboundedReceiver<SurfaceEvent>, line: &str) {
    loop {
        if next_event(surface).await == SurfaceEvent::Line(line.to_string()) {
            return;
        }
    }
}

async fn accept(server: &mut mpsc::UnboundedReceiver<ServerSocket>) -> ServerSocket {
    timeout(WAIT, server.recv())
        .await
        .expect("timed out waiting for client connection")
        .expect("server stopped")
}

async fn next_frame(socket: &mut ServerSocket) -> Message {
    timeout(WAIT, socket.next())
        .await
        .expect("timed out waiting for client frame")
        .expect("client stream ended")
        .expect("client stream error")
}

async fn connected_client(
    config: ReconnectConfig,
) -> (
    WebSocketTerminalClient,
    mpsc::UnboundedReceiver<SurfaceEvent>,
    mpsc::UnboundedReceiver<ServerSocket>,
    ServerSocket,
) {
    let (url, mut server) = start_server().await;
    let (client, mut surface) = WebSocketTerminalClient::spawn(url, config);
    client.send_resize(TerminalSize::new(80, 24).unwrap());
    client.connect();

    let socket = accept(&mut server).await;
    wait_for_line(&mut surface, CONNECTED_BANNER).await;
    (client, surface, server, socket)
}

#[tokio::test]
async fn test_connect_writes_banners_and_sends_initial_resize() {
    let (url, mut server) = start_server().await;
    let (client, mut surface) = WebSocketTerminalClient::spawn(url, ReconnectConfig::default());
    assert_eq!(client.state(), ConnectionState::Disconnected);

    client.send_resize(TerminalSize::new(80, 24).unwrap());
    client.connect();

    let mut socket = accept(&mut server).await;
    assert_eq!(next_frame(&mut socket).await, Message::Binary(vec![1, 0, 80, 0, 24]));

    assert_eq!(next_event(&mut surface).await, SurfaceEvent::Line(CONNECTING_BANNER.to_string()));
    assert_eq!(next_event(&mut surface).await, SurfaceEvent::Reset);
    assert_eq!(next_event(&mut surface).await, SurfaceEvent::Line(CONNECTED_BANNER.to_string()));
    assert_eq!(next_event(&mut surface).await, SurfaceEvent::Line(String::new()));
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_output_reaches_surface_in_order() {
    let (_client, mut surface, _server, mut socket) = connected_client(ReconnectConfig::default()).await;
    // Drain the trailing blank line after the connected banner
    assert_eq!(next_event(&mut surface).await, SurfaceEvent::Line(String::new()));

    socket.send(Message::Text("$ ".to_string())).await.unwrap();
    socket.send(Message::Binary(b"kubectl get pods\r\n".to_vec())).await.unwrap();
    socket.send(Message::Text("No resources found".to_string())).await.unwrap();

    assert_eq!(next_event(&mut surface).await, SurfaceEvent::Output(b"$ ".to_vec()));
    assert_eq!(
        next_event(&mut surface).await,
        SurfaceEvent::Output(b"kubectl get pods\r\n".to_vec())
    );
    assert_eq!(
        next_event(&mut surface).await,
        SurfaceEvent::Output(b"No resources found".to_vec())
    );
}

#[tokio::test]
async fn test_input_and_resize_reach_server() {
    let (client, _surface, _server, mut socket) = connected_client(ReconnectConfig::default()).await;
    assert_eq!(next_frame(&mut socket).await, Message::Binary(vec![1, 0, 80, 0, 24]));

    client.send_input("ls -la\r");
    assert_eq!(next_frame(&mut socket).await, Message::Text("ls -la\r".to_string()));

    client.send_resize(TerminalSize::new(132, 43).unwrap());
    assert_eq!(next_frame(&mut socket).await, Message::Binary(vec![1, 0, 132, 0, 43]));
}

#[tokio::test]
async fn test_unexpected_drop_reconnects() {
    let (client, mut surface, mut server, socket) = connected_client(fast_reconnect(20)).await;
    drop(socket);

    wait_for_line(&mut surface, RECONNECTING_BANNER).await;
    let mut second = accept(&mut server).await;
    wait_for_line(&mut surface, CONNECTED_BANNER).await;
    assert!(client.is_connected());

    // The remembered size is replayed on the new stream
    assert_eq!(next_frame(&mut second).await, Message::Binary(vec![1, 0, 80, 0, 24]));
}

#[tokio::test]
async fn test_normal_close_does_not_reconnect() {
    let (client, mut surface, mut server, mut socket) = connected_client(fast_reconnect(20)).await;
    socket
        .close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: Cow::Borrowed("session ended"),
        }))
        .await
        .unwrap();

    wait_for_line(&mut surface, CLOSED_BANNER).await;
    assert!(
        timeout(Duration::from_millis(300), server.recv()).await.is_err(),
        "client must not reconnect after a normal close"
    );
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_manual_connect_after_normal_close() {
    let (client, mut surface, mut server, mut socket) = connected_client(ReconnectConfig::default()).await;
    socket
        .close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: Cow::Borrowed(""),
        }))
        .await
        .unwrap();
    wait_for_line(&mut surface, CLOSED_BANNER).await;

    client.connect();
    let _second = accept(&mut server).await;
    wait_for_line(&mut surface, CONNECTED_BANNER).await;
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_dispose_cancels_pending_reconnect() {
    let (mut client, mut surface, mut server, socket) = connected_client(fast_reconnect(200)).await;
    drop(socket);
    wait_for_line(&mut surface, RECONNECTING_BANNER).await;

    client.dispose();
    assert!(client.is_disposed());
    assert!(
        timeout(Duration::from_millis(600), server.recv()).await.is_err(),
        "disposed client must not reconnect"
    );
}

#[tokio::test]
async fn test_handshake_failure_schedules_retry() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let url = Url::parse(&format!("ws://127.0.0.1:{port}/api/v1/terminals/t-1/attach")).unwrap();
    let (client, mut surface) = WebSocketTerminalClient::spawn(url, fast_reconnect(1000));
    client.connect();

    wait_for_line(&mut surface, RECONNECTING_BANNER).await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_stalled_handshake_times_out_and_retries() {
    // Accepts TCP but never answers the upgrade request
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (accepted_tx, mut accepted) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
            if accepted_tx.send(()).is_err() {
                break;
            }
        }
    });

    let url = Url::parse(&format!("ws://127.0.0.1:{port}/api/v1/terminals/t-1/attach")).unwrap();
    let config = ReconnectConfig {
        connect_timeout_ms: 200,
        ..fast_reconnect(20)
    };
    let (client, mut surface) = WebSocketTerminalClient::spawn(url, config);
    client.connect();

    timeout(WAIT, accepted.recv()).await.unwrap().unwrap();
    wait_for_line(&mut surface, RECONNECTING_BANNER).await;
    // The retry opens a fresh TCP connection
    timeout(WAIT, accepted.recv()).await.unwrap().unwrap();
    assert_ne!(client.state(), ConnectionState::Connected);
}
