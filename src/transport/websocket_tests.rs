use crate::broker::Broker;
use crate::config::ServerSettings;
use crate::transport::websocket::{CONNECT_PATH, serve};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server(max_connections: usize) -> (String, Broker) {
    start_server_with_assets(max_connections, Path::new("assets")).await
}

async fn start_server_with_assets(
    max_connections: usize,
    static_path: &Path,
) -> (String, Broker) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().unwrap();
    let broker = Broker::new();
    let settings = ServerSettings {
        host: addr.ip().to_string(),
        port: addr.port(),
        max_connections,
        static_path: static_path.display().to_string(),
    };
    tokio::spawn(serve(listener, broker.clone(), settings));
    (format!("ws://{addr}{CONNECT_PATH}"), broker)
}

async fn connect(url: &str, name: Option<&str>) -> Ws {
    let url = match name {
        Some(name) => format!("{url}?client_name={name}"),
        None => url.to_string(),
    };
    let (ws, _) = connect_async(url).await.expect("WebSocket handshake failed");
    ws
}

async fn next_json(ws: &mut Ws) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("server sent invalid JSON");
        }
    }
}

async fn send_json(ws: &mut Ws, value: Value) {
    ws.send(WsMessage::text(value.to_string()))
        .await
        .expect("Failed to send frame");
}

async fn subscribe(ws: &mut Ws, channel: &str) -> Value {
    send_json(
        ws,
        json!({ "action": "subscribe", "params": { "channel_name": channel } }),
    )
    .await;
    next_json(ws).await
}

#[tokio::test]
async fn test_connect_acknowledges_client_name() {
    let (url, broker) = start_server(10).await;

    let mut alice = connect(&url, Some("alice")).await;
    let ack = next_json(&mut alice).await;
    assert_eq!(ack, json!({ "status": "ok", "info": { "client_name": "alice" } }));
    assert!(broker.is_registered("alice").await);

    let mut anon = connect(&url, None).await;
    let ack = next_json(&mut anon).await;
    let name = ack["info"]["client_name"].as_str().unwrap().to_string();
    assert!(name.starts_with("client-"));
    assert!(broker.is_registered(&name).await);
}

#[tokio::test]
async fn test_publish_reaches_other_subscriber() {
    let (url, _broker) = start_server(10).await;
    let mut alice = connect(&url, Some("alice")).await;
    let mut bob = connect(&url, Some("bob")).await;
    next_json(&mut alice).await;
    next_json(&mut bob).await;

    let rsp = subscribe(&mut alice, "room1").await;
    assert_eq!(
        rsp,
        json!({ "status": "ok", "info": { "channel_name": "room1", "total_subscribers": 1 } })
    );
    let rsp = subscribe(&mut bob, "room1").await;
    assert_eq!(rsp["info"]["total_subscribers"], 2);

    send_json(
        &mut alice,
        json!({ "action": "publish", "params": { "channel_name": "room1", "content": "hi" } }),
    )
    .await;
    assert_eq!(next_json(&mut alice).await, json!({ "status": "ok" }));

    let received = next_json(&mut bob).await;
    assert_eq!(received["sender"], "alice");
    assert_eq!(received["channel_name"], "room1");
    assert_eq!(received["content"], "hi");
    assert!(received["sent_at"].is_string());

    // Nothing else should be waiting for the publisher.
    let extra = tokio::time::timeout(Duration::from_millis(100), alice.next()).await;
    assert!(extra.is_err());
}

#[tokio::test]
async fn test_duplicate_client_name_is_refused() {
    let (url, broker) = start_server(10).await;
    let mut first = connect(&url, Some("x")).await;
    next_json(&mut first).await;

    let mut second = connect(&url, Some("x")).await;
    let rsp = next_json(&mut second).await;
    assert_eq!(
        rsp,
        json!({ "status": "error", "info": { "detail": "Client 'x' already exists" } })
    );
    assert_eq!(broker.client_count().await, 1);
}

#[tokio::test]
async fn test_bad_frames_get_error_responses() {
    let (url, _broker) = start_server(10).await;
    let mut ws = connect(&url, Some("alice")).await;
    next_json(&mut ws).await;

    ws.send(WsMessage::text("not json")).await.unwrap();
    assert_eq!(
        next_json(&mut ws).await,
        json!({ "status": "error", "info": { "detail": "Failed to parse JSON message" } })
    );

    send_json(&mut ws, json!({ "action": "dance", "params": {} })).await;
    assert_eq!(
        next_json(&mut ws).await["info"]["detail"],
        "Unknown action specified: 'dance'"
    );

    send_json(
        &mut ws,
        json!({ "action": "publish", "params": { "channel_name": "nowhere", "content": "?" } }),
    )
    .await;
    assert_eq!(
        next_json(&mut ws).await["info"]["detail"],
        "Channel 'nowhere' does not exist"
    );

    // The connection is still usable afterwards.
    let rsp = subscribe(&mut ws, "room1").await;
    assert_eq!(rsp["status"], "ok");
}

#[tokio::test]
async fn test_disconnect_deregisters_client() {
    let (url, broker) = start_server(10).await;
    let mut bob = connect(&url, Some("bob")).await;
    next_json(&mut bob).await;
    subscribe(&mut bob, "room1").await;
    assert_eq!(broker.channel_count().await, 1);

    bob.close(None).await.expect("Failed to close WebSocket");

    let mut cleaned_up = false;
    for _ in 0..50 {
        if !broker.is_registered("bob").await {
            cleaned_up = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(cleaned_up, "bob was never deregistered");
    assert_eq!(broker.channel_count().await, 0);
}

#[tokio::test]
async fn test_unknown_path_is_rejected() {
    let (url, _broker) = start_server(10).await;
    let wrong = url.replace(CONNECT_PATH, "/elsewhere");
    assert!(connect_async(wrong).await.is_err());
}

#[tokio::test]
async fn test_connection_limit() {
    let (url, broker) = start_server(1).await;
    let mut first = connect(&url, Some("first")).await;
    next_json(&mut first).await;

    let mut second = connect(&url, Some("second")).await;
    assert_eq!(
        next_json(&mut second).await,
        json!({ "status": "error", "info": { "detail": "Server is at capacity" } })
    );
    assert!(!broker.is_registered("second").await);
}

fn asset_dir() -> TempDir {
    let dir = TempDir::new().expect("create tempdir");
    std::fs::write(dir.path().join("index.html"), "<h1>minichat</h1>").unwrap();
    std::fs::create_dir(dir.path().join("js")).unwrap();
    std::fs::write(dir.path().join("js/client.js"), "connect();").unwrap();
    dir
}

/// Send one raw HTTP request and read until the server closes.
async fn http_request(ws_url: &str, request_line: &str) -> String {
    let addr = ws_url
        .trim_start_matches("ws://")
        .trim_end_matches(CONNECT_PATH);
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    let request = format!("{request_line}\r\nHost: {addr}\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    tokio::time::timeout(Duration::from_secs(2), stream.read_to_string(&mut response))
        .await
        .expect("timed out waiting for the response")
        .expect("read response");
    response
}

#[tokio::test]
async fn test_static_files_are_served() {
    let assets = asset_dir();
    let (url, _broker) = start_server_with_assets(10, assets.path()).await;

    let index = http_request(&url, "GET / HTTP/1.1").await;
    assert!(index.starts_with("HTTP/1.1 200 OK\r\n"), "{index}");
    assert!(index.contains("Content-Type: text/html; charset=utf-8\r\n"));
    assert!(index.ends_with("<h1>minichat</h1>"));

    let script = http_request(&url, "GET /js/client.js?v=1 HTTP/1.1").await;
    assert!(script.starts_with("HTTP/1.1 200 OK\r\n"), "{script}");
    assert!(script.contains("Content-Type: text/javascript; charset=utf-8\r\n"));
    assert!(script.contains("Content-Length: 10\r\n"));
    assert!(script.ends_with("connect();"));

    let head = http_request(&url, "HEAD /js/client.js HTTP/1.1").await;
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(head.ends_with("\r\n\r\n"));
}

#[tokio::test]
async fn test_static_misses_and_bad_methods() {
    let assets = asset_dir();
    let (url, _broker) = start_server_with_assets(10, assets.path()).await;

    let missing = http_request(&url, "GET /nope.css HTTP/1.1").await;
    assert!(missing.starts_with("HTTP/1.1 404 Not Found\r\n"), "{missing}");

    let escape = http_request(&url, "GET /../Cargo.toml HTTP/1.1").await;
    assert!(escape.starts_with("HTTP/1.1 404 Not Found\r\n"), "{escape}");

    let post = http_request(&url, "POST /index.html HTTP/1.1").await;
    assert!(post.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"), "{post}");
    assert!(post.contains("Allow: GET, HEAD\r\n"));
}

#[tokio::test]
async fn test_static_files_and_sockets_share_a_port() {
    let assets = asset_dir();
    let (url, broker) = start_server_with_assets(10, assets.path()).await;

    let index = http_request(&url, "GET /index.html HTTP/1.1").await;
    assert!(index.starts_with("HTTP/1.1 200 OK\r\n"));

    let mut ws = connect(&url, Some("alice")).await;
    assert_eq!(next_json(&mut ws).await["info"]["client_name"], "alice");
    assert!(broker.is_registered("alice").await);
}
