//! WebSocket transport
//!
//! A thin server that turns socket traffic into broker calls:
//! - accepts upgrades on `/api/connect`, taking the client identity from the
//!   `client_name` query parameter or generating one
//! - answers requests for any other path from the static directory
//! - registers the client and acknowledges with its name
//! - answers every inbound text frame with exactly one JSON response
//! - drains the client's delivery channel onto the socket from a separate
//!   writer task
//! - deregisters the client when the socket closes

use std::path::Path;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tracing::{debug, error, info, warn};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::broker::Broker;
use crate::client::DeliveryChannel;
use crate::config::ServerSettings;
use crate::transport::message::{ClientMessage, ServerResponse};
use crate::transport::static_files;
use crate::utils::BrokerError;

pub const CONNECT_PATH: &str = "/api/connect";

/// Bind to `addr` and serve until the listener fails.
pub async fn start_websocket_server(
    addr: &str,
    broker: Broker,
    settings: ServerSettings,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("WebSocket server listening on ws://{addr}{CONNECT_PATH}");
    info!("Serving static files from {}", settings.static_path);
    serve(listener, broker, settings).await
}

/// Accept connections on an already bound listener.
pub async fn serve(
    listener: TcpListener,
    broker: Broker,
    settings: ServerSettings,
) -> std::io::Result<()> {
    let settings = Arc::new(settings);
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!("Accepted TCP connection from {peer}");
        let broker = broker.clone();
        let settings = Arc::clone(&settings);
        spawn(async move {
            handle_connection(stream, broker, settings).await;
        });
    }
}

/// Pull `client_name` out of a query string. Blank names count as absent.
pub fn client_name_from_query(query: Option<&str>) -> Option<String> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "client_name")
        .map(|(_, value)| value.trim().to_string())
        .filter(|name| !name.is_empty())
}

pub fn generate_client_name() -> String {
    format!("client-{}", Uuid::new_v4().simple())
}

async fn handle_connection(
    mut stream: TcpStream,
    broker: Broker,
    settings: Arc<ServerSettings>,
) {
    match static_files::peek_request_head(&stream).await {
        Ok(Some(head)) if head.path != CONNECT_PATH => {
            let root = Path::new(&settings.static_path);
            if let Err(e) = static_files::respond(&mut stream, root, &head).await {
                warn!("Failed to answer {} {}: {e}", head.method, head.path);
            }
            return;
        }
        Ok(_) => {}
        Err(e) => {
            warn!("Failed to read request: {e}");
            return;
        }
    }

    let mut requested_name = None;
    let callback = |req: &Request, resp: Response| {
        if req.uri().path() != CONNECT_PATH {
            let mut not_found = ErrorResponse::new(Some("not found".to_string()));
            *not_found.status_mut() = StatusCode::NOT_FOUND;
            return Err(not_found);
        }
        requested_name = client_name_from_query(req.uri().query());
        Ok(resp)
    };

    let ws_stream = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake error: {e}");
            return;
        }
    };
    let client_id = requested_name.unwrap_or_else(generate_client_name);
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let delivery = match broker
        .register_bounded(&client_id, settings.max_connections)
        .await
    {
        Ok(delivery) => delivery,
        Err(e) => {
            match &e {
                BrokerError::AtCapacity { limit } => {
                    warn!("Refusing {client_id}: {limit} connections already open")
                }
                _ => error!("Failed to register client {client_id}: {e}"),
            }
            let response = ServerResponse::error(e.to_string());
            let _ = ws_sender.send(WsMessage::text(response.to_json())).await;
            let _ = ws_sender.close().await;
            return;
        }
    };
    info!("Client {client_id} connected");

    let (out_tx, out_rx) = mpsc::unbounded_channel::<WsMessage>();
    let _ = out_tx.send(WsMessage::text(
        ServerResponse::connected(&client_id).to_json(),
    ));

    let writer = spawn(forward_to_socket(
        client_id.clone(),
        delivery,
        out_rx,
        ws_sender,
    ));

    while let Some(frame) = ws_receiver.next().await {
        let text = match frame {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!("Socket error for {client_id}, stopping: {e}");
                break;
            }
        };

        let response = match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(msg) => match msg.into_action() {
                Ok(action) => ServerResponse::from(broker.process(&client_id, action).await),
                Err(e) => {
                    warn!("Invalid parameters from {client_id}: {e}");
                    ServerResponse::from(e)
                }
            },
            Err(e) => {
                warn!(
                    "Failed to parse message from {client_id}: {e} | {}",
                    text.as_str().chars().take(100).collect::<String>()
                );
                ServerResponse::error("Failed to parse JSON message")
            }
        };

        if out_tx.send(WsMessage::text(response.to_json())).is_err() {
            break;
        }
    }

    drop(out_tx);
    if let Err(e) = broker.deregister(&client_id).await {
        error!("Failed to deregister {client_id}: {e}");
    }
    let _ = writer.await;
    info!("Client {client_id} disconnected");
}

/// Writer task: responses and published messages share one socket sink.
/// Ends when the delivery channel closes or the socket fails.
async fn forward_to_socket<S>(
    client_id: String,
    mut delivery: DeliveryChannel,
    mut responses: mpsc::UnboundedReceiver<WsMessage>,
    mut sink: S,
) where
    S: futures_util::Sink<WsMessage, Error = tungstenite::Error> + Unpin,
{
    loop {
        let frame = tokio::select! {
            Some(frame) = responses.recv() => frame,
            published = delivery.recv() => match published {
                Some(message) => match serde_json::to_string(&*message) {
                    Ok(json) => WsMessage::text(json),
                    Err(e) => {
                        error!("Failed to serialize message for {client_id}: {e}");
                        continue;
                    }
                },
                None => break,
            },
        };

        if let Err(e) = sink.send(frame).await {
            warn!("Failed to send to {client_id}, stopping writer: {e}");
            break;
        }
    }

    let _ = sink.close().await;
    debug!("Writer closed for {client_id}");
}
