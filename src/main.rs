//! CLI for minichat
//!
//! Subcommands:
//! - `server`: run the WebSocket server
//! - `client`: connect, subscribe, publish once and print replies (smoke test)

use std::time::Duration;

use clap::Parser;
use minichat::broker::Broker;
use minichat::config::load_config;
use minichat::transport::start_websocket_server;
use minichat::utils::logging;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "minichat", version)]
enum Command {
    /// Start the WebSocket server
    Server,
    /// Run a one-shot client against a running server
    Client {
        /// Connect endpoint of the server
        #[arg(long, default_value = "ws://127.0.0.1:3501/api/connect")]
        url: String,
        /// Client name to register as; generated by the server if omitted
        #[arg(long)]
        name: Option<String>,
        /// Channel to subscribe and publish to
        #[arg(long, default_value = "lobby")]
        channel: String,
        /// Message to publish
        #[arg(long, default_value = "Hello from minichat")]
        message: String,
        /// How long to keep printing incoming frames
        #[arg(long, default_value_t = 5)]
        listen_secs: u64,
    },
}

#[tokio::main]
async fn main() {
    let cmd = Command::parse();
    let _ = dotenvy::dotenv();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {e}");
            return;
        }
    };
    logging::init(&settings.log.level);

    match cmd {
        Command::Server => {
            info!(
                "Starting minichat {} ({} environment)",
                env!("CARGO_PKG_VERSION"),
                settings.environment
            );
            let broker = Broker::new();
            let address = settings.address();

            tokio::select! {
                result = start_websocket_server(&address, broker, settings.server.clone()) => {
                    if let Err(e) = result {
                        error!("Server failed: {e}");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received. Exiting.");
                }
            }
        }
        Command::Client {
            url,
            name,
            channel,
            message,
            listen_secs,
        } => {
            let listen = Duration::from_secs(listen_secs);
            if let Err(e) = run_client(&url, name.as_deref(), &channel, &message, listen).await {
                error!("Client failed: {e}");
            }
        }
    }
}

async fn run_client(
    url: &str,
    name: Option<&str>,
    channel: &str,
    message: &str,
    listen: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    let mut target = url::Url::parse(url)?;
    if let Some(name) = name {
        target.query_pairs_mut().append_pair("client_name", name);
    }
    let (mut ws_stream, _response) = connect_async(target.as_str()).await?;

    let subscribe = json!({ "action": "subscribe", "params": { "channel_name": channel } });
    ws_stream
        .send(WsMessage::text(subscribe.to_string()))
        .await?;

    let publish = json!({
        "action": "publish",
        "params": { "channel_name": channel, "content": message }
    });
    ws_stream.send(WsMessage::text(publish.to_string())).await?;

    let deadline = tokio::time::sleep(listen);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            frame = ws_stream.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => println!("{}", text.as_str()),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
        }
    }

    ws_stream.close(None).await?;
    Ok(())
}
