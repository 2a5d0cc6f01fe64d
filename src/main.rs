//! CLI for streamhub
//!
//! Subcommands:
//! - `server`: run the streaming service
//! - `watch`: print everything a WebSocket stream delivers (smoke tests)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{error, info};
use uuid::Uuid;

use streamhub::broker::{Counters, Manager};
use streamhub::config::load_config;
use streamhub::heartbeat::Heartbeat;
use streamhub::transport::{AppState, serve};
use streamhub::upstream::{RedisSource, RedisStatsSink};
use streamhub::utils::error::Error;

#[derive(Parser)]
#[command(name = "streamhub", version)]
struct Cli {
    /// Log level: error, warn, info, debug or trace
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the streaming server
    Server {
        /// Extra configuration file layered over config/default and
        /// config/streaming-api
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Connect to a WebSocket stream and print every payload
    Watch {
        #[arg(long, default_value = "ws://127.0.0.1:8080/ws-streaming/room/a")]
        url: String,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    streamhub::utils::logging::init(&cli.log_level);

    let result = match cli.command {
        Command::Server { config } => run_server(config).await,
        Command::Watch { url } => run_watch(&url).await,
    };
    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run_server(config: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_config(config.as_deref())?;
    let instance_id = Uuid::new_v4().to_string();

    let (manager, actor) = Manager::spawn(&settings.broker, Arc::new(Counters::default()));

    let client = redis::Client::open(settings.redis.url())?;
    let sink = RedisStatsSink::new(client.clone());
    tokio::spawn(RedisSource::new(client, manager.clone()).run());
    tokio::spawn(
        Heartbeat::new(
            manager.clone(),
            instance_id.clone(),
            Duration::from_secs(settings.broker.heartbeat_secs),
        )
        .with_sink(Arc::new(sink))
        .run(),
    );

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("instance {instance_id} starting on {addr}");
    let state = AppState::new(manager, instance_id);

    tokio::select! {
        result = serve(listener, state) => {
            result?;
            error!("HTTP server exited unexpectedly.");
        }
        result = actor => {
            // the registry cannot be rebuilt, so this ends the process
            error!("topic manager terminated: {result:?}");
            return Err(Error::ManagerStopped.into());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

async fn run_watch(url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (mut ws_stream, _response) = connect_async(url).await?;
    info!("connected to {url}");

    while let Some(frame) = ws_stream.next().await {
        match frame? {
            WsMessage::Text(text) => println!("{}", text.as_str()),
            WsMessage::Binary(bytes) => println!("<{} bytes>", bytes.len()),
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    Ok(())
}
