//! CLI for event-broker
//!
//! Subcommands:
//! - `server`: run the WebSocket bridge
//! - `client`: run the demo bridge client (useful for smoke tests)

use clap::Parser;
use event_broker::client::run_client;
use event_broker::config::{Settings, load_config};
use event_broker::transport::start_bridge_server;
use event_broker::utils::logging;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "event-broker")]
enum Command {
    /// Start the WebSocket bridge
    Server,
    /// Connect to a bridge, greet it and answer its requests
    Client {
        /// Bridge URL (default: ws://127.0.0.1:8080/ws)
        #[arg(long, default_value = "ws://127.0.0.1:8080/ws")]
        url: String,
        /// First event sent after connecting
        #[arg(long, default_value = "hello")]
        greeting: String,
        /// Disconnect after answering this many requests
        #[arg(long)]
        max_requests: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cmd = Command::parse();

    match cmd {
        Command::Server => match load_config() {
            Ok(config) => {
                logging::init(&config.log.level);
                if let Err(e) = run_server(config).await {
                    error!("Server failed: {}", e);
                }
            }
            Err(e) => {
                logging::init("info");
                error!("Failed to load configuration: {}", e);
            }
        },
        Command::Client {
            url,
            greeting,
            max_requests,
        } => {
            logging::init("info");
            if let Err(e) = run_client(&url, &greeting, max_requests).await {
                error!("Client failed: {}", e);
            }
        }
    }
}

async fn run_server(config: Settings) -> event_broker::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);

    tokio::select! {
        result = start_bridge_server(&addr, config) => {
            result?;
            error!("Bridge server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}
