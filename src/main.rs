//! CLI for latency-relay
//!
//! Subcommands:
//! - `server`: run the ingestion HTTP service
//! - `consume`: run one consumer session and print what it receives
//! - `send`: post a single message to the ingestion service

use std::sync::Arc;

use clap::Parser;
use latency_relay::broker::{BrokerClient, BrokerOptions};
use latency_relay::config::{Settings, load_config};
use latency_relay::envelope::{format_date, format_time, now_millis};
use latency_relay::ingest::{IngestService, SubmitRequest, serve};
use latency_relay::session::{ConsumerSession, SessionEvent};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "latency-relay")]
enum Command {
    /// Start the ingestion service
    Server,
    /// Subscribe to the relay topic and log every message with its latency
    Consume {
        /// Broker WebSocket URL (default: consumer broker URL from config)
        #[arg(long)]
        url: Option<String>,
    },
    /// Send one message through the ingestion service
    Send {
        message: String,
        #[arg(long, default_value = "You")]
        sender: String,
        /// Ingestion endpoint (default: built from the public host in config)
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    latency_relay::utils::logging::init("info");

    let cmd = Command::parse();

    let result = match load_config() {
        Ok(settings) => match cmd {
            Command::Server => run_server(settings).await,
            Command::Consume { url } => run_consumer(settings, url).await,
            Command::Send {
                message,
                sender,
                url,
            } => run_send(settings, message, sender, url).await,
        },
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}

async fn run_server(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let client = BrokerClient::connect(
        settings.broker.url.clone(),
        BrokerOptions::from(&settings.broker),
    );
    let service = IngestService::new(Arc::new(client.clone()));

    let addr = settings.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, broker = %settings.broker.url, "Ingestion service listening");

    serve(listener, service, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received. Exiting gracefully.");
    })
    .await?;

    client.shutdown().await;
    Ok(())
}

async fn run_consumer(
    settings: Settings,
    url: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let url = url.unwrap_or_else(|| settings.consumer_broker_url());
    info!(%url, "Connecting consumer session");

    let session = ConsumerSession::connect(
        url,
        BrokerOptions::from(&settings.broker),
        settings.consumer.capacity,
    )?;
    let mut events = session.events();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(SessionEvent::Connected) => info!("Connected to broker"),
                Ok(SessionEvent::Disconnected) => warn!("Disconnected from broker"),
                Ok(SessionEvent::Received(entry)) => {
                    let env = &entry.envelope;
                    info!(
                        "[{} {}] {}: {} (server {}, latency {})",
                        format_date(entry.client_received_at),
                        format_time(entry.client_received_at),
                        env.sender,
                        env.body,
                        format_time(env.server_received_at),
                        entry.latency,
                    );
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Display fell behind"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.close().await;
    Ok(())
}

async fn run_send(
    settings: Settings,
    message: String,
    sender: String,
    url: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let url = url.unwrap_or_else(|| settings.ingest_url());
    let sent_at = now_millis();
    let request = SubmitRequest {
        message: Some(message),
        sender: Some(sender),
        timestamp: Some(sent_at),
        sent_at: Some(sent_at),
    };

    let response = reqwest::Client::new().post(&url).json(&request).send().await?;
    let status = response.status();
    let body: serde_json::Value = response.json().await?;

    if status.is_success() {
        info!(%url, "Message sent");
        Ok(())
    } else {
        Err(format!("ingestion rejected the message ({status}): {body}").into())
    }
}
