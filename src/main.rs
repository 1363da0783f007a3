// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! SppChat command line client.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sppchat::chat::{ChatClient, ChatError};
use sppchat::config::Config;
use sppchat::connector::{Connector, Discovery, Transport};
use sppchat::session::{DuplexStream, SessionEvent, StreamSession};
use sppchat::state::AppState;
use sppchat::tcp::{self, NoDiscovery, TcpTransport};
use sppchat::PeerId;

#[derive(Parser)]
#[command(name = "sppchat", version, about = "Chat over a Serial Port Profile link")]
struct Cli {
    /// Path to the config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List nearby Bluetooth devices.
    #[cfg(feature = "bluetooth")]
    Scan,

    /// Connect to a Bluetooth device by address.
    #[cfg(feature = "bluetooth")]
    Connect { peer: String },

    /// Wait for one inbound Bluetooth connection.
    #[cfg(feature = "bluetooth")]
    Listen,

    /// Connect to a TCP peer (host:port).
    TcpConnect { addr: String },

    /// Wait for one inbound TCP connection.
    TcpListen { addr: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sppchat=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    info!("Configuration loaded");

    let state = AppState::new();

    match cli.command {
        #[cfg(feature = "bluetooth")]
        Command::Scan => bluetooth_cmd::scan(&config, &state).await,
        #[cfg(feature = "bluetooth")]
        Command::Connect { peer } => {
            bluetooth_cmd::connect(&config, state, PeerId::new(peer)?).await
        }
        #[cfg(feature = "bluetooth")]
        Command::Listen => bluetooth_cmd::listen(&config, state).await,
        Command::TcpConnect { addr } => {
            let connector = Connector::new(Arc::new(TcpTransport), Arc::new(NoDiscovery));
            connect_and_chat(connector, PeerId::new(addr)?, &config, state).await
        }
        Command::TcpListen { addr } => {
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("Waiting for a connection on {}", listener.local_addr()?);
            let (stream, peer) = tcp::accept_one(&listener).await?;
            let session = Arc::new(StreamSession::new(stream, peer, config.session.options()));
            run_chat(session, &config, state).await
        }
    }
}

/// Connect on a background task, then chat.
async fn connect_and_chat<T: Transport, D: Discovery>(
    connector: Connector<T, D>,
    peer: PeerId,
    config: &Config,
    state: Arc<AppState>,
) -> Result<()> {
    let connector = Arc::new(
        connector
            .with_service(config.bluetooth.service_uuid)
            .with_timeout(config.session.connect_timeout()),
    );

    state.set_connecting(peer.clone());
    println!("{}", state.status_line());

    let stream = match connector.spawn_connect(peer.clone()).await? {
        Ok(stream) => stream,
        Err(e) => {
            state.set_error(e.to_string());
            println!("{}", state.status_line());
            return Err(e.into());
        }
    };

    let session = Arc::new(StreamSession::new(stream, peer, config.session.options()));
    run_chat(session, config, state).await
}

/// Relay stdin lines to the peer and print what arrives until the session closes.
async fn run_chat<S: DuplexStream>(
    session: Arc<StreamSession<S>>,
    config: &Config,
    state: Arc<AppState>,
) -> Result<()> {
    let client = ChatClient::new(Arc::clone(&session), config.chat.clone());
    let mut events = session.start()?;

    state.set_connected(session.peer().clone());
    println!("{}", state.status_line());

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::Chunk(chunk)) => {
                    if let Some(line) = client.receive(&chunk) {
                        println!("{}", line.render(client.labels()));
                    }
                }
                Some(SessionEvent::Closed(reason)) => {
                    if let Some(line) = client.finish() {
                        println!("{}", line.render(client.labels()));
                    }
                    if reason.is_failure() {
                        state.set_error(reason.to_string());
                    } else {
                        state.set_disconnected();
                    }
                    println!("{}", state.status_line());
                    break;
                }
                None => break,
            },
            line = input.next_line(), if input_open => match line? {
                Some(text) => match client.send_text(&text).await {
                    Ok(line) => println!("{}", line.render(client.labels())),
                    Err(ChatError::EmptyMessage) => {}
                    Err(e) => {
                        warn!("Send failed: {}", e);
                        println!("Not connected or message empty");
                    }
                },
                None => {
                    input_open = false;
                    session.shutdown().await;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                session.shutdown().await;
            }
        }
    }

    info!("SppChat stopped");
    Ok(())
}

#[cfg(feature = "bluetooth")]
mod bluetooth_cmd {
    use super::*;
    use sppchat::bluetooth::{self, BluetoothAdapter, RfcommTransport};
    use std::time::Duration;

    pub async fn scan(config: &Config, state: &AppState) -> Result<()> {
        let adapter = BluetoothAdapter::open().await?;
        state.set_discovering();
        println!("{}", state.status_line());

        let mut peers = adapter.start_discovery().await?;
        let window = Duration::from_secs(config.bluetooth.discovery_secs);
        let _ = tokio::time::timeout(window, async {
            while let Some(peer) = peers.recv().await {
                println!("{}\n", peer.listing());
            }
        })
        .await;

        adapter.cancel_discovery().await?;
        state.set_disconnected();
        Ok(())
    }

    pub async fn connect(config: &Config, state: Arc<AppState>, peer: PeerId) -> Result<()> {
        let adapter = Arc::new(BluetoothAdapter::open().await?);
        let transport = Arc::new(RfcommTransport::new(
            Arc::clone(&adapter),
            config.bluetooth.rfcomm_channel,
        ));
        connect_and_chat(Connector::new(transport, adapter), peer, config, state).await
    }

    pub async fn listen(config: &Config, state: Arc<AppState>) -> Result<()> {
        let adapter = BluetoothAdapter::open().await?;
        info!("Waiting for connections...");
        let (stream, peer) = bluetooth::accept_one(
            &adapter,
            config.bluetooth.service_uuid,
            config.bluetooth.rfcomm_channel,
        )
        .await?;
        let session = Arc::new(StreamSession::new(stream, peer, config.session.options()));
        run_chat(session, config, state).await
    }
}
