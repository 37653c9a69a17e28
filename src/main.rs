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

//! RFCOMM echo server.
//!
//! Advertises the configured service, waits for one client and echoes back
//! everything it sends until the client disconnects or Ctrl-C is pressed.

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rfcomm_serial_server::events::{event_callbacks, ServerEvent};
use rfcomm_serial_server::{Config, RfcommServer};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rfcomm_serial_server=info".parse()?),
        )
        .init();

    info!(
        "Starting RFCOMM serial server v{}...",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config = Config::load()?;
    info!(
        "Configuration loaded (UUID {}, channel {})",
        config.service.uuid, config.service.channel
    );

    let (event_tx, mut event_rx) = mpsc::channel::<ServerEvent>(4);
    let (on_connected, on_error) = event_callbacks(event_tx);
    let server = RfcommServer::listen_bluez(&config.service, on_connected, on_error)?;

    tokio::select! {
        event = event_rx.recv() => match event {
            Some(ServerEvent::Connected { peer }) => {
                info!("Client {} connected, echoing", peer);
                tokio::select! {
                    _ = echo(&server) => {}
                    _ = tokio::signal::ctrl_c() => {
                        info!("Shutdown signal received");
                    }
                }
            }
            Some(ServerEvent::ConnectFailed(e)) => error!("Server failed: {}", e),
            None => {}
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    server.close();
    info!("RFCOMM serial server stopped");
    Ok(())
}

/// Echo every chunk back until the peer closes or a read fails.
async fn echo(server: &RfcommServer) {
    loop {
        let data = match server.read().await {
            Ok(data) if data.is_empty() => {
                info!("Client disconnected");
                return;
            }
            Ok(data) => data,
            Err(e) => {
                warn!("Read failed: {}", e);
                return;
            }
        };

        let len = data.len();
        let written = server.write(data);
        tokio::spawn(async move {
            match written.await {
                Ok(n) => debug!("Echoed {} of {} bytes", n, len),
                Err(e) => warn!("Echo write failed: {}", e),
            }
        });
    }
}
