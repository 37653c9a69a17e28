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

//! Connection events delivered over a channel.
//!
//! Adapts the server's one-shot connect callbacks to an mpsc receiver so an
//! event loop can `select!` on them.

use tokio::sync::mpsc;
use tracing::warn;

use crate::error::ServerError;

/// Events emitted by a server while it waits for its client.
#[derive(Debug)]
pub enum ServerEvent {
    /// Client accepted.
    Connected { peer: String },
    /// Listen, advertise or accept failed.
    ConnectFailed(ServerError),
}

/// Build the connect callbacks that forward into `event_tx`.
pub fn event_callbacks(
    event_tx: mpsc::Sender<ServerEvent>,
) -> (
    impl FnOnce(String) + Send + 'static,
    impl FnOnce(ServerError) + Send + 'static,
) {
    let error_tx = event_tx.clone();

    let on_connected = move |peer: String| {
        if let Err(e) = event_tx.try_send(ServerEvent::Connected { peer }) {
            warn!("Failed to send connected event: {}", e);
        }
    };
    let on_error = move |err: ServerError| {
        if let Err(e) = error_tx.try_send(ServerEvent::ConnectFailed(err)) {
            warn!("Failed to send connect error event: {}", e);
        }
    };

    (on_connected, on_error)
}
