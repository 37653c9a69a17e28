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

//! RFCOMM socket abstraction and the BlueZ backend.

use async_trait::async_trait;
use bluer::rfcomm::{Listener, Socket, SocketAddr};
use bluer::Address;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::error::{Result, ServerError};

/// Pending connection queue depth. RFCOMM only accepts one connection at a time.
pub const LISTEN_BACKLOG: u32 = 1;

/// Byte stream of an accepted client.
pub trait ClientStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> ClientStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Boxed client stream as handed out by a listener.
pub type BoxedStream = Box<dyn ClientStream>;

/// Factory for listening RFCOMM sockets.
#[async_trait]
pub trait RfcommTransport: Send + Sync {
    /// Bind to the wildcard local address on `channel` and start listening.
    ///
    /// Allocation and bind failures map to [`ServerError::BindFailed`],
    /// listen failures to [`ServerError::ListenFailed`].
    async fn listen(&self, channel: u8) -> Result<Box<dyn RfcommListener>>;
}

/// A listening RFCOMM socket.
#[async_trait]
pub trait RfcommListener: Send + Sync {
    /// Wait for a single connection.
    ///
    /// Returns the stream and the peer address as a display string.
    async fn accept(&self) -> io::Result<(BoxedStream, String)>;
}

/// Kernel RFCOMM sockets via BlueZ.
#[derive(Debug, Default, Clone, Copy)]
pub struct BluezTransport;

#[async_trait]
impl RfcommTransport for BluezTransport {
    async fn listen(&self, channel: u8) -> Result<Box<dyn RfcommListener>> {
        let socket = Socket::new().map_err(ServerError::BindFailed)?;

        let local_addr = SocketAddr::new(Address::any(), channel);
        socket.bind(local_addr).map_err(ServerError::BindFailed)?;
        debug!("RFCOMM socket bound to channel {}", channel);

        let listener = socket
            .listen(LISTEN_BACKLOG)
            .map_err(ServerError::ListenFailed)?;

        Ok(Box::new(BluezListener { listener }))
    }
}

struct BluezListener {
    listener: Listener,
}

#[async_trait]
impl RfcommListener for BluezListener {
    async fn accept(&self) -> io::Result<(BoxedStream, String)> {
        let (stream, remote_addr) = self.listener.accept().await?;
        Ok((Box::new(stream), remote_addr.addr.to_string()))
    }
}
