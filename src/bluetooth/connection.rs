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

//! Accepted client connection and the read cancellation pipe.

use bytes::Bytes;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::transport::BoxedStream;
use crate::error::{Result, ServerError};

/// Scratch buffer size for a single read.
pub const READ_BUFFER_SIZE: usize = 1024;

/// Message written into the cancellation pipe on close.
const CLOSE_SENTINEL: &[u8] = b"close\0";

pub(crate) type SharedReader = Arc<Mutex<ReadHalf<BoxedStream>>>;
pub(crate) type SharedWriter = Arc<Mutex<WriteHalf<BoxedStream>>>;

/// The accepted client socket, split so reads and writes proceed independently.
///
/// In-flight operations hold their own reference to a half; the socket is
/// released once the connection and every such operation are gone.
pub(crate) struct ClientConnection {
    peer: String,
    reader: SharedReader,
    writer: SharedWriter,
}

impl ClientConnection {
    pub(crate) fn new(stream: BoxedStream, peer: String) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            peer,
            reader: Arc::new(Mutex::new(reader)),
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    pub(crate) fn peer(&self) -> &str {
        &self.peer
    }

    pub(crate) fn reader(&self) -> SharedReader {
        Arc::clone(&self.reader)
    }

    pub(crate) fn writer(&self) -> SharedWriter {
        Arc::clone(&self.writer)
    }
}

/// Private pipe used to wake a read blocked on the client socket.
pub(crate) struct CancelPipe {
    rx: Arc<UnixStream>,
    tx: UnixStream,
}

impl CancelPipe {
    /// Allocate both ends. Must be called inside a tokio runtime.
    pub(crate) fn new() -> Result<Self> {
        let (tx, rx) = UnixStream::pair().map_err(ServerError::PipeCreationFailed)?;
        Ok(Self {
            rx: Arc::new(rx),
            tx,
        })
    }

    /// Handle a read can wait on.
    pub(crate) fn watcher(&self) -> CancelWatcher {
        CancelWatcher {
            rx: Arc::clone(&self.rx),
        }
    }

    /// Write the sentinel. Best-effort: a full pipe already wakes readers.
    pub(crate) fn signal(&self) {
        match self.tx.try_write(CLOSE_SENTINEL) {
            Ok(_) => debug!("Cancellation pipe signalled"),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                debug!("Cancellation pipe full, readers already woken")
            }
            Err(e) => warn!("Cannot write to cancellation pipe: {}", e),
        }
    }
}

/// Read end of the cancellation pipe.
pub(crate) struct CancelWatcher {
    rx: Arc<UnixStream>,
}

impl CancelWatcher {
    /// Resolve once the pipe has data or its write end is gone.
    pub(crate) async fn cancelled(&self) {
        let mut sentinel = [0u8; CLOSE_SENTINEL.len()];
        loop {
            if self.rx.readable().await.is_err() {
                return;
            }
            match self.rx.try_read(&mut sentinel) {
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                // data, EOF or a broken pipe all mean close happened
                _ => return,
            }
        }
    }
}

/// Wait on the socket and the cancellation pipe, then perform one bounded read.
///
/// Cancellation yields an empty buffer without touching the socket.
pub(crate) async fn read_once(reader: SharedReader, cancel: CancelWatcher) -> Result<Vec<u8>> {
    let mut scratch = [0u8; READ_BUFFER_SIZE];
    let mut reader = reader.lock().await;

    let size = tokio::select! {
        biased;
        res = reader.read(&mut scratch) => res,
        () = cancel.cancelled() => {
            debug!("Read cancelled by close");
            Ok(0)
        }
    }
    .map_err(ServerError::ReadFailed)?;

    Ok(scratch[..size].to_vec())
}

/// Perform one write call of `data` on the client socket.
///
/// A short write is reported, not retried.
pub(crate) async fn write_once(writer: Option<SharedWriter>, data: Bytes) -> Result<usize> {
    let writer = writer.ok_or(ServerError::ConnectionClosed)?;
    let mut writer = writer.lock().await;

    let written = writer.write(&data).await.map_err(ServerError::WriteFailed)?;
    if written != data.len() {
        return Err(ServerError::WriteIncomplete {
            written,
            requested: data.len(),
        });
    }

    Ok(written)
}
