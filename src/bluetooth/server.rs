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

//! Bluetooth RFCOMM server implementation.
//!
//! A server binds one channel, advertises it, accepts exactly one client and
//! then carries reads and writes for that client until it is closed.

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::connection::{self, CancelPipe, ClientConnection};
use super::discovery::{advertise, BluezDiscovery, ServiceAdvertisement, ServiceDiscovery};
use super::dispatch::CallbackDispatcher;
use super::record::ServiceRecord;
use super::service_uuid::ServiceUuid;
use super::transport::{BluezTransport, BoxedStream, RfcommListener, RfcommTransport};
use super::write_queue::{WriteQueue, WriteRequest, WriteSink};
use crate::config::ServiceConfig;
use crate::error::{Result, ServerError};
use crate::state::ServerPhase;

/// Called once with the peer address when the client is accepted.
pub type ConnectedCallback = Box<dyn FnOnce(String) + Send + 'static>;

/// Called once when listen, advertise or accept fails.
pub type ErrorCallback = Box<dyn FnOnce(ServerError) + Send + 'static>;

/// Outcome of a read or write, awaited on the caller's task.
#[must_use = "dropping a Completion discards the operation's result"]
pub struct Completion<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Completion<T> {
    fn channel() -> (oneshot::Sender<Result<T>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // The worker went away without reporting: the server is gone.
            Poll::Ready(Err(_)) => Poll::Ready(Err(ServerError::ConnectionClosed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Background accept task and the connect callbacks.
///
/// The callbacks are released after the first outcome; the task handle is
/// kept until close.
struct AcceptState {
    task: Option<JoinHandle<()>>,
    on_connected: Option<ConnectedCallback>,
    on_error: Option<ErrorCallback>,
}

impl AcceptState {
    fn take_callbacks(&mut self) -> (Option<ConnectedCallback>, Option<ErrorCallback>) {
        (self.on_connected.take(), self.on_error.take())
    }

    fn release(self) {
        if let Some(task) = self.task {
            task.abort();
        }
    }
}

/// Every OS resource owned by one server instance.
///
/// `None` marks a resource as not open, so close never releases one twice.
struct ServerHandle {
    phase: ServerPhase,
    listener: Option<Arc<dyn RfcommListener>>,
    client: Option<ClientConnection>,
    cancel: Option<CancelPipe>,
    advertisement: Option<ServiceAdvertisement>,
    accept: Option<AcceptState>,
}

impl ServerHandle {
    fn is_closed(&self) -> bool {
        self.phase == ServerPhase::Closed
    }
}

struct Shared {
    uuid: ServiceUuid,
    channel: u8,
    handle: Mutex<ServerHandle>,
    writes: Arc<WriteQueue>,
    callbacks: CallbackDispatcher,
}

/// Single-client RFCOMM server.
///
/// Completion callbacks of one server never run concurrently: connect,
/// read and write callbacks are delivered one at a time on a per-server
/// task. The only exception is a read refused for lack of a client, which
/// completes on the caller before `read_with` returns.
pub struct RfcommServer {
    shared: Arc<Shared>,
}

impl RfcommServer {
    /// Start a server with explicit socket and discovery backends.
    ///
    /// The UUID is validated and the cancellation pipe allocated before this
    /// returns. Bind, listen, advertise and accept then run in the background;
    /// exactly one of `on_connected` / `on_error` fires, unless the server is
    /// closed first, in which case neither does.
    ///
    /// Must be called inside a tokio runtime.
    pub fn listen<C, E>(
        config: &ServiceConfig,
        transport: Arc<dyn RfcommTransport>,
        discovery: Arc<dyn ServiceDiscovery>,
        on_connected: C,
        on_error: E,
    ) -> Result<Self>
    where
        C: FnOnce(String) + Send + 'static,
        E: FnOnce(ServerError) + Send + 'static,
    {
        let uuid = ServiceUuid::parse(&config.uuid)?;
        let cancel = CancelPipe::new()?;
        let record = ServiceRecord::rfcomm(uuid, config.channel, config.info());
        let callbacks = CallbackDispatcher::spawn();

        let shared = Arc::new(Shared {
            uuid,
            channel: config.channel,
            handle: Mutex::new(ServerHandle {
                phase: ServerPhase::Starting,
                listener: None,
                client: None,
                cancel: Some(cancel),
                advertisement: None,
                accept: Some(AcceptState {
                    task: None,
                    on_connected: Some(Box::new(on_connected)),
                    on_error: Some(Box::new(on_error)),
                }),
            }),
            writes: Arc::new(WriteQueue::new(callbacks.clone())),
            callbacks,
        });

        let task = tokio::spawn(Arc::clone(&shared).run(transport, discovery, record));
        if let Some(accept) = shared.handle.lock().accept.as_mut() {
            accept.task = Some(task);
        }

        Ok(Self { shared })
    }

    /// Start a server on the kernel RFCOMM socket and bluetoothd.
    pub fn listen_bluez<C, E>(config: &ServiceConfig, on_connected: C, on_error: E) -> Result<Self>
    where
        C: FnOnce(String) + Send + 'static,
        E: FnOnce(ServerError) + Send + 'static,
    {
        Self::listen(
            config,
            Arc::new(BluezTransport),
            Arc::new(BluezDiscovery),
            on_connected,
            on_error,
        )
    }

    /// Queue `data` for writing and return immediately.
    ///
    /// Writes run one at a time in submission order; `on_complete` of one
    /// write returns before the next write starts.
    pub fn write_with<F>(&self, data: impl Into<Bytes>, on_complete: F)
    where
        F: FnOnce(Result<usize>) + Send + 'static,
    {
        let data = data.into();
        debug!("Queueing write of {} bytes", data.len());
        let sink: Arc<dyn WriteSink> = self.shared.clone();
        self.shared
            .writes
            .enqueue(sink, WriteRequest::new(data, Box::new(on_complete)));
    }

    /// Queue `data` for writing; the returned future yields the byte count.
    ///
    /// The write is queued by this call, not when the future is first polled.
    pub fn write(&self, data: impl Into<Bytes>) -> Completion<usize> {
        let (tx, completion) = Completion::channel();
        self.write_with(data, move |result| {
            let _ = tx.send(result);
        });
        completion
    }

    /// Read up to 1024 bytes.
    ///
    /// Without a connected client `on_complete` receives
    /// [`ServerError::ConnectionClosed`] before this returns. An empty buffer
    /// means the peer closed the connection or the server was closed while
    /// the read was waiting.
    pub fn read_with<F>(&self, on_complete: F)
    where
        F: FnOnce(Result<Vec<u8>>) + Send + 'static,
    {
        let pending = {
            let handle = self.shared.handle.lock();
            match (&handle.client, &handle.cancel) {
                (Some(client), Some(cancel)) => Some((client.reader(), cancel.watcher())),
                _ => None,
            }
        };

        let Some((reader, cancel)) = pending else {
            on_complete(Err(ServerError::ConnectionClosed));
            return;
        };

        let callbacks = self.shared.callbacks.clone();
        tokio::spawn(async move {
            let result = connection::read_once(reader, cancel).await;
            match &result {
                Ok(data) if data.is_empty() => debug!("Read returned end of stream"),
                Ok(data) => debug!("Read {} bytes", data.len()),
                Err(e) => warn!("Read failed: {}", e),
            }
            callbacks.post(Box::new(move || on_complete(result)));
        });
    }

    /// Read up to 1024 bytes; see [`read_with`](Self::read_with).
    pub fn read(&self) -> Completion<Vec<u8>> {
        let (tx, completion) = Completion::channel();
        self.read_with(move |result| {
            let _ = tx.send(result);
        });
        completion
    }

    /// Release every resource of this server.
    ///
    /// Closes the client socket and the listening socket, wakes a pending
    /// read, closes the cancellation pipe, withdraws a still outstanding
    /// advertisement and stops the accept task. Safe to call at any point
    /// and any number of times.
    pub fn close(&self) {
        let (advertisement, accept) = {
            let mut handle = self.shared.handle.lock();
            if handle.is_closed() {
                return;
            }

            if let Some(client) = handle.client.take() {
                debug!("Closing client connection to {}", client.peer());
            }

            if handle.listener.take().is_some() {
                debug!("Closing listening socket on channel {}", self.shared.channel);
                if let Some(cancel) = handle.cancel.as_ref() {
                    cancel.signal();
                }
            }

            // Dropping the pipe closes both ends.
            handle.cancel = None;
            handle.phase = ServerPhase::Closed;
            (handle.advertisement.take(), handle.accept.take())
        };

        if let Some(advertisement) = advertisement {
            advertisement.close();
        }
        if let Some(accept) = accept {
            accept.release();
        }

        info!("RFCOMM server on channel {} closed", self.shared.channel);
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ServerPhase {
        self.shared.handle.lock().phase
    }

    /// Whether a client is connected and the server is open.
    pub fn is_connected(&self) -> bool {
        self.shared.handle.lock().client.is_some()
    }

    /// Address of the accepted client.
    pub fn peer_address(&self) -> Option<String> {
        self.shared
            .handle
            .lock()
            .client
            .as_ref()
            .map(|client| client.peer().to_string())
    }

    /// Writes queued, including the one in flight.
    pub fn pending_writes(&self) -> usize {
        self.shared.writes.len()
    }

    pub fn uuid(&self) -> ServiceUuid {
        self.shared.uuid
    }

    pub fn channel(&self) -> u8 {
        self.shared.channel
    }
}

impl Drop for RfcommServer {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for RfcommServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RfcommServer")
            .field("uuid", &self.shared.uuid)
            .field("channel", &self.shared.channel)
            .field("phase", &self.phase())
            .finish()
    }
}

impl Shared {
    /// Listen, advertise, then accept the single client.
    async fn run(
        self: Arc<Self>,
        transport: Arc<dyn RfcommTransport>,
        discovery: Arc<dyn ServiceDiscovery>,
        record: ServiceRecord,
    ) {
        let listener: Arc<dyn RfcommListener> = match transport.listen(self.channel).await {
            Ok(listener) => Arc::from(listener),
            Err(e) => {
                self.fail(ServerPhase::ListenFailed, e);
                return;
            }
        };

        {
            let mut handle = self.handle.lock();
            if handle.is_closed() {
                return;
            }
            handle.listener = Some(Arc::clone(&listener));
            handle.phase = ServerPhase::Listening;
        }
        info!("RFCOMM server listening on channel {}", self.channel);

        // The listening socket stays open when advertising fails.
        let advertisement = match advertise(discovery.as_ref(), &record).await {
            Ok(advertisement) => advertisement,
            Err(e) => {
                self.fail(ServerPhase::AdvertiseFailed, e);
                return;
            }
        };

        {
            let mut handle = self.handle.lock();
            if handle.is_closed() {
                drop(handle);
                advertisement.close();
                return;
            }
            handle.advertisement = Some(advertisement);
            handle.phase = ServerPhase::Advertised;
        }
        info!("Service {} advertised on channel {}", self.uuid, self.channel);

        self.set_phase(ServerPhase::Accepting);
        info!("Waiting for connections...");

        let accepted = listener.accept().await;
        drop(listener);
        self.complete_accept(accepted);
    }

    fn set_phase(&self, phase: ServerPhase) {
        let mut handle = self.handle.lock();
        if !handle.is_closed() {
            handle.phase = phase;
        }
    }

    /// Report a terminal listen or advertise failure.
    fn fail(&self, phase: ServerPhase, err: ServerError) {
        let on_error = {
            let mut handle = self.handle.lock();
            if handle.is_closed() {
                return;
            }
            handle.phase = phase;
            handle
                .accept
                .as_mut()
                .and_then(|accept| accept.take_callbacks().1)
        };

        error!("RFCOMM server setup failed: {}", err);
        if let Some(on_error) = on_error {
            self.callbacks.post(Box::new(move || on_error(err)));
        }
    }

    /// Withdraw the advertisement, then report the accept outcome.
    fn complete_accept(&self, accepted: io::Result<(BoxedStream, String)>) {
        let (advertisement, callbacks, outcome) = {
            let mut handle = self.handle.lock();
            if handle.is_closed() {
                return;
            }

            let advertisement = handle.advertisement.take();
            let callbacks = handle
                .accept
                .as_mut()
                .map(AcceptState::take_callbacks)
                .unwrap_or((None, None));

            let outcome = match accepted {
                Ok((stream, peer)) => {
                    handle.client = Some(ClientConnection::new(stream, peer.clone()));
                    handle.phase = ServerPhase::Connected;
                    Ok(peer)
                }
                Err(e) => {
                    handle.phase = ServerPhase::AcceptFailed;
                    Err(ServerError::AcceptFailed(e))
                }
            };

            (advertisement, callbacks, outcome)
        };

        // Stop being discoverable before anyone hears about the outcome.
        if let Some(advertisement) = advertisement {
            advertisement.close();
        }

        let (on_connected, on_error) = callbacks;
        match outcome {
            Ok(peer) => {
                info!("Connection from: {}", peer);
                if let Some(on_connected) = on_connected {
                    self.callbacks.post(Box::new(move || on_connected(peer)));
                }
            }
            Err(e) => {
                error!("Accept error: {}", e);
                if let Some(on_error) = on_error {
                    self.callbacks.post(Box::new(move || on_error(e)));
                }
            }
        }
    }
}

impl WriteSink for Shared {
    fn write_once(&self, data: Bytes) -> BoxFuture<'static, Result<usize>> {
        let writer = self
            .handle
            .lock()
            .client
            .as_ref()
            .map(ClientConnection::writer);

        connection::write_once(writer, data).boxed()
    }
}
