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

//! In-memory socket and discovery backends for driving the server in tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;

use rfcomm_serial_server::bluetooth::{
    BoxedStream, DiscoverySession, RfcommListener, RfcommTransport, ServiceDiscovery,
    ServiceRecord,
};
use rfcomm_serial_server::{Result, ServerError, ServerEvent, ServiceConfig};

pub const PEER: &str = "00:1A:7D:DA:71:13";

/// How long a test waits for a background step.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

type Incoming = io::Result<(BoxedStream, String)>;

/// Where the mock listen sequence stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenMode {
    Ok,
    FailBind,
    FailListen,
    /// Never completes.
    Hang,
}

/// Transport whose listener hands out in-memory streams pushed by a [`Dialer`].
pub struct MockTransport {
    mode: ListenMode,
    listen_calls: AtomicUsize,
    accept_calls: Arc<AtomicUsize>,
    incoming: Mutex<Option<mpsc::UnboundedReceiver<Incoming>>>,
}

/// Test side of a [`MockTransport`].
#[derive(Clone)]
pub struct Dialer {
    tx: mpsc::UnboundedSender<Incoming>,
}

impl MockTransport {
    pub fn new(mode: ListenMode) -> (Arc<Self>, Dialer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            mode,
            listen_calls: AtomicUsize::new(0),
            accept_calls: Arc::new(AtomicUsize::new(0)),
            incoming: Mutex::new(Some(rx)),
        });
        (transport, Dialer { tx })
    }

    pub fn listen_calls(&self) -> usize {
        self.listen_calls.load(Ordering::SeqCst)
    }

    pub fn accept_calls(&self) -> usize {
        self.accept_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RfcommTransport for MockTransport {
    async fn listen(&self, _channel: u8) -> Result<Box<dyn RfcommListener>> {
        self.listen_calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            ListenMode::FailBind => {
                // EADDRINUSE
                return Err(ServerError::BindFailed(io::Error::from_raw_os_error(98)));
            }
            ListenMode::FailListen => {
                return Err(ServerError::ListenFailed(io::Error::from(
                    io::ErrorKind::PermissionDenied,
                )));
            }
            ListenMode::Hang => futures::future::pending::<()>().await,
            ListenMode::Ok => {}
        }

        let incoming = self
            .incoming
            .lock()
            .take()
            .ok_or_else(|| ServerError::ListenFailed(io::Error::from(io::ErrorKind::AddrInUse)))?;

        Ok(Box::new(MockListener {
            incoming: tokio::sync::Mutex::new(incoming),
            accept_calls: Arc::clone(&self.accept_calls),
        }))
    }
}

struct MockListener {
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<Incoming>>,
    accept_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl RfcommListener for MockListener {
    async fn accept(&self) -> io::Result<(BoxedStream, String)> {
        self.accept_calls.fetch_add(1, Ordering::SeqCst);
        match self.incoming.lock().await.recv().await {
            Some(incoming) => incoming,
            None => Err(io::Error::from(io::ErrorKind::ConnectionAborted)),
        }
    }
}

impl Dialer {
    /// Connect as [`PEER`]; `capacity` bounds the bytes in flight per direction.
    pub fn connect(&self, capacity: usize) -> DuplexStream {
        let (server_side, client_side) = tokio::io::duplex(capacity);
        let _ = self.tx.send(Ok((Box::new(server_side), PEER.to_string())));
        client_side
    }

    /// Make the pending accept fail.
    pub fn fail_accept(&self, err: io::Error) {
        let _ = self.tx.send(Err(err));
    }
}

/// Discovery daemon stand-in that records what was registered.
#[derive(Default)]
pub struct MockDiscovery {
    fail_connect: bool,
    fail_register: bool,
    log: Arc<DiscoveryLog>,
}

#[derive(Default)]
struct DiscoveryLog {
    records: Mutex<Vec<ServiceRecord>>,
    sessions: AtomicUsize,
    closed: AtomicUsize,
}

impl MockDiscovery {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_connect() -> Arc<Self> {
        Arc::new(Self {
            fail_connect: true,
            ..Self::default()
        })
    }

    pub fn failing_register() -> Arc<Self> {
        Arc::new(Self {
            fail_register: true,
            ..Self::default()
        })
    }

    pub fn records(&self) -> Vec<ServiceRecord> {
        self.log.records.lock().clone()
    }

    pub fn sessions(&self) -> usize {
        self.log.sessions.load(Ordering::SeqCst)
    }

    /// Sessions closed so far.
    pub fn closed(&self) -> usize {
        self.log.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceDiscovery for MockDiscovery {
    async fn connect(&self) -> io::Result<Box<dyn DiscoverySession>> {
        if self.fail_connect {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }
        self.log.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            fail_register: self.fail_register,
            log: Arc::clone(&self.log),
        }))
    }
}

struct MockSession {
    fail_register: bool,
    log: Arc<DiscoveryLog>,
}

#[async_trait]
impl DiscoverySession for MockSession {
    async fn register(&mut self, record: &ServiceRecord) -> io::Result<()> {
        if self.fail_register {
            // EACCES
            return Err(io::Error::from_raw_os_error(13));
        }
        self.log.records.lock().push(record.clone());
        Ok(())
    }

    fn close(self: Box<Self>) {
        self.log.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn service_config(uuid: &str, channel: u8) -> ServiceConfig {
    ServiceConfig {
        uuid: uuid.to_string(),
        channel,
        ..ServiceConfig::default()
    }
}

/// Wait for the next server event.
pub async fn next_event(event_rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
    tokio::time::timeout(STEP_TIMEOUT, event_rx.recv())
        .await
        .expect("timed out waiting for server event")
        .expect("event channel closed")
}
