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

//! Bluetooth communication module.
//!
//! Handles the RFCOMM server socket, its SDP advertisement and the I/O with
//! the single accepted client.

mod connection;
mod discovery;
mod dispatch;
mod record;
mod server;
mod service_uuid;
mod transport;
mod write_queue;

pub use connection::READ_BUFFER_SIZE;
pub use discovery::{
    advertise, BluezDiscovery, DiscoverySession, ServiceAdvertisement, ServiceDiscovery,
};
pub use record::{
    attr, ProtocolLayer, ServiceInfo, ServiceRecord, L2CAP_UUID, PUBLIC_BROWSE_GROUP, RFCOMM_UUID,
};
pub use server::{Completion, ConnectedCallback, ErrorCallback, RfcommServer};
pub use service_uuid::ServiceUuid;
pub use transport::{
    BluezTransport, BoxedStream, ClientStream, RfcommListener, RfcommTransport, LISTEN_BACKLOG,
};
pub use write_queue::WriteCallback;
