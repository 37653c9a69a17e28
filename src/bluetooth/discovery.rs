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

//! Service advertisement through the local discovery daemon.

use async_trait::async_trait;
use bluer::rfcomm::{Profile, ProfileHandle, Role};
use bluer::Session;
use std::io;
use tracing::{debug, info};

use super::record::ServiceRecord;
use crate::error::{AdvertiseStage, Result, ServerError};

/// Connection point to the discovery daemon.
#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    /// Open a session with the daemon.
    async fn connect(&self) -> io::Result<Box<dyn DiscoverySession>>;
}

/// An open daemon session.
///
/// Records registered through the session stay published until it is closed.
#[async_trait]
pub trait DiscoverySession: Send {
    /// Publish a service record.
    async fn register(&mut self, record: &ServiceRecord) -> io::Result<()>;

    /// Close the session, withdrawing every record it registered.
    fn close(self: Box<Self>);
}

/// An outstanding registration with the discovery daemon.
///
/// Dropping the advertisement without calling [`close`](Self::close) still
/// withdraws it, but without the log line.
pub struct ServiceAdvertisement {
    session: Box<dyn DiscoverySession>,
}

impl ServiceAdvertisement {
    /// Stop advertising the service.
    pub fn close(self) {
        self.session.close();
        info!("Service advertisement withdrawn");
    }
}

impl std::fmt::Debug for ServiceAdvertisement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAdvertisement").finish_non_exhaustive()
    }
}

/// Connect to the daemon and register `record`.
pub async fn advertise(
    discovery: &dyn ServiceDiscovery,
    record: &ServiceRecord,
) -> Result<ServiceAdvertisement> {
    let mut session = discovery
        .connect()
        .await
        .map_err(|source| ServerError::AdvertiseFailed {
            stage: AdvertiseStage::Connect,
            source,
        })?;
    debug!("Discovery daemon session opened");

    if let Err(source) = session.register(record).await {
        session.close();
        return Err(ServerError::AdvertiseFailed {
            stage: AdvertiseStage::Register,
            source,
        });
    }

    Ok(ServiceAdvertisement { session })
}

/// Service registration through bluetoothd's profile manager.
///
/// The profile carries the full service record, so the published channel is
/// the one our socket listens on. It sets no channel of its own. For UUIDs
/// bluetoothd knows (Serial Port 0x1101 among them) the daemon still opens
/// its default server channel for the profile; connections arriving there
/// queue on the profile handle, which is never polled, and are dropped with
/// it on close. Pick a channel other than the daemon's default for such
/// UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct BluezDiscovery;

#[async_trait]
impl ServiceDiscovery for BluezDiscovery {
    async fn connect(&self) -> io::Result<Box<dyn DiscoverySession>> {
        let session = Session::new().await.map_err(io::Error::other)?;
        Ok(Box::new(BluezSession {
            session,
            profile: None,
        }))
    }
}

struct BluezSession {
    session: Session,
    profile: Option<ProfileHandle>,
}

#[async_trait]
impl DiscoverySession for BluezSession {
    async fn register(&mut self, record: &ServiceRecord) -> io::Result<()> {
        let profile = Profile {
            uuid: record.service_id.to_uuid128(),
            name: Some(record.info.name.clone()),
            role: Some(Role::Server),
            require_authentication: Some(false),
            require_authorization: Some(false),
            auto_connect: Some(false),
            service_record: Some(record.to_xml()),
            ..Default::default()
        };

        let handle = self
            .session
            .register_profile(profile)
            .await
            .map_err(io::Error::other)?;
        self.profile = Some(handle);

        info!("Service record registered (UUID: {})", record.service_id);
        Ok(())
    }

    fn close(self: Box<Self>) {
        let this = *self;
        // Dropping the handle unregisters the profile.
        drop(this.profile);
        debug!("Discovery daemon session closed");
    }
}
