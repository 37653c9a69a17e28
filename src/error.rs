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

//! Error types for the RFCOMM server.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = ServerError> = std::result::Result<T, E>;

/// Step of the service advertisement that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertiseStage {
    /// Opening a session with the discovery daemon.
    Connect,
    /// Registering the service record.
    Register,
}

impl fmt::Display for AdvertiseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvertiseStage::Connect => f.write_str("connect to the service discovery daemon"),
            AdvertiseStage::Register => f.write_str("register the service record"),
        }
    }
}

/// Errors reported by the server.
///
/// Listen, advertise and accept failures go to the error callback given at
/// construction. Read and write failures go to the callback of the operation
/// that produced them and leave the server usable.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The UUID string is not a 16-, 32- or 128-bit UUID.
    #[error("the UUID {0:?} is invalid")]
    InvalidUuid(String),

    /// The cancellation pipe could not be allocated.
    #[error("cannot create pipe for reading: {0}")]
    PipeCreationFailed(#[source] io::Error),

    /// Allocating or binding the RFCOMM socket failed.
    #[error("couldn't bind bluetooth socket: {0}")]
    BindFailed(#[source] io::Error),

    /// `listen` on the bound socket failed.
    #[error("couldn't listen on bluetooth socket: {0}")]
    ListenFailed(#[source] io::Error),

    /// The service record could not be published.
    #[error("cannot {stage}: {source}")]
    AdvertiseFailed {
        stage: AdvertiseStage,
        #[source]
        source: io::Error,
    },

    /// Accepting the client connection failed.
    #[error("accept() failed: {0}")]
    AcceptFailed(#[source] io::Error),

    /// No client is connected, or the server has been closed.
    #[error("the connection has been closed")]
    ConnectionClosed,

    /// The write call transferred fewer bytes than requested.
    #[error("writing attempt was incomplete: {written} of {requested} bytes written")]
    WriteIncomplete { written: usize, requested: usize },

    /// The write call itself failed.
    #[error("writing attempt was unsuccessful: {0}")]
    WriteFailed(#[source] io::Error),

    /// The read call failed.
    #[error("error reading from connection: {0}")]
    ReadFailed(#[source] io::Error),
}

impl ServerError {
    /// Raw OS error code carried by this error, if any.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            ServerError::PipeCreationFailed(e)
            | ServerError::BindFailed(e)
            | ServerError::ListenFailed(e)
            | ServerError::AcceptFailed(e)
            | ServerError::WriteFailed(e)
            | ServerError::ReadFailed(e)
            | ServerError::AdvertiseFailed { source: e, .. } => e.raw_os_error(),
            ServerError::InvalidUuid(_)
            | ServerError::ConnectionClosed
            | ServerError::WriteIncomplete { .. } => None,
        }
    }

    /// Whether this error means the peer or the server is gone.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, ServerError::ConnectionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_code() {
        let err = ServerError::BindFailed(io::Error::from_raw_os_error(97));
        assert_eq!(err.os_code(), Some(97));

        let err = ServerError::AdvertiseFailed {
            stage: AdvertiseStage::Register,
            source: io::Error::from_raw_os_error(13),
        };
        assert_eq!(err.os_code(), Some(13));

        assert_eq!(ServerError::ConnectionClosed.os_code(), None);
        assert_eq!(
            ServerError::WriteIncomplete {
                written: 3,
                requested: 10
            }
            .os_code(),
            None
        );
    }

    #[test]
    fn test_messages() {
        let err = ServerError::WriteIncomplete {
            written: 64,
            requested: 300,
        };
        assert_eq!(
            err.to_string(),
            "writing attempt was incomplete: 64 of 300 bytes written"
        );

        let err = ServerError::AdvertiseFailed {
            stage: AdvertiseStage::Connect,
            source: io::Error::new(io::ErrorKind::NotFound, "no daemon"),
        };
        assert_eq!(
            err.to_string(),
            "cannot connect to the service discovery daemon: no daemon"
        );
    }
}
