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

//! Server lifecycle state.

/// Phase of the listen → advertise → accept state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerPhase {
    /// Socket is being allocated and bound.
    Starting,
    /// Socket is listening, advertisement not yet registered.
    Listening,
    /// Service record registered with the discovery daemon.
    Advertised,
    /// Waiting for the single client.
    Accepting,
    /// Client accepted.
    Connected,
    /// Bind or listen failed.
    ListenFailed,
    /// Service record registration failed.
    AdvertiseFailed,
    /// Accept failed.
    AcceptFailed,
    /// `close()` was called.
    Closed,
}

impl ServerPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerPhase::Starting => "Starting",
            ServerPhase::Listening => "Listening",
            ServerPhase::Advertised => "Advertised",
            ServerPhase::Accepting => "Accepting...",
            ServerPhase::Connected => "Connected",
            ServerPhase::ListenFailed => "Listen failed",
            ServerPhase::AdvertiseFailed => "Advertise failed",
            ServerPhase::AcceptFailed => "Accept failed",
            ServerPhase::Closed => "Closed",
        }
    }

    /// No further transition happens without `close()`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ServerPhase::ListenFailed
                | ServerPhase::AdvertiseFailed
                | ServerPhase::AcceptFailed
                | ServerPhase::Closed
        )
    }
}
