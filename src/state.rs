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

//! Application state management.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::peer::PeerId;

/// Connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Discovering,
    Connecting,
    Connected,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Discovering => "Discovering devices...",
            ConnectionStatus::Connecting => "Connecting...",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Error => "Connection failed",
        }
    }
}

/// Shared application state.
#[derive(Debug)]
pub struct AppState {
    /// Current connection status.
    pub connection_status: RwLock<ConnectionStatus>,

    /// Peer being connected to or connected with.
    pub peer: RwLock<Option<PeerId>>,

    /// Last connection error, for display.
    pub last_error: RwLock<Option<String>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            connection_status: RwLock::new(ConnectionStatus::Disconnected),
            peer: RwLock::new(None),
            last_error: RwLock::new(None),
        }
    }
}

impl AppState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_discovering(&self) {
        *self.connection_status.write() = ConnectionStatus::Discovering;
    }

    pub fn set_connecting(&self, peer: PeerId) {
        *self.connection_status.write() = ConnectionStatus::Connecting;
        *self.peer.write() = Some(peer);
        *self.last_error.write() = None;
    }

    pub fn set_connected(&self, peer: PeerId) {
        *self.connection_status.write() = ConnectionStatus::Connected;
        *self.peer.write() = Some(peer);
    }

    pub fn set_disconnected(&self) {
        *self.connection_status.write() = ConnectionStatus::Disconnected;
        *self.peer.write() = None;
    }

    pub fn set_error(&self, message: impl Into<String>) {
        *self.connection_status.write() = ConnectionStatus::Error;
        *self.last_error.write() = Some(message.into());
    }

    pub fn get_status(&self) -> ConnectionStatus {
        *self.connection_status.read()
    }

    pub fn get_peer(&self) -> Option<PeerId> {
        self.peer.read().clone()
    }

    /// One-line description for the status bar.
    pub fn status_line(&self) -> String {
        let status = self.get_status();
        match (status, self.get_peer()) {
            (ConnectionStatus::Connecting, Some(peer)) => format!("Connecting to {}", peer),
            (ConnectionStatus::Connected, Some(peer)) => format!("Connected to {}", peer),
            (ConnectionStatus::Error, _) => match self.last_error.read().as_deref() {
                Some(error) => format!("Connection failed: {}", error),
                None => status.as_str().to_string(),
            },
            _ => status.as_str().to_string(),
        }
    }
}
