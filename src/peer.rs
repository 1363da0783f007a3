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

//! Peer identifiers produced by discovery.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Length of a textual hardware address, e.g. `00:11:22:AA:BB:CC`.
pub const HARDWARE_ADDRESS_LEN: usize = 17;

/// Invalid peer identifier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeerIdError {
    #[error("peer identifier is empty")]
    Empty,

    #[error("peer identifier has surrounding whitespace: {0:?}")]
    Whitespace(String),

    #[error("invalid hardware address: {0:?}")]
    InvalidAddress(String),
}

/// Opaque, stable identifier of a remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerId(Arc<str>);

impl PeerId {
    /// Wrap an identifier string. The value is stored exactly as given.
    pub fn new(id: impl AsRef<str>) -> Result<Self, PeerIdError> {
        let id = id.as_ref();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(PeerIdError::Empty);
        }
        if trimmed.len() != id.len() {
            return Err(PeerIdError::Whitespace(id.to_string()));
        }
        Ok(Self(Arc::from(id)))
    }

    /// Extract the trailing hardware address from a discovery listing entry
    /// of the form `"Name\nAA:BB:CC:DD:EE:FF"`.
    pub fn from_listing(entry: &str) -> Result<Self, PeerIdError> {
        let entry = entry.trim_end();
        let split = entry
            .len()
            .checked_sub(HARDWARE_ADDRESS_LEN)
            .filter(|at| entry.is_char_boundary(*at))
            .ok_or_else(|| PeerIdError::InvalidAddress(entry.to_string()))?;

        let address = &entry[split..];
        if !is_hardware_address(address) {
            return Err(PeerIdError::InvalidAddress(address.to_string()));
        }
        Self::new(address)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PeerId {
    type Err = PeerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Check for six colon-separated hex octets.
pub fn is_hardware_address(s: &str) -> bool {
    s.len() == HARDWARE_ADDRESS_LEN
        && s.split(':').count() == 6
        && s
            .split(':')
            .all(|octet| octet.len() == 2 && octet.chars().all(|c| c.is_ascii_hexdigit()))
}

/// A peer reported by a discovery scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPeer {
    pub id: PeerId,
    pub name: Option<String>,
}

impl DiscoveredPeer {
    pub fn new(id: PeerId, name: Option<String>) -> Self {
        Self { id, name }
    }

    /// Render as a two-line listing entry, name first.
    pub fn listing(&self) -> String {
        format!("{}\n{}", self.name.as_deref().unwrap_or("Unknown"), self.id)
    }
}
