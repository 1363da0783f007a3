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

//! Point-to-point text chat over a Serial Port Profile byte stream.
//!
//! A [`Connector`](connector::Connector) turns a peer identifier into an open
//! stream; a [`StreamSession`](session::StreamSession) owns that stream, runs
//! the read loop and serializes writes.

#[cfg(feature = "bluetooth")]
pub mod bluetooth;
pub mod chat;
pub mod config;
pub mod connector;
pub mod error;
pub mod peer;
pub mod session;
pub mod state;
pub mod tcp;

pub use connector::{Connector, Discovery, Transport, SPP_UUID};
pub use error::{ConnectError, ReadError, SessionError, WriteError};
pub use peer::{DiscoveredPeer, PeerId};
pub use session::{
    CloseReason, InboundChunk, SessionEvent, SessionOptions, SessionState, StreamSession,
};
