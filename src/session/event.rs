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

//! Events delivered by the read loop.

use crate::error::ReadError;

/// Bytes produced by a single read call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundChunk {
    data: Vec<u8>,
}

impl InboundChunk {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Why a session closed.
#[derive(Debug)]
pub enum CloseReason {
    /// `shutdown()` was called or the session handle was dropped.
    Shutdown,
    /// The read loop hit EOF or an I/O error.
    ReadFailed(ReadError),
    /// A write failed; the message is the underlying I/O error.
    WriteFailed(String),
}

impl CloseReason {
    /// True when the remote closed the stream.
    pub fn is_remote_close(&self) -> bool {
        matches!(self, CloseReason::ReadFailed(ReadError::ClosedByPeer))
    }

    /// True for any self-initiated close caused by a stream error.
    pub fn is_failure(&self) -> bool {
        !matches!(self, CloseReason::Shutdown)
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::Shutdown => f.write_str("session shut down"),
            CloseReason::ReadFailed(e) => write!(f, "{}", e),
            CloseReason::WriteFailed(e) => write!(f, "write failed: {}", e),
        }
    }
}

/// Item on the consumer channel. `Closed` is always the last event.
#[derive(Debug)]
pub enum SessionEvent {
    Chunk(InboundChunk),
    Closed(CloseReason),
}
