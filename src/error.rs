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

//! Error types for connecting and streaming.
//!
//! Connect failures and mid-session failures are kept apart so a caller can
//! tell "never got a stream" from "had a stream and lost it".

use std::io;
use thiserror::Error;

/// Failure to turn a peer identifier into an open stream.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The peer could not be reached (out of range, powered off, unknown address).
    #[error("peer unreachable: {0}")]
    Unreachable(String),

    /// The remote side actively refused the connection.
    #[error("connection refused: {0}")]
    Refused(String),

    /// The remote does not offer the requested service.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The peer answered but did not speak the expected protocol.
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// The attempt was cancelled before it completed.
    #[error("connection cancelled")]
    Cancelled,

    /// The attempt did not finish within the configured bound.
    #[error("connection timed out after {0:?}")]
    TimedOut(std::time::Duration),

    /// No usable local adapter or transport.
    #[error("transport unsupported: {0}")]
    Unsupported(String),
}

impl ConnectError {
    /// Classify an I/O error raised while opening a stream.
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::Refused(err.to_string()),
            io::ErrorKind::TimedOut => Self::Unreachable(err.to_string()),
            io::ErrorKind::Interrupted => Self::Cancelled,
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => {
                Self::ProtocolMismatch(err.to_string())
            }
            io::ErrorKind::Unsupported => Self::Unsupported(err.to_string()),
            io::ErrorKind::NotFound => Self::ServiceUnavailable(err.to_string()),
            _ => Self::Unreachable(err.to_string()),
        }
    }
}

/// Failure observed by the read loop.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The remote closed its side of the stream (EOF).
    #[error("stream closed by peer")]
    ClosedByPeer,

    #[error("read failed: {0}")]
    Io(#[from] io::Error),
}

/// Failure to submit bytes.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The session is not in the `Active` state.
    #[error("session is not active")]
    NotActive,

    #[error("write failed: {0}")]
    Io(#[from] io::Error),
}

/// Misuse of a session handle.
#[derive(Debug, Error)]
pub enum SessionError {
    /// `start` was called more than once.
    #[error("read loop already started")]
    AlreadyStarted,

    /// `start` was called after the session closed.
    #[error("session is closed")]
    Closed,
}
