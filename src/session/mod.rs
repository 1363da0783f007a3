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

//! Stream sessions.
//!
//! A [`StreamSession`] owns one open duplex stream. It runs a background
//! read loop that hands every received chunk to a single consumer channel,
//! serializes writes, and releases the stream exactly once.

mod event;
mod state;
mod stream;

pub use event::{CloseReason, InboundChunk, SessionEvent};
pub use state::SessionState;
pub use stream::{
    DuplexStream, SessionOptions, StreamSession, DEFAULT_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE,
};
