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

//! Text chat on top of a stream session.
//!
//! Messages are written as raw UTF-8 with no framing, so one `send_text` on
//! this side may arrive as several chunks (or merged with the next message)
//! on the other.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::ChatConfig;
use crate::error::WriteError;
use crate::session::{DuplexStream, InboundChunk, StreamSession};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("not connected")]
    NotConnected,

    #[error(transparent)]
    Write(WriteError),
}

/// Who wrote a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Local,
    Remote,
}

/// One line of the conversation.
#[derive(Debug, Clone)]
pub struct TranscriptLine {
    pub at: DateTime<Local>,
    pub speaker: Speaker,
    pub text: String,
}

impl TranscriptLine {
    fn new(speaker: Speaker, text: String) -> Self {
        Self {
            at: Local::now(),
            speaker,
            text,
        }
    }

    /// Render as `"<label>: <text>"`.
    pub fn render(&self, labels: &ChatConfig) -> String {
        let label = match self.speaker {
            Speaker::Local => &labels.local_label,
            Speaker::Remote => &labels.remote_label,
        };
        format!("{}: {}", label, self.text)
    }
}

/// Incremental UTF-8 decoder.
///
/// A multi-byte character split across two chunks is held back until the
/// rest arrives. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(bytes);

        let mut out = String::with_capacity(buf.len());
        let mut input = &buf[..];
        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(e) => {
                    let (valid, rest) = input.split_at(e.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[len..];
                        }
                        None => {
                            self.pending = rest.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush a trailing incomplete sequence, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(tail)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Chat endpoint bound to one session.
pub struct ChatClient<S> {
    session: Arc<StreamSession<S>>,
    labels: ChatConfig,
    decoder: Mutex<Utf8Decoder>,
    transcript: Mutex<Vec<TranscriptLine>>,
}

impl<S: DuplexStream> ChatClient<S> {
    pub fn new(session: Arc<StreamSession<S>>, labels: ChatConfig) -> Self {
        Self {
            session,
            labels,
            decoder: Mutex::new(Utf8Decoder::new()),
            transcript: Mutex::new(Vec::new()),
        }
    }

    pub fn session(&self) -> &Arc<StreamSession<S>> {
        &self.session
    }

    pub fn labels(&self) -> &ChatConfig {
        &self.labels
    }

    /// Send a text message and record it.
    pub async fn send_text(&self, text: &str) -> Result<TranscriptLine, ChatError> {
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if !self.session.is_active() {
            return Err(ChatError::NotConnected);
        }

        self.session.send(text.as_bytes()).await.map_err(|e| match e {
            WriteError::NotActive => ChatError::NotConnected,
            other => ChatError::Write(other),
        })?;

        let line = TranscriptLine::new(Speaker::Local, text.to_string());
        self.transcript.lock().push(line.clone());
        Ok(line)
    }

    /// Decode an inbound chunk into a transcript line.
    ///
    /// Returns `None` when the chunk only carried part of a character.
    pub fn receive(&self, chunk: &InboundChunk) -> Option<TranscriptLine> {
        let text = self.decoder.lock().decode(chunk.as_bytes());
        self.record_remote(text)
    }

    /// Flush any undecodable tail once the session has closed.
    pub fn finish(&self) -> Option<TranscriptLine> {
        let tail = self.decoder.lock().finish()?;
        self.record_remote(tail)
    }

    fn record_remote(&self, text: String) -> Option<TranscriptLine> {
        if text.is_empty() {
            return None;
        }
        info!("Message received: {} chars", text.chars().count());
        let line = TranscriptLine::new(Speaker::Remote, text);
        self.transcript.lock().push(line.clone());
        Some(line)
    }

    pub fn transcript(&self) -> Vec<TranscriptLine> {
        self.transcript.lock().clone()
    }
}
