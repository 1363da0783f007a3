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

//! Session over a single duplex byte stream.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::event::{CloseReason, InboundChunk, SessionEvent};
use super::state::SessionState;
use crate::error::{ReadError, SessionError, WriteError};
use crate::peer::PeerId;

/// Read buffer size used when none is configured.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Upper bound on the read buffer; larger requests are clamped.
pub const MAX_READ_BUFFER_SIZE: usize = 64 * 1024;

/// A reliable, ordered, bidirectional byte stream.
///
/// Dropping the stream must release the underlying socket; a pending read
/// is cancelled by dropping its future.
pub trait DuplexStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> DuplexStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Maximum bytes requested per read call.
    pub read_buffer_size: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

struct Lifecycle {
    state: SessionState,
    /// Set by whoever performs the Active -> Closed transition, taken once by
    /// the read loop when it emits the terminal event.
    reason: Option<CloseReason>,
}

struct Shared<S> {
    peer: PeerId,
    lifecycle: Mutex<Lifecycle>,
    reader: Mutex<Option<ReadHalf<S>>>,
    writer: tokio::sync::Mutex<Option<WriteHalf<S>>>,
    read_task: Mutex<Option<JoinHandle<()>>>,
    closing: watch::Sender<bool>,
    read_buffer_size: usize,
}

impl<S: DuplexStream> Shared<S> {
    fn state(&self) -> SessionState {
        self.lifecycle.lock().state
    }

    /// Move to `Closed`. Returns false if another path already did.
    fn begin_close(&self, reason: CloseReason) -> bool {
        {
            let mut lifecycle = self.lifecycle.lock();
            if !lifecycle.state.can_transition_to(SessionState::Closed) {
                return false;
            }
            lifecycle.state = SessionState::Closed;
            lifecycle.reason = Some(reason);
        }
        self.closing.send_replace(true);
        true
    }

    /// Shut down and drop the write half if it is still held.
    async fn release_writer(&self) {
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.shutdown().await {
                debug!("Write half shutdown for {} failed: {}", self.peer, e);
            }
            info!("Stream to {} released", self.peer);
        }
    }
}

/// Resolves once the session has started closing.
async fn closed(closing: &mut watch::Receiver<bool>) {
    loop {
        if *closing.borrow_and_update() {
            return;
        }
        if closing.changed().await.is_err() {
            return;
        }
    }
}

/// Owner of one open duplex stream.
///
/// The session is `Active` from construction. It becomes `Closed` on
/// [`shutdown`](Self::shutdown), on a read or write failure, or when the
/// handle is dropped; the stream is released exactly once on all paths.
pub struct StreamSession<S> {
    shared: Arc<Shared<S>>,
}

impl<S: DuplexStream> StreamSession<S> {
    /// Take ownership of an already open stream.
    pub fn new(stream: S, peer: PeerId, options: SessionOptions) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        let (closing, _) = watch::channel(false);

        info!("Session with {} active", peer);

        Self {
            shared: Arc::new(Shared {
                peer,
                lifecycle: Mutex::new(Lifecycle {
                    state: SessionState::Active,
                    reason: None,
                }),
                reader: Mutex::new(Some(reader)),
                writer: tokio::sync::Mutex::new(Some(writer)),
                read_task: Mutex::new(None),
                closing,
                read_buffer_size: options.read_buffer_size.clamp(1, MAX_READ_BUFFER_SIZE),
            }),
        }
    }

    pub fn peer(&self) -> &PeerId {
        &self.shared.peer
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Start the read loop and return the consumer channel.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<mpsc::UnboundedReceiver<SessionEvent>, SessionError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.start_with(event_tx)?;
        Ok(event_rx)
    }

    /// Start the read loop, delivering events to an existing channel.
    pub fn start_with(
        &self,
        event_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<(), SessionError> {
        if !self.is_active() {
            return Err(SessionError::Closed);
        }

        let reader = self.shared.reader.lock().take().ok_or_else(|| {
            if self.is_active() {
                SessionError::AlreadyStarted
            } else {
                SessionError::Closed
            }
        })?;

        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(read_loop(shared, reader, event_tx));
        *self.shared.read_task.lock() = Some(task);

        debug!("Read loop for {} started", self.shared.peer);
        Ok(())
    }

    /// Write `bytes` in full.
    ///
    /// Concurrent calls are serialized; the bytes of one call are never
    /// interleaved with another's. Returns once the bytes are handed to the
    /// stream, not when the remote has read them.
    pub async fn send(&self, bytes: &[u8]) -> Result<(), WriteError> {
        let mut closing = self.shared.closing.subscribe();
        let mut writer = self.shared.writer.lock().await;

        if !self.is_active() {
            return Err(WriteError::NotActive);
        }
        let half = writer.as_mut().ok_or(WriteError::NotActive)?;

        let result = tokio::select! {
            biased;
            _ = closed(&mut closing) => return Err(WriteError::NotActive),
            res = async {
                half.write_all(bytes).await?;
                half.flush().await
            } => res,
        };

        match result {
            Ok(()) => {
                debug!("Sent {} bytes to {}", bytes.len(), self.shared.peer);
                Ok(())
            }
            Err(e) => {
                error!("Write to {} failed: {}", self.shared.peer, e);
                self.shared.begin_close(CloseReason::WriteFailed(e.to_string()));
                drop(writer.take());
                Err(WriteError::Io(e))
            }
        }
    }

    /// Close the session and release the stream.
    ///
    /// Idempotent and safe to race with an internal failure. Waits for the
    /// read loop to finish if this call is the one that stops it.
    pub async fn shutdown(&self) {
        if self.shared.begin_close(CloseReason::Shutdown) {
            info!("Shutting down session with {}", self.shared.peer);
        }

        // Read half of a session that was never started.
        drop(self.shared.reader.lock().take());
        self.shared.release_writer().await;

        let task = self.shared.read_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Read loop for {} ended abnormally: {}", self.shared.peer, e);
            }
        }
    }
}

impl<S> Drop for StreamSession<S> {
    fn drop(&mut self) {
        let mut lifecycle = self.shared.lifecycle.lock();
        if lifecycle.state.can_transition_to(SessionState::Closed) {
            lifecycle.state = SessionState::Closed;
            lifecycle.reason = Some(CloseReason::Shutdown);
            drop(lifecycle);
            self.shared.closing.send_replace(true);
        }
    }
}

async fn read_loop<S: DuplexStream>(
    shared: Arc<Shared<S>>,
    mut reader: ReadHalf<S>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
) {
    let mut closing = shared.closing.subscribe();
    let mut buf = vec![0u8; shared.read_buffer_size];
    let mut consumer_gone = false;

    loop {
        let read = tokio::select! {
            biased;
            _ = closed(&mut closing) => break,
            read = reader.read(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                info!("Stream closed by {}", shared.peer);
                shared.begin_close(CloseReason::ReadFailed(ReadError::ClosedByPeer));
                break;
            }
            Ok(n) => {
                debug!("Received {} bytes from {}", n, shared.peer);
                if consumer_gone {
                    continue;
                }
                let chunk = InboundChunk::new(buf[..n].to_vec());
                if event_tx.send(SessionEvent::Chunk(chunk)).is_err() {
                    warn!("Consumer for {} went away; discarding inbound data", shared.peer);
                    consumer_gone = true;
                }
            }
            Err(e) => {
                error!("Read from {} failed: {}", shared.peer, e);
                shared.begin_close(CloseReason::ReadFailed(ReadError::Io(e)));
                break;
            }
        }
    }

    drop(reader);
    shared.release_writer().await;

    let reason = shared
        .lifecycle
        .lock()
        .reason
        .take()
        .unwrap_or(CloseReason::Shutdown);
    debug!("Read loop for {} stopped: {}", shared.peer, reason);
    let _ = event_tx.send(SessionEvent::Closed(reason));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{duplex, ReadBuf};

    /// Duplex stream that counts how often it is dropped.
    struct Tracked {
        inner: tokio::io::DuplexStream,
        drops: Arc<AtomicUsize>,
    }

    impl AsyncRead for Tracked {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for Tracked {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Pin::new(&mut self.inner).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.inner).poll_flush(cx)
        }

        fn poll_shutdown(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.inner).poll_shutdown(cx)
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Yields one chunk, then fails every read with a connection reset.
    struct ResetAfterFirst {
        first: Option<Vec<u8>>,
    }

    impl AsyncRead for ResetAfterFirst {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            match self.first.take() {
                Some(data) => {
                    buf.put_slice(&data);
                    Poll::Ready(Ok(()))
                }
                None => Poll::Ready(Err(std::io::ErrorKind::ConnectionReset.into())),
            }
        }
    }

    impl AsyncWrite for ResetAfterFirst {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn tracked_pair(size: usize) -> (Tracked, tokio::io::DuplexStream, Arc<AtomicUsize>) {
        let (local, remote) = duplex(size);
        let drops = Arc::new(AtomicUsize::new(0));
        let stream = Tracked {
            inner: local,
            drops: Arc::clone(&drops),
        };
        (stream, remote, drops)
    }

    fn peer() -> PeerId {
        PeerId::new("00:11:22:33:44:55").unwrap()
    }

    async fn wait_for_drops(drops: &AtomicUsize, expected: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while drops.load(Ordering::SeqCst) != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("stream was not released");
    }

    #[tokio::test]
    async fn test_new_session_is_active() {
        let (stream, _remote, _) = tracked_pair(64);
        let session = StreamSession::new(stream, peer(), SessionOptions::default());
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.peer().as_str(), "00:11:22:33:44:55");
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let (stream, _remote, _) = tracked_pair(64);
        let session = StreamSession::new(stream, peer(), SessionOptions::default());
        let _events = session.start().unwrap();
        assert!(matches!(session.start(), Err(SessionError::AlreadyStarted)));

        session.shutdown().await;
        assert!(matches!(session.start(), Err(SessionError::Closed)));
    }

    #[tokio::test]
    async fn test_chunks_delivered_in_order() {
        let (stream, mut remote, _) = tracked_pair(64);
        let options = SessionOptions { read_buffer_size: 4 };
        let session = StreamSession::new(stream, peer(), options);
        let mut events = session.start().unwrap();

        remote.write_all(b"hello, world").await.unwrap();
        drop(remote);

        let mut received = Vec::new();
        let mut closed = None;
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Chunk(chunk) => {
                    assert!(chunk.len() <= 4);
                    assert!(!chunk.is_empty());
                    received.extend_from_slice(chunk.as_bytes());
                }
                SessionEvent::Closed(reason) => closed = Some(reason),
            }
        }

        assert_eq!(received, b"hello, world");
        assert!(closed.unwrap().is_remote_close());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_shutdown_unblocks_pending_read() {
        let (stream, _remote, drops) = tracked_pair(64);
        let session = StreamSession::new(stream, peer(), SessionOptions::default());
        let mut events = session.start().unwrap();

        // The read loop is parked on a read that will never complete.
        tokio::time::sleep(Duration::from_millis(20)).await;
        tokio::time::timeout(Duration::from_secs(5), session.shutdown())
            .await
            .expect("shutdown hung on a pending read");

        assert_eq!(drops.load(Ordering::SeqCst), 1);
        match events.recv().await {
            Some(SessionEvent::Closed(CloseReason::Shutdown)) => {}
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_repeated_shutdown_releases_once() {
        let (stream, _remote, drops) = tracked_pair(64);
        let session = Arc::new(StreamSession::new(stream, peer(), SessionOptions::default()));
        let _events = session.start().unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                tokio::spawn(async move { session.shutdown().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        session.shutdown().await;

        wait_for_drops(&drops, 1).await;
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(session.send(b"x").await, Err(WriteError::NotActive)));
    }

    #[tokio::test]
    async fn test_shutdown_without_start_releases_stream() {
        let (stream, mut remote, drops) = tracked_pair(64);
        let session = StreamSession::new(stream, peer(), SessionOptions::default());

        session.shutdown().await;
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        let mut buf = [0u8; 8];
        assert_eq!(remote.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_drop_releases_stream() {
        let (stream, _remote, drops) = tracked_pair(64);
        let session = StreamSession::new(stream, peer(), SessionOptions::default());
        let mut events = session.start().unwrap();

        drop(session);

        wait_for_drops(&drops, 1).await;
        assert!(matches!(
            events.recv().await,
            Some(SessionEvent::Closed(CloseReason::Shutdown))
        ));
    }

    #[tokio::test]
    async fn test_send_reaches_remote() {
        let (stream, mut remote, _) = tracked_pair(64);
        let session = StreamSession::new(stream, peer(), SessionOptions::default());

        session.send(b"ping").await.unwrap();

        let mut buf = [0u8; 4];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn test_write_failure_closes_session() {
        let (stream, remote, _) = tracked_pair(64);
        let session = StreamSession::new(stream, peer(), SessionOptions::default());
        drop(remote);

        assert!(matches!(session.send(b"x").await, Err(WriteError::Io(_))));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(session.send(b"y").await, Err(WriteError::NotActive)));
    }

    #[tokio::test]
    async fn test_consumer_drop_keeps_session_alive() {
        let (stream, mut remote, _) = tracked_pair(64);
        let session = StreamSession::new(stream, peer(), SessionOptions::default());
        let events = session.start().unwrap();
        drop(events);

        remote.write_all(b"ignored").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(session.is_active());
        session.send(b"still here").await.unwrap();
    }

    #[tokio::test]
    async fn test_read_error_closes_session_once() {
        let stream = ResetAfterFirst {
            first: Some(b"abc".to_vec()),
        };
        let session = StreamSession::new(stream, peer(), SessionOptions::default());
        let mut events = session.start().unwrap();

        match events.recv().await {
            Some(SessionEvent::Chunk(chunk)) => assert_eq!(chunk.as_bytes(), b"abc"),
            other => panic!("unexpected event: {:?}", other),
        }
        match events.recv().await {
            Some(SessionEvent::Closed(CloseReason::ReadFailed(ReadError::Io(e)))) => {
                assert_eq!(e.kind(), std::io::ErrorKind::ConnectionReset);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(events.recv().await.is_none());

        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(session.send(b"x").await, Err(WriteError::NotActive)));
    }

    #[tokio::test]
    async fn test_shutdown_releases_send_blocked_on_backpressure() {
        let (stream, _remote, drops) = tracked_pair(4);
        let session = Arc::new(StreamSession::new(stream, peer(), SessionOptions::default()));

        let sender = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.send(&[0x55; 64]).await })
        };

        // Nobody reads the remote end, so the send stalls once the pipe is full.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!sender.is_finished());

        tokio::time::timeout(Duration::from_secs(5), session.shutdown())
            .await
            .expect("shutdown hung behind a blocked send");
        let result = tokio::time::timeout(Duration::from_secs(5), sender)
            .await
            .expect("blocked send was not released")
            .unwrap();

        assert!(matches!(result, Err(WriteError::NotActive)));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_oversized_read_buffer_is_clamped() {
        let (stream, mut remote, _) = tracked_pair(64);
        let options = SessionOptions {
            read_buffer_size: usize::MAX,
        };
        let session = StreamSession::new(stream, peer(), options);
        let mut events = session.start().unwrap();

        remote.write_all(b"fits").await.unwrap();
        match events.recv().await {
            Some(SessionEvent::Chunk(chunk)) => assert_eq!(chunk.as_bytes(), b"fits"),
            other => panic!("unexpected event: {:?}", other),
        }
        session.shutdown().await;
    }
}
